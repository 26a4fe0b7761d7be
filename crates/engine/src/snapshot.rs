use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use common::{ChartSnapshot, Error, Result};

/// Fetches a rendered chart image from an HTTP endpoint.
///
/// Any chart service that answers a GET with image bytes works. Failures are
/// logged and yield no image, so the text alert still goes out.
pub struct HttpSnapshot {
    url: String,
    http: Client,
}

impl HttpSnapshot {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            url: url.into(),
            http,
        })
    }
}

#[async_trait]
impl ChartSnapshot for HttpSnapshot {
    async fn capture(&self) -> Option<Vec<u8>> {
        let resp = match self.http.get(&self.url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(url = %self.url, error = %e, "Chart snapshot request failed");
                return None;
            }
        };
        let status = resp.status();
        if !status.is_success() {
            warn!(url = %self.url, %status, "Chart snapshot endpoint returned an error");
            return None;
        }
        match resp.bytes().await {
            Ok(bytes) if !bytes.is_empty() => {
                debug!(len = bytes.len(), "Chart snapshot captured");
                Some(bytes.to_vec())
            }
            Ok(_) => {
                warn!(url = %self.url, "Chart snapshot endpoint returned no body");
                None
            }
            Err(e) => {
                warn!(url = %self.url, error = %e, "Chart snapshot body could not be read");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Serve one canned HTTP response on a random local port.
    async fn serve_once(status_line: &'static str, body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let head = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: image/png\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(body).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{addr}/chart.png")
    }

    #[tokio::test]
    async fn capture_returns_image_bytes() {
        let png = b"\x89PNG\r\n\x1a\n";
        let url = serve_once("200 OK", png).await;

        let image = HttpSnapshot::new(url).unwrap().capture().await;
        assert_eq!(image.as_deref(), Some(&png[..]));
    }

    #[tokio::test]
    async fn error_status_yields_no_image() {
        let url = serve_once("503 Service Unavailable", b"busy").await;
        assert!(HttpSnapshot::new(url).unwrap().capture().await.is_none());
    }

    #[tokio::test]
    async fn unreachable_endpoint_yields_no_image() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let snapshot = HttpSnapshot::new(format!("http://{addr}/chart.png")).unwrap();
        assert!(snapshot.capture().await.is_none());
    }
}
