use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, info, warn};

use common::{
    Candle, Error, ExecutionGateway, MarketDataTerminal, Order, OrderReceipt, PositionQuery,
    Result, Timeframe,
};

/// Quote assets recognised when deriving a symbol's base asset.
const QUOTE_ASSETS: [&str; 8] = ["USDT", "FDUSD", "USDC", "BUSD", "BTC", "ETH", "BNB", "EUR"];

/// REST API client for Binance spot.
///
/// Serves candles and connectivity for both trading modes. With API keys it
/// also places orders and answers position queries.
pub struct BinanceClient {
    base_url: String,
    keys: Option<ApiKeys>,
    http: Client,
}

struct ApiKeys {
    api_key: String,
    secret: String,
}

impl BinanceClient {
    /// Client for signed endpoints.
    pub fn new(
        api_key: impl Into<String>,
        secret: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let mut client = Self::public(base_url)?;
        client.keys = Some(ApiKeys {
            api_key: api_key.into(),
            secret: secret.into(),
        });
        Ok(client)
    }

    /// Market data only.
    pub fn public(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            keys: None,
            http,
        })
    }

    fn keys(&self) -> Result<&ApiKeys> {
        self.keys
            .as_ref()
            .ok_or_else(|| Error::Config("Binance API keys are required for this call".into()))
    }

    fn sign(secret: &str, query: &str) -> Result<String> {
        type HmacSha256 = Hmac<Sha256>;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| Error::Other(format!("HMAC key rejected: {e}")))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn signed_query(&self, params: &str) -> Result<(String, &ApiKeys)> {
        let keys = self.keys()?;
        let ts = Utc::now().timestamp_millis();
        let query = if params.is_empty() {
            format!("timestamp={ts}")
        } else {
            format!("{params}&timestamp={ts}")
        };
        let signature = Self::sign(&keys.secret, &query)?;
        Ok((format!("{query}&signature={signature}"), keys))
    }

    async fn public_get(&self, path: &str, params: &str) -> Result<String> {
        let url = if params.is_empty() {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}{path}?{params}", self.base_url)
        };
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        read_body(resp).await
    }

    async fn signed_get(&self, path: &str, params: &str) -> Result<String> {
        let (query, keys) = self.signed_query(params)?;
        let url = format!("{}{path}?{query}", self.base_url);

        let resp = self
            .http
            .get(&url)
            .header("X-MBX-APIKEY", &keys.api_key)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        read_body(resp).await
    }

    async fn signed_post(&self, path: &str, params: &str) -> Result<String> {
        let (body, keys) = self.signed_query(params)?;
        let url = format!("{}{path}", self.base_url);

        let resp = self
            .http
            .post(&url)
            .header("X-MBX-APIKEY", &keys.api_key)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        read_body(resp).await
    }
}

async fn read_body(resp: reqwest::Response) -> Result<String> {
    let status = resp.status();
    let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
    if !status.is_success() {
        return Err(api_error(status, &body));
    }
    Ok(body)
}

/// Binance reports failures as `{"code": -2010, "msg": "..."}`.
fn api_error(status: StatusCode, body: &str) -> Error {
    match serde_json::from_str::<ApiError>(body) {
        Ok(e) => Error::OrderRejected {
            code: e.code,
            description: e.msg,
        },
        Err(_) => Error::Http(format!("HTTP {status}: {body}")),
    }
}

#[async_trait]
impl MarketDataTerminal for BinanceClient {
    async fn is_connected(&self) -> bool {
        match self.public_get("/api/v3/ping", "").await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "Binance ping failed");
                false
            }
        }
    }

    async fn connect(&self) -> Result<()> {
        self.public_get("/api/v3/ping", "")
            .await
            .map_err(|e| Error::Connection(format!("Binance unreachable: {e}")))?;

        if self.keys.is_some() {
            self.signed_get("/api/v3/account", "")
                .await
                .map_err(|e| Error::Connection(format!("Binance login rejected: {e}")))?;
            info!("Binance API keys verified");
        }
        Ok(())
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Candle>> {
        let params = format!(
            "symbol={symbol}&interval={}&limit={}",
            timeframe.binance_interval(),
            count.clamp(1, 1000)
        );
        let body = self
            .public_get("/api/v3/klines", &params)
            .await
            .map_err(|e| Error::Fetch(format!("{symbol} {timeframe}: {e}")))?;
        let candles = parse_klines(&body)?;
        if candles.is_empty() {
            warn!(symbol, "No data retrieved");
        }
        Ok(candles)
    }
}

#[async_trait]
impl ExecutionGateway for BinanceClient {
    async fn submit_market_order(&self, order: &Order) -> Result<OrderReceipt> {
        let side = order.side.to_string();
        let params = format!(
            "symbol={}&side={side}&type=MARKET&quantity={}&newClientOrderId={}&newOrderRespType=FULL",
            order.symbol, order.volume, order.id
        );

        debug!(symbol = %order.symbol, side = %side, "Submitting order to Binance");
        let body = self.signed_post("/api/v3/order", &params).await?;

        let resp: OrderResponse = serde_json::from_str(&body)?;
        if resp.status != "FILLED" && resp.status != "PARTIALLY_FILLED" {
            return Err(Error::OrderRejected {
                code: 0,
                description: format!("order {} ended {}", resp.order_id, resp.status),
            });
        }

        let fill_price = resp
            .fills
            .first()
            .and_then(|f| f.price.parse::<f64>().ok())
            .unwrap_or(0.0);
        let volume = resp.executed_qty.parse::<f64>().unwrap_or(order.volume);

        Ok(OrderReceipt {
            ticket: resp.order_id,
            symbol: order.symbol.clone(),
            side: order.side,
            volume,
            fill_price,
            status: resp.status,
            timestamp: Utc::now(),
        })
    }
}

#[async_trait]
impl PositionQuery for BinanceClient {
    /// Spot has no positions; a non-zero balance of the base asset counts as one.
    async fn has_open_position(&self, symbol: &str) -> Result<bool> {
        let asset = base_asset(symbol)
            .ok_or_else(|| Error::Other(format!("cannot derive base asset of '{symbol}'")))?;

        let body = self.signed_get("/api/v3/account", "").await?;
        let account: AccountResponse = serde_json::from_str(&body)?;

        Ok(account.balances.iter().any(|b| {
            b.asset == asset
                && b.free.parse::<f64>().unwrap_or(0.0) + b.locked.parse::<f64>().unwrap_or(0.0)
                    > 0.0
        }))
    }
}

/// `BTCUSDT` → `BTC`.
pub fn base_asset(symbol: &str) -> Option<&str> {
    QUOTE_ASSETS
        .iter()
        .find_map(|q| symbol.strip_suffix(q))
        .filter(|base| !base.is_empty())
}

/// Decode a `/api/v3/klines` body. Tick volume is the trade count.
pub fn parse_klines(body: &str) -> Result<Vec<Candle>> {
    let rows: Vec<KlineRow> = serde_json::from_str(body)?;
    rows.into_iter()
        .map(|row| {
            let price = |s: &str| {
                s.parse::<f64>()
                    .map_err(|e| Error::Fetch(format!("bad kline price '{s}': {e}")))
            };
            Candle::new(
                row.0 / 1000,
                price(&row.1)?,
                price(&row.2)?,
                price(&row.3)?,
                price(&row.4)?,
                row.8,
            )
        })
        .collect()
}

// ─── Response types ───────────────────────────────────────────────────────────

/// open time, open, high, low, close, volume, close time, quote volume,
/// trades, taker base, taker quote, ignore
#[derive(Deserialize)]
struct KlineRow(
    i64,
    String,
    String,
    String,
    String,
    String,
    i64,
    String,
    u64,
    String,
    String,
    String,
);

#[derive(Deserialize)]
struct ApiError {
    code: i64,
    msg: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_id: u64,
    status: String,
    #[serde(default)]
    executed_qty: String,
    #[serde(default)]
    fills: Vec<FillDetail>,
}

#[derive(Deserialize)]
struct FillDetail {
    price: String,
}

#[derive(Deserialize)]
struct AccountResponse {
    balances: Vec<Balance>,
}

#[derive(Deserialize)]
struct Balance {
    asset: String,
    free: String,
    locked: String,
}
