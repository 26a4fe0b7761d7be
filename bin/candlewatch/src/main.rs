use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use common::{
    ChartSnapshot, Config, ExecutionGateway, MarketDataTerminal, NotificationSink, PositionQuery,
    TradingMode,
};
use engine::{BinanceClient, Collaborators, HttpSnapshot, Supervisor, SupervisorConfig};
use paper::PaperClient;
use telegram_ctrl::{start_bot, BotDeps, TelegramNotifier};

/// Upper bound on waiting for the loop's last tick and terminal shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e).context("loading configuration");
        }
    };
    info!(
        mode = %cfg.trading_mode,
        symbol = %cfg.symbol,
        timeframe = %cfg.timeframe,
        "Candlewatch starting"
    );

    // ── Collaborators (injected based on TRADING_MODE) ────────────────────────
    let notifier = Arc::new(TelegramNotifier::new(
        cfg.telegram_token.as_deref(),
        cfg.telegram_chat_id,
    ));

    let (terminal, gateway, positions): (
        Arc<dyn MarketDataTerminal>,
        Arc<dyn ExecutionGateway>,
        Arc<dyn PositionQuery>,
    ) = match cfg.trading_mode {
        TradingMode::Live => {
            info!("Live trading mode, using BinanceClient");
            let (key, secret) = cfg
                .binance_api_key
                .as_deref()
                .zip(cfg.binance_secret.as_deref())
                .context("live mode requires BINANCE_API_KEY and BINANCE_SECRET")?;
            let client = Arc::new(BinanceClient::new(key, secret, &cfg.binance_base_url)?);
            (
                client.clone() as Arc<dyn MarketDataTerminal>,
                client.clone() as Arc<dyn ExecutionGateway>,
                client as Arc<dyn PositionQuery>,
            )
        }
        TradingMode::Paper => {
            info!(slippage_bps = cfg.paper_slippage_bps, "Paper trading mode, using PaperClient");
            let market: Arc<dyn MarketDataTerminal> =
                Arc::new(BinanceClient::public(&cfg.binance_base_url)?);
            let paper = Arc::new(PaperClient::new(
                market.clone(),
                cfg.timeframe,
                cfg.paper_slippage_bps,
            ));
            (
                market,
                paper.clone() as Arc<dyn ExecutionGateway>,
                paper as Arc<dyn PositionQuery>,
            )
        }
    };

    let snapshot = match cfg.chart_snapshot_url.as_deref() {
        Some(url) => {
            info!(url, "Chart snapshots enabled for pattern alerts");
            Some(Arc::new(HttpSnapshot::new(url)?) as Arc<dyn ChartSnapshot>)
        }
        None => None,
    };

    let collab = Collaborators {
        terminal,
        gateway,
        positions,
        notifier: notifier as Arc<dyn NotificationSink>,
        snapshot,
    };

    // ── Supervisor ────────────────────────────────────────────────────────────
    let (supervisor, handle) = Supervisor::new(SupervisorConfig::from_config(&cfg), collab);
    tokio::spawn(supervisor.run());

    // ── Telegram C2 ───────────────────────────────────────────────────────────
    match (cfg.telegram_token.clone(), cfg.telegram_chat_id) {
        (Some(token), Some(chat_id)) => {
            let deps = BotDeps {
                supervisor: handle.clone(),
                trading_mode: cfg.trading_mode,
                chat_id,
            };
            tokio::spawn(start_bot(token, deps));
        }
        _ => warn!("Telegram not configured, command bot disabled"),
    }

    // ── Control API ───────────────────────────────────────────────────────────
    let api_state = api::AppState::new(handle.clone(), cfg.dashboard_token.clone());
    let port = cfg.dashboard_port;
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_state, port).await {
            error!(error = %e, port, "Control API failed");
        }
    });

    if cfg.auto_start {
        let result = handle.start().await;
        info!(status = ?result.status, message = %result.message, "Auto-start");
    }

    // Keep main alive
    info!("All subsystems started. Waiting for shutdown signal.");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping bot");
    match tokio::time::timeout(SHUTDOWN_GRACE, handle.shutdown()).await {
        Ok(()) => info!("Monitoring loop stopped, exiting"),
        Err(_) => warn!(grace = ?SHUTDOWN_GRACE, "Monitoring loop did not stop in time, exiting anyway"),
    }
    Ok(())
}
