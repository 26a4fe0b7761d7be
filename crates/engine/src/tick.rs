use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use common::{
    CandleWindow, ChartSnapshot, Config, CooldownScope, ExecutionGateway, MarketDataTerminal,
    NotificationSink, PositionQuery, Result, Timeframe, TradeAction, TradingMode,
};
use strategy::{analyze, PatternMemory, SignalEvaluator, WindowAnalysis, WARMUP_PERIOD};

use crate::executor::{ExecutionOutcome, OrderExecutor};

/// Loop parameters, fixed for the lifetime of a supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub candle_count: usize,
    pub volume: f64,
    pub poll_interval: Duration,
    pub retry_delay: Duration,
    pub cooldown_scope: CooldownScope,
    pub mode: TradingMode,
}

impl SupervisorConfig {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            symbol: cfg.symbol.clone(),
            timeframe: cfg.timeframe,
            candle_count: cfg.candle_count,
            volume: cfg.volume,
            poll_interval: cfg.poll_interval,
            retry_delay: cfg.retry_delay,
            cooldown_scope: cfg.cooldown_scope,
            mode: cfg.trading_mode,
        }
    }
}

/// External services the loop talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub terminal: Arc<dyn MarketDataTerminal>,
    pub gateway: Arc<dyn ExecutionGateway>,
    pub positions: Arc<dyn PositionQuery>,
    pub notifier: Arc<dyn NotificationSink>,
    pub snapshot: Option<Arc<dyn ChartSnapshot>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    EmptyWindow,
    InsufficientHistory { have: usize, need: usize },
}

/// How a tick that did not error ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Watchdog found the terminal down and reconnected; nothing else ran.
    Reconnected,
    Skipped(SkipReason),
    Completed { action: TradeAction },
    OrderRejected { code: i64 },
}

pub(crate) type LatestAnalysis = Arc<RwLock<Option<Arc<WindowAnalysis>>>>;

/// Per-run state: one instance per `start()`.
pub(crate) struct Ticker {
    pub(crate) cfg: Arc<SupervisorConfig>,
    collab: Collaborators,
    executor: OrderExecutor,
    memory: PatternMemory,
    last_announced: Option<i64>,
    latest: LatestAnalysis,
}

impl Ticker {
    pub(crate) fn new(cfg: Arc<SupervisorConfig>, collab: Collaborators, latest: LatestAnalysis) -> Self {
        let executor = OrderExecutor::new(collab.gateway.clone(), collab.notifier.clone(), cfg.mode);
        Self {
            cfg,
            collab,
            executor,
            memory: PatternMemory::new(),
            last_announced: None,
            latest,
        }
    }

    pub(crate) fn terminal(&self) -> &Arc<dyn MarketDataTerminal> {
        &self.collab.terminal
    }

    pub(crate) fn notifier(&self) -> &Arc<dyn NotificationSink> {
        &self.collab.notifier
    }

    /// One pass: watchdog, fetch, analyze, decide, dispatch.
    pub(crate) async fn tick(&mut self) -> Result<TickOutcome> {
        let cfg = self.cfg.clone();

        if !self.collab.terminal.is_connected().await {
            warn!("Terminal connection lost, reconnecting");
            self.collab.terminal.connect().await?;
            info!("Terminal reconnected");
            return Ok(TickOutcome::Reconnected);
        }

        let candles = self
            .collab
            .terminal
            .fetch_candles(&cfg.symbol, cfg.timeframe, cfg.candle_count)
            .await?;
        if candles.is_empty() {
            debug!(symbol = %cfg.symbol, "Empty fetch, skipping tick");
            return Ok(TickOutcome::Skipped(SkipReason::EmptyWindow));
        }
        let window = CandleWindow::new(candles, cfg.candle_count)?;

        if cfg.cooldown_scope == CooldownScope::Window {
            self.memory = PatternMemory::new();
        }
        let analysis = Arc::new(analyze(&cfg.symbol, &window, &mut self.memory)?);
        *self.latest.write().await = Some(analysis.clone());
        self.announce_patterns(&analysis, &window).await;

        if analysis.indicators.is_empty() {
            debug!(have = window.len(), need = WARMUP_PERIOD, "Not enough history for indicators");
            return Ok(TickOutcome::Skipped(SkipReason::InsufficientHistory {
                have: window.len(),
                need: WARMUP_PERIOD,
            }));
        }

        let directive = SignalEvaluator::evaluate(
            &analysis.indicators,
            &cfg.symbol,
            cfg.volume,
            self.collab.positions.as_ref(),
        )
        .await?;

        match self.executor.execute(&directive).await? {
            ExecutionOutcome::Skipped | ExecutionOutcome::Filled(_) => Ok(TickOutcome::Completed {
                action: directive.action,
            }),
            ExecutionOutcome::Rejected { code, .. } => Ok(TickOutcome::OrderRejected { code }),
        }
    }

    /// Alert on patterns first seen on the two most recent candles, once each.
    async fn announce_patterns(&mut self, analysis: &WindowAnalysis, window: &CandleWindow) {
        let candles = window.candles();
        let recent_from = candles[candles.len().saturating_sub(2)].time();
        let floor = self.last_announced.unwrap_or(i64::MIN);

        let fresh: Vec<i64> = analysis
            .new_patterns
            .iter()
            .copied()
            .filter(|&t| t > floor && t >= recent_from)
            .collect();

        for time in fresh {
            info!(symbol = %analysis.symbol, time, "V_SHAPE pattern detected");
            let message = format!(
                "📐 V_SHAPE reversal on {} {} (candle {})",
                analysis.symbol, self.cfg.timeframe, time
            );
            self.collab.notifier.send_text(&message).await;
            if let Some(snapshot) = &self.collab.snapshot {
                if let Some(bytes) = snapshot.capture().await {
                    self.collab.notifier.send_image(bytes, &message).await;
                }
            }
            self.last_announced = Some(time);
        }
    }
}
