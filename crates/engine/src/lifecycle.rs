use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use common::{ActionResult, AnalyzedCandle, EngineState, StatusReport};
use strategy::WindowAnalysis;

use crate::tick::{Collaborators, LatestAnalysis, SupervisorConfig, Ticker};

enum Command {
    Start(oneshot::Sender<ActionResult>),
    Stop(oneshot::Sender<ActionResult>),
    Shutdown(oneshot::Sender<()>),
}

/// Cloneable handle passed to the control surfaces (Telegram, API).
#[derive(Clone)]
pub struct SupervisorHandle {
    command_tx: mpsc::Sender<Command>,
    state: Arc<RwLock<EngineState>>,
    latest: LatestAnalysis,
    symbol: Arc<str>,
}

impl SupervisorHandle {
    pub async fn start(&self) -> ActionResult {
        self.request(Command::Start).await
    }

    pub async fn stop(&self) -> ActionResult {
        self.request(Command::Stop).await
    }

    /// Stop any running loop, wait for its teardown and end the supervisor.
    /// Later commands report that the supervisor is not available.
    pub async fn shutdown(&self) {
        let (tx, rx) = oneshot::channel();
        if self.command_tx.send(Command::Shutdown(tx)).await.is_ok() {
            let _ = rx.await;
        }
    }

    async fn request(&self, make: fn(oneshot::Sender<ActionResult>) -> Command) -> ActionResult {
        let (tx, rx) = oneshot::channel();
        if self.command_tx.send(make(tx)).await.is_err() {
            return ActionResult::warning("Supervisor is not available.");
        }
        rx.await
            .unwrap_or_else(|_| ActionResult::warning("Supervisor is not available."))
    }

    pub async fn state(&self) -> EngineState {
        *self.state.read().await
    }

    pub async fn status(&self) -> StatusReport {
        let state = self.state().await;
        StatusReport {
            running: state == EngineState::Running,
            symbol: self.symbol.to_string(),
            state,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub async fn latest_analysis(&self) -> Option<Arc<WindowAnalysis>> {
        self.latest.read().await.clone()
    }

    /// Most recent analyzed window. Empty before the first analysis or when
    /// `symbol` names something other than the configured symbol.
    pub async fn latest_analyzed_candles(&self, symbol: Option<&str>) -> Vec<AnalyzedCandle> {
        if let Some(requested) = symbol {
            if !requested.eq_ignore_ascii_case(&self.symbol) {
                return Vec::new();
            }
        }
        self.latest
            .read()
            .await
            .as_ref()
            .map(|a| a.candles.clone())
            .unwrap_or_default()
    }
}

struct RunningLoop {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl RunningLoop {
    fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

/// Owns the monitoring loop. Start/Stop arrive over a channel so at most one
/// loop is ever alive.
pub struct Supervisor {
    cfg: Arc<SupervisorConfig>,
    collab: Collaborators,
    state: Arc<RwLock<EngineState>>,
    latest: LatestAnalysis,
    command_rx: mpsc::Receiver<Command>,
    current: Option<RunningLoop>,
}

impl Supervisor {
    pub fn new(cfg: SupervisorConfig, collab: Collaborators) -> (Self, SupervisorHandle) {
        let (command_tx, command_rx) = mpsc::channel(32);
        let state = Arc::new(RwLock::new(EngineState::Stopped));
        let latest: LatestAnalysis = Arc::new(RwLock::new(None));

        let handle = SupervisorHandle {
            command_tx,
            state: state.clone(),
            latest: latest.clone(),
            symbol: Arc::from(cfg.symbol.as_str()),
        };

        let supervisor = Supervisor {
            cfg: Arc::new(cfg),
            collab,
            state,
            latest,
            command_rx,
            current: None,
        };

        (supervisor, handle)
    }

    /// Process commands until every handle is dropped. Call from `tokio::spawn`.
    pub async fn run(mut self) {
        info!("Supervisor initialized in Stopped state. Waiting for Start command.");

        while let Some(cmd) = self.command_rx.recv().await {
            match cmd {
                Command::Start(reply) => {
                    let result = self.handle_start().await;
                    let _ = reply.send(result);
                }
                Command::Stop(reply) => {
                    let result = self.handle_stop().await;
                    let _ = reply.send(result);
                }
                Command::Shutdown(reply) => {
                    info!("Supervisor shutting down");
                    self.drain().await;
                    let _ = reply.send(());
                    return;
                }
            }
        }

        warn!("Supervisor command channel closed, shutting down");
        self.drain().await;
    }

    /// Cancel the current loop and wait until it has shut the terminal down.
    async fn drain(&mut self) {
        if let Some(run) = self.current.take() {
            run.token.cancel();
            if let Err(e) = run.task.await {
                error!(error = %e, "Monitoring loop task failed");
            }
        }
        *self.state.write().await = EngineState::Stopped;
    }

    async fn handle_start(&mut self) -> ActionResult {
        if let Some(run) = self.current.take() {
            if run.is_active() {
                if run.token.is_cancelled() {
                    self.current = Some(run);
                    return ActionResult::warning("Bot is still stopping, try again shortly.");
                }
                if *self.state.read().await == EngineState::Running {
                    self.current = Some(run);
                    info!("Start requested but bot is already running");
                    return ActionResult::warning("Bot is already running!");
                }
                // loop gave up on its own and is finishing its teardown
                let _ = run.task.await;
            }
        }

        info!(symbol = %self.cfg.symbol, timeframe = %self.cfg.timeframe, "Starting monitoring loop");
        *self.state.write().await = EngineState::Running;

        let token = CancellationToken::new();
        let ticker = Ticker::new(self.cfg.clone(), self.collab.clone(), self.latest.clone());
        let task = tokio::spawn(run_loop(ticker, token.clone(), self.state.clone()));
        self.current = Some(RunningLoop { token, task });

        ActionResult::success("Bot started successfully.")
    }

    async fn handle_stop(&mut self) -> ActionResult {
        match &self.current {
            Some(run) if run.is_active() && !run.token.is_cancelled() => {
                info!("Stop requested, signalling monitoring loop");
                run.token.cancel();
                *self.state.write().await = EngineState::Stopped;
                ActionResult::success("Bot is stopping.")
            }
            _ => ActionResult::warning("Bot is not running."),
        }
    }
}

async fn run_loop(mut ticker: Ticker, token: CancellationToken, state: Arc<RwLock<EngineState>>) {
    let terminal = ticker.terminal().clone();
    let notifier = ticker.notifier().clone();
    let cfg = ticker.cfg.clone();

    if let Err(e) = terminal.connect().await {
        error!(error = %e, "Failed to connect to terminal, monitoring loop exiting");
        notifier
            .send_text(&format!("⚠️ Bot failed to connect: {e}"))
            .await;
        *state.write().await = EngineState::Stopped;
        return;
    }

    info!(symbol = %cfg.symbol, timeframe = %cfg.timeframe, mode = %cfg.mode, "Bot connected, monitoring");
    notifier
        .send_text(&format!(
            "🚀 Bot started: {} {} ({})",
            cfg.symbol, cfg.timeframe, cfg.mode
        ))
        .await;

    while !token.is_cancelled() {
        let delay = match ticker.tick().await {
            Ok(outcome) => {
                debug!(?outcome, "Tick complete");
                cfg.poll_interval
            }
            Err(e) if e.is_fatal() => {
                error!(error = %e, "Fatal error in monitoring loop, stopping");
                break;
            }
            Err(e) => {
                warn!(error = %e, retry_in = ?cfg.retry_delay, "Error in monitoring loop");
                cfg.retry_delay
            }
        };

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    terminal.shutdown().await;
    *state.write().await = EngineState::Stopped;
    info!("Monitoring loop stopped");
    notifier.send_text("🛑 Bot stopped.").await;
}
