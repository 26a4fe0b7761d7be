use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use common::{
    ActionStatus, Candle, ChartSnapshot, CooldownScope, EngineState, Error, ExecutionGateway, MarketDataTerminal,
    NotificationSink, Order, OrderReceipt, OrderSide, PositionQuery, Result, Timeframe,
    TradingMode,
};
use engine::{Collaborators, Supervisor, SupervisorConfig, SupervisorHandle};

#[derive(Default)]
struct FakeTerminal {
    down: AtomicBool,
    refuse_connect: AtomicBool,
    fail_fetch: AtomicBool,
    candles: Mutex<Vec<Candle>>,
    connects: AtomicUsize,
    fetches: AtomicUsize,
    shutdowns: AtomicUsize,
}

#[async_trait]
impl MarketDataTerminal for FakeTerminal {
    async fn is_connected(&self) -> bool {
        !self.down.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse_connect.load(Ordering::SeqCst) {
            return Err(Error::Connection("terminal refused".into()));
        }
        self.down.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch_candles(&self, _symbol: &str, _tf: Timeframe, _count: usize) -> Result<Vec<Candle>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(Error::Fetch("no data".into()));
        }
        Ok(self.candles.lock().unwrap().clone())
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct FakeGateway {
    orders: Mutex<Vec<Order>>,
}

#[async_trait]
impl ExecutionGateway for FakeGateway {
    async fn submit_market_order(&self, order: &Order) -> Result<OrderReceipt> {
        self.orders.lock().unwrap().push(order.clone());
        Ok(OrderReceipt {
            ticket: self.orders.lock().unwrap().len() as u64,
            symbol: order.symbol.clone(),
            side: order.side,
            volume: order.volume,
            fill_price: 100.0,
            status: "FILLED".into(),
            timestamp: Utc::now(),
        })
    }
}

struct FakePositions(AtomicBool);

#[async_trait]
impl PositionQuery for FakePositions {
    async fn has_open_position(&self, _symbol: &str) -> Result<bool> {
        Ok(self.0.load(Ordering::SeqCst))
    }
}

#[derive(Default)]
struct Inbox(Mutex<Vec<String>>);

#[async_trait]
impl NotificationSink for Inbox {
    async fn send_text(&self, message: &str) {
        self.0.lock().unwrap().push(message.to_string());
    }

    async fn send_image(&self, _bytes: Vec<u8>, caption: &str) {
        self.0.lock().unwrap().push(format!("image:{caption}"));
    }
}

struct FakeSnapshot;

#[async_trait]
impl ChartSnapshot for FakeSnapshot {
    async fn capture(&self) -> Option<Vec<u8>> {
        Some(vec![0x89, 0x50, 0x4e, 0x47])
    }
}

struct Harness {
    handle: SupervisorHandle,
    terminal: Arc<FakeTerminal>,
    gateway: Arc<FakeGateway>,
    positions: Arc<FakePositions>,
    inbox: Arc<Inbox>,
}

fn harness() -> Harness {
    harness_with(None)
}

fn harness_with(snapshot: Option<Arc<dyn ChartSnapshot>>) -> Harness {
    let terminal = Arc::new(FakeTerminal::default());
    let gateway = Arc::new(FakeGateway::default());
    let positions = Arc::new(FakePositions(AtomicBool::new(false)));
    let inbox = Arc::new(Inbox::default());

    let cfg = SupervisorConfig {
        symbol: "BTCUSDT".into(),
        timeframe: Timeframe::M5,
        candle_count: 100,
        volume: 0.01,
        poll_interval: Duration::from_millis(10),
        retry_delay: Duration::from_millis(20),
        cooldown_scope: CooldownScope::Persistent,
        mode: TradingMode::Paper,
    };
    let collab = Collaborators {
        terminal: terminal.clone(),
        gateway: gateway.clone(),
        positions: positions.clone(),
        notifier: inbox.clone(),
        snapshot,
    };
    let (supervisor, handle) = Supervisor::new(cfg, collab);
    tokio::spawn(supervisor.run());

    Harness {
        handle,
        terminal,
        gateway,
        positions,
        inbox,
    }
}

/// Bearish candles with steadily falling closes: RSI pins at 0.
fn falling(n: usize) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let close = 500.0 - i as f64;
            Candle::new(i as i64 * 300, close + 0.5, close + 1.0, close - 0.5, close, 100).unwrap()
        })
        .collect()
}

async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

async fn wait_for_state(handle: &SupervisorHandle, want: EngineState) -> bool {
    for _ in 0..200 {
        if handle.state().await == want {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn start_is_idempotent_and_stop_reports_state() {
    let h = harness();

    let first = h.handle.start().await;
    assert_eq!(first.status, ActionStatus::Success);
    let second = h.handle.start().await;
    assert_eq!(second.status, ActionStatus::Warning);
    assert!(second.message.contains("already running"));

    let status = h.handle.status().await;
    assert!(status.running);
    assert_eq!(status.symbol, "BTCUSDT");

    let stopped = h.handle.stop().await;
    assert_eq!(stopped.status, ActionStatus::Success);
    assert_eq!(h.handle.state().await, EngineState::Stopped);
    assert!(wait_until(|| h.terminal.shutdowns.load(Ordering::SeqCst) == 1).await);

    let again = h.handle.stop().await;
    assert_eq!(again.status, ActionStatus::Warning);
}

#[tokio::test]
async fn oversold_window_places_buy_order() {
    let h = harness();
    *h.terminal.candles.lock().unwrap() = falling(60);

    h.handle.start().await;
    assert!(wait_until(|| !h.gateway.orders.lock().unwrap().is_empty()).await);
    h.handle.stop().await;

    let orders = h.gateway.orders.lock().unwrap();
    assert_eq!(orders[0].side, OrderSide::Buy);
    assert_eq!(orders[0].volume, 0.01);
    assert_eq!(orders[0].symbol, "BTCUSDT");
}

#[tokio::test]
async fn open_position_suppresses_entries() {
    let h = harness();
    h.positions.0.store(true, Ordering::SeqCst);
    *h.terminal.candles.lock().unwrap() = falling(60);

    h.handle.start().await;
    assert!(wait_until(|| h.terminal.fetches.load(Ordering::SeqCst) >= 3).await);
    h.handle.stop().await;

    assert!(h.gateway.orders.lock().unwrap().is_empty());
    assert_eq!(h.handle.latest_analyzed_candles(None).await.len(), 60);
}

#[tokio::test]
async fn short_history_publishes_candles_without_trading() {
    let h = harness();
    *h.terminal.candles.lock().unwrap() = falling(30);

    h.handle.start().await;
    assert!(wait_until(|| h.terminal.fetches.load(Ordering::SeqCst) >= 2).await);
    h.handle.stop().await;

    assert!(h.gateway.orders.lock().unwrap().is_empty());
    let analysis = h.handle.latest_analysis().await.expect("analysis published");
    assert_eq!(analysis.candles.len(), 30);
    assert!(analysis.indicators.is_empty());
    assert!(h.handle.latest_analyzed_candles(Some("ETHUSDT")).await.is_empty());
    assert_eq!(h.handle.latest_analyzed_candles(Some("btcusdt")).await.len(), 30);
}

#[tokio::test]
async fn empty_fetch_skips_tick() {
    let h = harness();

    h.handle.start().await;
    assert!(wait_until(|| h.terminal.fetches.load(Ordering::SeqCst) >= 3).await);
    h.handle.stop().await;

    assert!(h.handle.latest_analysis().await.is_none());
    assert!(h.gateway.orders.lock().unwrap().is_empty());
}

#[tokio::test]
async fn fetch_errors_are_retried() {
    let h = harness();
    h.terminal.fail_fetch.store(true, Ordering::SeqCst);

    h.handle.start().await;
    assert!(wait_until(|| h.terminal.fetches.load(Ordering::SeqCst) >= 3).await);
    assert_eq!(h.handle.state().await, EngineState::Running);

    h.terminal.fail_fetch.store(false, Ordering::SeqCst);
    *h.terminal.candles.lock().unwrap() = falling(60);
    assert!(wait_until(|| !h.gateway.orders.lock().unwrap().is_empty()).await);
    h.handle.stop().await;
}

#[tokio::test]
async fn lost_connection_triggers_reconnect() {
    let h = harness();
    h.handle.start().await;
    assert!(wait_until(|| h.terminal.fetches.load(Ordering::SeqCst) >= 1).await);
    let connects_before = h.terminal.connects.load(Ordering::SeqCst);

    h.terminal.down.store(true, Ordering::SeqCst);
    assert!(wait_until(|| h.terminal.connects.load(Ordering::SeqCst) > connects_before).await);
    assert!(!h.terminal.down.load(Ordering::SeqCst));
    h.handle.stop().await;
}

#[tokio::test]
async fn failed_startup_connect_returns_to_stopped() {
    let h = harness();
    h.terminal.refuse_connect.store(true, Ordering::SeqCst);

    let result = h.handle.start().await;
    assert!(result.is_success());
    assert!(wait_for_state(&h.handle, EngineState::Stopped).await);
    assert_eq!(h.terminal.fetches.load(Ordering::SeqCst), 0);
    assert!(h.inbox.0.lock().unwrap().iter().any(|m| m.contains("failed to connect")));

    // the loop has exited so a fresh start is accepted
    h.terminal.refuse_connect.store(false, Ordering::SeqCst);
    assert!(h.handle.start().await.is_success());
    h.handle.stop().await;
}

/// Twenty bullish candles of body 1.0, except a 3.75 drop at 18 and a 3.25
/// recovery on the last candle.
fn v_shape_at_end() -> Vec<Candle> {
    (0..20)
        .map(|i| {
            let (open, close) = match i {
                18 => (130.0, 126.25),
                19 => (126.25, 129.5),
                _ => (100.0 + i as f64, 101.0 + i as f64),
            };
            Candle::new(i * 300, open, open.max(close) + 0.25, open.min(close) - 0.25, close, 100)
                .unwrap()
        })
        .collect()
}

#[tokio::test]
async fn new_pattern_is_announced_once_with_snapshot() {
    let h = harness_with(Some(Arc::new(FakeSnapshot)));
    *h.terminal.candles.lock().unwrap() = v_shape_at_end();

    h.handle.start().await;
    assert!(wait_until(|| h.terminal.fetches.load(Ordering::SeqCst) >= 4).await);
    h.handle.stop().await;

    let inbox = h.inbox.0.lock().unwrap();
    let texts = inbox.iter().filter(|m| m.starts_with("📐")).count();
    let images = inbox.iter().filter(|m| m.starts_with("image:")).count();
    assert_eq!((texts, images), (1, 1));
    drop(inbox);

    let candles = h.handle.latest_analyzed_candles(None).await;
    assert!(candles[19].pattern_label.is_some());
}

#[tokio::test]
async fn shutdown_waits_for_loop_teardown() {
    let h = harness();
    *h.terminal.candles.lock().unwrap() = falling(30);

    h.handle.start().await;
    assert!(wait_until(|| h.terminal.fetches.load(Ordering::SeqCst) >= 1).await);
    h.handle.shutdown().await;

    // teardown already happened when shutdown returned
    assert_eq!(h.terminal.shutdowns.load(Ordering::SeqCst), 1);
    assert!(h.inbox.0.lock().unwrap().iter().any(|m| m == "🛑 Bot stopped."));
    assert_eq!(h.handle.state().await, EngineState::Stopped);

    let late = h.handle.start().await;
    assert_eq!(late.status, ActionStatus::Warning);
    assert!(late.message.contains("not available"));
}

#[tokio::test]
async fn shutdown_while_stopped_returns() {
    let h = harness();
    h.handle.shutdown().await;
    assert_eq!(h.terminal.shutdowns.load(Ordering::SeqCst), 0);
    assert_eq!(h.handle.stop().await.status, ActionStatus::Warning);
}
