use async_trait::async_trait;

use crate::{Candle, Order, OrderReceipt, Result, Timeframe};

/// Source of candles and the connectivity the watchdog checks every tick.
///
/// `BinanceClient` implements this for both live and paper trading.
#[async_trait]
pub trait MarketDataTerminal: Send + Sync {
    /// Cheap liveness check. Never errors; an unreachable terminal is `false`.
    async fn is_connected(&self) -> bool;

    /// Establish (or re-establish) the session using the credentials the
    /// terminal was built with.
    async fn connect(&self) -> Result<()>;

    /// The latest `count` candles, oldest first. No data is `Ok(vec![])`.
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Candle>>;

    /// Release the session when the loop ends.
    async fn shutdown(&self) {}
}

/// Places market orders.
///
/// Only `OrderExecutor` in `crates/engine` calls `submit_market_order`.
#[async_trait]
pub trait ExecutionGateway: Send + Sync {
    /// Returns `Error::OrderRejected` when the venue refuses the order.
    async fn submit_market_order(&self, order: &Order) -> Result<OrderReceipt>;
}

/// Duplicate-entry guard used by the signal evaluator.
#[async_trait]
pub trait PositionQuery: Send + Sync {
    async fn has_open_position(&self, symbol: &str) -> Result<bool>;
}

/// Fire-and-forget operator notifications. Implementations log their own
/// failures; nothing is returned to the pipeline.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send_text(&self, message: &str);

    async fn send_image(&self, bytes: Vec<u8>, caption: &str);
}

/// Optional provider of a chart image to attach to pattern alerts.
#[async_trait]
pub trait ChartSnapshot: Send + Sync {
    async fn capture(&self) -> Option<Vec<u8>>;
}
