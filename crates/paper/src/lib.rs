use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{
    Error, ExecutionGateway, MarketDataTerminal, Order, OrderReceipt, OrderSide, Position,
    PositionQuery, Result, Timeframe,
};

/// Simulated execution gateway for paper trading.
///
/// Fills are priced at the latest close reported by the market data terminal,
/// with configurable slippage. Every order opens its own position; nothing is
/// netted or closed. No real orders are ever sent.
pub struct PaperClient {
    terminal: Arc<dyn MarketDataTerminal>,
    timeframe: Timeframe,
    /// Slippage in basis points applied to all fills.
    slippage_bps: f64,
    positions: Arc<RwLock<Vec<Position>>>,
    next_ticket: AtomicU64,
}

impl PaperClient {
    pub fn new(terminal: Arc<dyn MarketDataTerminal>, timeframe: Timeframe, slippage_bps: f64) -> Self {
        info!(slippage_bps, %timeframe, "PaperClient initialized");
        Self {
            terminal,
            timeframe,
            slippage_bps,
            positions: Arc::new(RwLock::new(Vec::new())),
            next_ticket: AtomicU64::new(1),
        }
    }

    /// Expose open positions (for the dashboard API and auditing).
    pub fn positions_handle(&self) -> Arc<RwLock<Vec<Position>>> {
        self.positions.clone()
    }

    async fn last_close(&self, symbol: &str) -> Result<f64> {
        let candles = self.terminal.fetch_candles(symbol, self.timeframe, 1).await?;
        candles
            .last()
            .map(|c| c.close())
            .ok_or_else(|| Error::Fetch(format!("No price available for {symbol}")))
    }
}

#[async_trait]
impl ExecutionGateway for PaperClient {
    async fn submit_market_order(&self, order: &Order) -> Result<OrderReceipt> {
        let mid_price = self.last_close(&order.symbol).await?;

        // buys pay more, sells receive less
        let fill_price = match order.side {
            OrderSide::Buy => mid_price * (1.0 + self.slippage_bps / 10_000.0),
            OrderSide::Sell => mid_price * (1.0 - self.slippage_bps / 10_000.0),
        };
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let now = Utc::now();

        debug!(
            symbol = %order.symbol,
            side = %order.side,
            mid = mid_price,
            fill = fill_price,
            volume = order.volume,
            ticket,
            "Paper fill simulated"
        );

        self.positions.write().await.push(Position {
            ticket,
            symbol: order.symbol.clone(),
            side: order.side,
            entry_price: fill_price,
            volume: order.volume,
            opened_at: now,
        });

        Ok(OrderReceipt {
            ticket,
            symbol: order.symbol.clone(),
            side: order.side,
            volume: order.volume,
            fill_price,
            status: "FILLED".into(),
            timestamp: now,
        })
    }
}

#[async_trait]
impl PositionQuery for PaperClient {
    async fn has_open_position(&self, symbol: &str) -> Result<bool> {
        Ok(self.positions.read().await.iter().any(|p| p.symbol == symbol))
    }
}
