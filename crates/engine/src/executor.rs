use std::sync::Arc;

use tracing::{error, info};

use common::{
    Error, ExecutionGateway, NotificationSink, Order, OrderReceipt, OrderSide, Result,
    TradeDirective, TradingMode,
};

/// What happened to a directive handed to the executor.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    /// `Hold` directives place nothing.
    Skipped,
    Filled(OrderReceipt),
    Rejected { code: i64, description: String },
}

/// Submits Buy/Sell directives as market orders and reports the outcome.
///
/// This is the ONLY component that calls `ExecutionGateway::submit_market_order`.
pub struct OrderExecutor {
    gateway: Arc<dyn ExecutionGateway>,
    notifier: Arc<dyn NotificationSink>,
    mode: TradingMode,
}

impl OrderExecutor {
    pub fn new(
        gateway: Arc<dyn ExecutionGateway>,
        notifier: Arc<dyn NotificationSink>,
        mode: TradingMode,
    ) -> Self {
        Self {
            gateway,
            notifier,
            mode,
        }
    }

    /// A rejection is logged and reported but not retried; transport errors
    /// are returned to the caller.
    pub async fn execute(&self, directive: &TradeDirective) -> Result<ExecutionOutcome> {
        let Some(side) = directive.action.side() else {
            return Ok(ExecutionOutcome::Skipped);
        };

        let order = Order::market(&directive.symbol, side, directive.volume);
        info!(
            symbol = %order.symbol,
            side = %order.side,
            volume = order.volume,
            mode = %self.mode,
            "Executing order"
        );

        match self.gateway.submit_market_order(&order).await {
            Ok(receipt) => {
                info!(
                    symbol = %receipt.symbol,
                    ticket = receipt.ticket,
                    price = receipt.fill_price,
                    volume = receipt.volume,
                    "{} executed successfully",
                    receipt.side
                );
                let icon = match receipt.side {
                    OrderSide::Buy => "🟢",
                    OrderSide::Sell => "🔴",
                };
                self.notifier
                    .send_text(&format!(
                        "{icon} {} {} {} @ {:.5} (ticket {}, {})",
                        receipt.side,
                        receipt.volume,
                        receipt.symbol,
                        receipt.fill_price,
                        receipt.ticket,
                        self.mode
                    ))
                    .await;
                Ok(ExecutionOutcome::Filled(receipt))
            }
            Err(Error::OrderRejected { code, description }) => {
                error!(
                    symbol = %order.symbol,
                    side = %order.side,
                    code,
                    description = %description,
                    "Order failed"
                );
                self.notifier
                    .send_text(&format!(
                        "🚨 {} order on {} failed (code {code}): {description}",
                        order.side, order.symbol
                    ))
                    .await;
                Ok(ExecutionOutcome::Rejected { code, description })
            }
            Err(e) => Err(e),
        }
    }
}
