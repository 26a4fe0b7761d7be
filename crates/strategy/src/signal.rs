use tracing::{debug, info};

use common::{PositionQuery, Result, TradeAction, TradeDirective};

use crate::indicators::IndicatorSeries;

pub const RSI_OVERSOLD: f64 = 30.0;
pub const RSI_OVERBOUGHT: f64 = 70.0;

/// Reduces the latest indicator row plus position state into a directive.
pub struct SignalEvaluator;

impl SignalEvaluator {
    /// RSI rule on the most recent row only, ignoring positions.
    pub fn candidate(series: &IndicatorSeries) -> TradeAction {
        let Some(last) = series.latest() else {
            return TradeAction::Hold;
        };
        if last.rsi < RSI_OVERSOLD {
            TradeAction::Buy
        } else if last.rsi > RSI_OVERBOUGHT {
            TradeAction::Sell
        } else {
            TradeAction::Hold
        }
    }

    /// Apply the duplicate-entry guard to a candidate.
    pub fn decide(candidate: TradeAction, has_open_position: bool) -> TradeAction {
        match candidate {
            TradeAction::Buy | TradeAction::Sell if has_open_position => TradeAction::Hold,
            other => other,
        }
    }

    /// Full evaluation. The position query is consulted only for a Buy/Sell
    /// candidate.
    pub async fn evaluate(
        series: &IndicatorSeries,
        symbol: &str,
        volume: f64,
        positions: &dyn PositionQuery,
    ) -> Result<TradeDirective> {
        let candidate = Self::candidate(series);
        if candidate == TradeAction::Hold {
            if let Some(row) = series.latest() {
                debug!(symbol, rsi = row.rsi, "No signal");
            }
            return Ok(TradeDirective::hold(symbol, volume));
        }

        let rsi = series.latest().map(|r| r.rsi).unwrap_or_default();
        info!(symbol, rsi, signal = %candidate, "Signal detected");

        let has_open = positions.has_open_position(symbol).await?;
        let action = Self::decide(candidate, has_open);
        if action == TradeAction::Hold {
            info!(symbol, "Position already open, skipping entry");
        }

        Ok(TradeDirective {
            action,
            symbol: symbol.to_string(),
            volume,
        })
    }
}
