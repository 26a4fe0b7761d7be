pub mod bollinger;
pub mod ema;
pub mod rsi;

pub use bollinger::{BbOutput, BollingerBands};
pub use ema::EmaIndicator;
pub use rsi::RsiIndicator;

use serde::{Deserialize, Serialize};

use common::CandleWindow;

pub const RSI_PERIOD: usize = 14;
pub const EMA_FAST_PERIOD: usize = 20;
pub const EMA_SLOW_PERIOD: usize = 50;
pub const BB_PERIOD: usize = 20;
pub const BB_STD: f64 = 2.0;

/// Longest lookback; rows before this much history are discarded.
pub const WARMUP_PERIOD: usize = EMA_SLOW_PERIOD;

/// Every indicator value for one candle, all defined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRow {
    pub time: i64,
    pub close: f64,
    pub rsi: f64,
    pub ema_20: f64,
    pub ema_50: f64,
    pub bb_lower: f64,
    pub bb_mid: f64,
    pub bb_upper: f64,
}

/// The valid suffix of a window's indicator series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSeries {
    pub rows: Vec<IndicatorRow>,
}

impl IndicatorSeries {
    pub fn latest(&self) -> Option<&IndicatorRow> {
        self.rows.last()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

/// RSI(14), EMA(20), EMA(50) and Bollinger(20, 2σ) over one window.
pub struct IndicatorEngine;

impl IndicatorEngine {
    /// Compute all indicators and keep only rows where every one is defined.
    /// A window shorter than `WARMUP_PERIOD` yields an empty series.
    pub fn compute(window: &CandleWindow) -> IndicatorSeries {
        let closes = window.closes();

        let rsi = RsiIndicator::new(RSI_PERIOD).series(&closes);
        let ema_fast = EmaIndicator::new(EMA_FAST_PERIOD).series(&closes);
        let ema_slow = EmaIndicator::new(EMA_SLOW_PERIOD).series(&closes);
        let bands = BollingerBands::new(BB_PERIOD, BB_STD).series(&closes);

        let rows = window
            .candles()
            .iter()
            .enumerate()
            .filter_map(|(i, candle)| {
                let bb = bands[i]?;
                Some(IndicatorRow {
                    time: candle.time(),
                    close: candle.close(),
                    rsi: rsi[i]?,
                    ema_20: ema_fast[i]?,
                    ema_50: ema_slow[i]?,
                    bb_lower: bb.lower,
                    bb_mid: bb.middle,
                    bb_upper: bb.upper,
                })
            })
            .collect();

        IndicatorSeries { rows }
    }
}
