use serde::{Deserialize, Serialize};

use common::{Candle, CandleWindow, ColorState, Error, Result};

/// A candle is "flow" when its tick volume exceeds this multiple of the
/// window's mean tick volume.
pub const FLOW_MULTIPLIER: f64 = 1.5;

/// Statistics scoped to a single window instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowStatistics {
    pub avg_volume: f64,
    /// Mean of `|open - close|` over the window.
    pub avg_body_size: f64,
    pub flow_threshold: f64,
}

/// Volume Spread Analysis: tags each candle as normal or abnormal-volume flow.
pub struct VolumeClassifier;

impl VolumeClassifier {
    /// Mean tick volume and mean body size. Fails on an empty window.
    pub fn statistics(window: &CandleWindow) -> Result<WindowStatistics> {
        let candles = window.candles();
        if candles.is_empty() {
            return Err(Error::EmptyWindow);
        }
        let n = candles.len() as f64;
        let avg_volume = candles.iter().map(|c| c.tick_volume() as f64).sum::<f64>() / n;
        let avg_body_size = candles.iter().map(Candle::body).sum::<f64>() / n;

        Ok(WindowStatistics {
            avg_volume,
            avg_body_size,
            flow_threshold: FLOW_MULTIPLIER * avg_volume,
        })
    }

    /// Color of one candle given the window's statistics. Independent of neighbours.
    pub fn color(candle: &Candle, stats: &WindowStatistics) -> ColorState {
        let flow = candle.tick_volume() as f64 > stats.flow_threshold;
        match (candle.is_bullish(), flow) {
            (true, true) => ColorState::FlowBuy,
            (false, true) => ColorState::FlowSell,
            (true, false) => ColorState::NormalBull,
            (false, false) => ColorState::NormalBear,
        }
    }

    /// Statistics plus one color per candle, in window order.
    pub fn classify(window: &CandleWindow) -> Result<(WindowStatistics, Vec<ColorState>)> {
        let stats = Self::statistics(window)?;
        let colors = window
            .candles()
            .iter()
            .map(|c| Self::color(c, &stats))
            .collect();
        Ok((stats, colors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(time: i64, open: f64, close: f64, volume: u64) -> Candle {
        Candle::new(time, open, open.max(close) + 0.1, open.min(close) - 0.1, close, volume).unwrap()
    }

    #[test]
    fn empty_window_is_an_error() {
        let window = CandleWindow::default();
        assert!(matches!(
            VolumeClassifier::statistics(&window),
            Err(Error::EmptyWindow)
        ));
    }

    #[test]
    fn statistics_are_arithmetic_means() {
        let window = CandleWindow::new(
            vec![
                candle(0, 10.0, 11.0, 100),
                candle(1, 11.0, 9.0, 200),
                candle(2, 9.0, 12.0, 300),
            ],
            10,
        )
        .unwrap();
        let stats = VolumeClassifier::statistics(&window).unwrap();
        assert!((stats.avg_volume - 200.0).abs() < 1e-9);
        assert!((stats.avg_body_size - 2.0).abs() < 1e-9);
        assert!((stats.flow_threshold - 300.0).abs() < 1e-9);
    }

    #[test]
    fn colors_follow_direction_and_flow() {
        // avg volume = 100, threshold = 150
        let window = CandleWindow::new(
            vec![
                candle(0, 1.0, 2.0, 40),
                candle(1, 2.0, 1.0, 40),
                candle(2, 1.0, 2.0, 160),
                candle(3, 2.0, 1.0, 160),
            ],
            10,
        )
        .unwrap();
        let (_, colors) = VolumeClassifier::classify(&window).unwrap();
        assert_eq!(
            colors,
            vec![
                ColorState::NormalBull,
                ColorState::NormalBear,
                ColorState::FlowBuy,
                ColorState::FlowSell,
            ]
        );
    }

    #[test]
    fn volume_equal_to_threshold_is_not_flow() {
        // volumes 150, 50, 100 → avg 100 → threshold 150
        let window = CandleWindow::new(
            vec![
                candle(0, 1.0, 2.0, 150),
                candle(1, 1.0, 2.0, 50),
                candle(2, 1.0, 2.0, 100),
            ],
            10,
        )
        .unwrap();
        let (_, colors) = VolumeClassifier::classify(&window).unwrap();
        assert_eq!(colors[0], ColorState::NormalBull);
    }

    #[test]
    fn single_candle_window_never_flows() {
        let window = CandleWindow::new(vec![candle(0, 2.0, 1.0, 1_000)], 10).unwrap();
        let (_, colors) = VolumeClassifier::classify(&window).unwrap();
        assert_eq!(colors, vec![ColorState::NormalBear]);
    }
}
