use serde::Serialize;

use common::{AnalyzedCandle, CandleWindow, ColorState, Result};

use crate::indicators::{IndicatorEngine, IndicatorSeries};
use crate::pattern::{PatternDetector, PatternMemory};
use crate::volume::{VolumeClassifier, WindowStatistics};

/// Everything derived from one window: per-candle tags and the indicator suffix.
#[derive(Debug, Clone, Serialize)]
pub struct WindowAnalysis {
    pub symbol: String,
    pub stats: WindowStatistics,
    pub candles: Vec<AnalyzedCandle>,
    pub indicators: IndicatorSeries,
    /// Open times of patterns first detected in this window.
    pub new_patterns: Vec<i64>,
}

impl WindowAnalysis {
    pub fn pattern_count(&self) -> usize {
        self.candles.iter().filter(|c| c.pattern_label.is_some()).count()
    }
}

/// Run the volume classifier, pattern detector and indicator engine over a
/// non-empty window. The pattern highlight overrides the volume color.
pub fn analyze(
    symbol: &str,
    window: &CandleWindow,
    memory: &mut PatternMemory,
) -> Result<WindowAnalysis> {
    let (stats, colors) = VolumeClassifier::classify(window)?;
    let scan = PatternDetector::scan_with_memory(window, stats.avg_body_size, memory);
    let indicators = IndicatorEngine::compute(window);

    let candles = window
        .candles()
        .iter()
        .zip(colors)
        .zip(&scan.labels)
        .map(|((candle, color), label)| {
            let color = if label.is_some() { ColorState::Pattern } else { color };
            AnalyzedCandle::new(candle, color, *label)
        })
        .collect();

    let new_patterns = scan
        .new_detections
        .iter()
        .map(|&i| window.candles()[i].time())
        .collect();

    Ok(WindowAnalysis {
        symbol: symbol.to_string(),
        stats,
        candles,
        indicators,
        new_patterns,
    })
}
