pub mod analysis;
pub mod indicators;
pub mod pattern;
pub mod signal;
pub mod volume;

pub use analysis::{analyze, WindowAnalysis};
pub use indicators::{IndicatorEngine, IndicatorRow, IndicatorSeries, WARMUP_PERIOD};
pub use pattern::{PatternDetector, PatternMemory, PatternScan};
pub use signal::SignalEvaluator;
pub use volume::{VolumeClassifier, WindowStatistics};
