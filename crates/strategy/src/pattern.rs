use std::collections::BTreeSet;

use common::{Candle, CandleWindow, PatternKind};

/// Minimum distance, in candles, between two detections.
pub const COOLDOWN_BARS: i64 = 3;

/// The recovery body must be at least this fraction of the drop body.
pub const RECOVERY_RATIO: f64 = 0.8;

/// Far enough in the past that the first eligible candle is never blocked.
const NO_DETECTION: i64 = -10;

/// Open times of candles already confirmed as patterns on earlier ticks.
///
/// Keying by time instead of in-window index keeps the cooldown and the
/// labels stable while the window slides forward between polls.
#[derive(Debug, Clone, Default)]
pub struct PatternMemory {
    detections: BTreeSet<i64>,
}

impl PatternMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, time: i64) -> bool {
        self.detections.contains(&time)
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    fn forget(&mut self, time: i64) {
        self.detections.remove(&time);
    }

    /// Drop detections older than `time`; they can never re-enter a window.
    fn prune_before(&mut self, time: i64) {
        self.detections = self.detections.split_off(&time);
    }
}

/// Result of one forward scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternScan {
    /// One entry per candle, in window order.
    pub labels: Vec<Option<PatternKind>>,
    /// Indices detected during this scan that were not already in memory.
    pub new_detections: Vec<usize>,
}

impl PatternScan {
    pub fn detected_indices(&self) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter_map(|(i, l)| l.map(|_| i))
            .collect()
    }
}

/// Greedy single-pass V-shape detector.
///
/// `last_pattern_index` is the only cross-candle state; a fresh detector is
/// built for every scan.
#[derive(Debug, Clone)]
pub struct PatternDetector {
    avg_body_size: f64,
    last_pattern_index: i64,
}

impl PatternDetector {
    pub fn new(avg_body_size: f64) -> Self {
        Self {
            avg_body_size,
            last_pattern_index: NO_DETECTION,
        }
    }

    /// Scan from a clean state; nothing survives the call.
    pub fn scan(window: &CandleWindow, avg_body_size: f64) -> PatternScan {
        Self::scan_with_memory(window, avg_body_size, &mut PatternMemory::new())
    }

    /// Scan honouring detections remembered from earlier windows, and record
    /// new ones into `memory`. Remembered candles are re-checked against the
    /// current window and forgotten once they no longer form the shape.
    pub fn scan_with_memory(
        window: &CandleWindow,
        avg_body_size: f64,
        memory: &mut PatternMemory,
    ) -> PatternScan {
        let candles = window.candles();
        let Some(first) = candles.first() else {
            return PatternScan::default();
        };
        memory.prune_before(first.time());

        // Remembered candles keep their label only while the shape still
        // holds; the newest candle may still be forming when first seen.
        // One at index 0 has lost its predecessor and anchors the cooldown
        // without a label.
        let mut anchor = NO_DETECTION;
        let mut remembered: Vec<usize> = Vec::new();
        for (i, candle) in candles.iter().enumerate() {
            if !memory.contains(candle.time()) {
                continue;
            }
            if i == 0 {
                anchor = 0;
            } else if is_v_shape(&candles[i - 1], candle, avg_body_size) {
                remembered.push(i);
            } else {
                memory.forget(candle.time());
            }
        }

        let mut detector = Self::new(avg_body_size);
        detector.last_pattern_index = anchor;
        let mut scan = PatternScan {
            labels: vec![None; candles.len()],
            new_detections: Vec::new(),
        };

        for i in 0..candles.len() {
            if remembered.binary_search(&i).is_ok() {
                scan.labels[i] = Some(PatternKind::VShape);
                detector.last_pattern_index = i as i64;
                continue;
            }

            // A confirmed detection just ahead also blocks this candle.
            let next_remembered = remembered.iter().find(|&&k| k > i);
            if next_remembered.is_some_and(|&k| ((k - i) as i64) < COOLDOWN_BARS) {
                continue;
            }

            if detector.check(candles, i) {
                scan.labels[i] = Some(PatternKind::VShape);
                scan.new_detections.push(i);
                detector.last_pattern_index = i as i64;
                memory.detections.insert(candles[i].time());
            }
        }

        scan
    }

    /// Eligibility of candle `i`, evaluated in order: predecessor exists,
    /// cooldown elapsed, bearish-then-bullish, drop exceeds the average body,
    /// recovery at least `RECOVERY_RATIO` of the drop.
    fn check(&self, candles: &[Candle], i: usize) -> bool {
        if i == 0 {
            return false;
        }
        if (i as i64) - self.last_pattern_index < COOLDOWN_BARS {
            return false;
        }
        is_v_shape(&candles[i - 1], &candles[i], self.avg_body_size)
    }
}

/// Shape test for one adjacent pair, ignoring cooldown.
pub fn is_v_shape(prev: &Candle, curr: &Candle, avg_body_size: f64) -> bool {
    if !(prev.close() < prev.open() && curr.close() > curr.open()) {
        return false;
    }
    let drop = prev.open() - prev.close();
    if drop <= avg_body_size {
        return false;
    }
    let recovery = curr.close() - curr.open();
    recovery >= RECOVERY_RATIO * drop
}
