use proptest::prelude::*;
use common::{Candle, CandleWindow};
use strategy::pattern::{is_v_shape, COOLDOWN_BARS};
use strategy::{IndicatorEngine, PatternDetector, PatternMemory, VolumeClassifier, WARMUP_PERIOD};

fn bar(time: i64, open: f64, close: f64, volume: u64) -> Candle {
    Candle::new(time, open, open.max(close) + 1.0, open.min(close) - 0.5, close, volume).unwrap()
}

/// (open, close, volume) triples → a valid window with 60-second spacing.
fn arb_window(max_len: usize) -> impl Strategy<Value = CandleWindow> {
    prop::collection::vec((1.0f64..200.0, 1.0f64..200.0, 0u64..10_000), 1..max_len).prop_map(
        |raw| {
            let candles = raw
                .into_iter()
                .enumerate()
                .map(|(i, (open, close, volume))| bar(i as i64 * 60, open, close, volume))
                .collect();
            CandleWindow::new(candles, 1_000).unwrap()
        },
    )
}

proptest! {
    #[test]
    fn flow_threshold_is_one_and_a_half_mean_volume(window in arb_window(120)) {
        let stats = VolumeClassifier::statistics(&window).unwrap();
        let mean = window.candles().iter().map(|c| c.tick_volume() as f64).sum::<f64>()
            / window.len() as f64;
        prop_assert!((stats.flow_threshold - 1.5 * mean).abs() <= 1e-9 * mean.max(1.0));
    }

    /// Raising one candle's volume, holding the others, never turns a flow
    /// candle back into a normal one.
    #[test]
    fn flow_is_monotonic_in_own_volume(
        window in arb_window(60),
        pick in any::<prop::sample::Index>(),
        bump in 0u64..100_000,
    ) {
        let idx = pick.index(window.len());
        let c = window.candles()[idx];
        let others: f64 = window.candles().iter().enumerate()
            .filter(|(i, _)| *i != idx)
            .map(|(_, c)| c.tick_volume() as f64)
            .sum();
        let n = window.len() as f64;
        let is_flow = |v: u64| v as f64 > 1.5 * ((others + v as f64) / n);

        if is_flow(c.tick_volume()) {
            prop_assert!(is_flow(c.tick_volume() + bump));
        }

        let (_, colors) = VolumeClassifier::classify(&window).unwrap();
        prop_assert_eq!(colors[idx].is_flow(), is_flow(c.tick_volume()));
    }

    #[test]
    fn detections_respect_cooldown(window in arb_window(150)) {
        let stats = VolumeClassifier::statistics(&window).unwrap();
        let scan = PatternDetector::scan(&window, stats.avg_body_size);
        let hits = scan.detected_indices();
        for pair in hits.windows(2) {
            prop_assert!((pair[1] - pair[0]) as i64 >= COOLDOWN_BARS);
        }
        for &i in &hits {
            prop_assert!(i > 0);
            let candles = window.candles();
            prop_assert!(is_v_shape(&candles[i - 1], &candles[i], stats.avg_body_size));
        }
    }

    #[test]
    fn indicator_rows_are_exactly_the_valid_suffix(window in arb_window(150)) {
        let series = IndicatorEngine::compute(&window);
        let expected = (window.len() + 1).saturating_sub(WARMUP_PERIOD);
        prop_assert_eq!(series.len(), expected);
        for row in &series.rows {
            prop_assert!((0.0..=100.0).contains(&row.rsi));
        }
    }

    /// Slide a window over a series one candle per tick, the newest candle
    /// showing a provisional close before it settles, all through one memory.
    #[test]
    fn persistent_memory_labels_stay_valid_and_spaced(
        raw in prop::collection::vec((1.0f64..200.0, 1.0f64..200.0, 0u64..10_000), 12..80),
        provisional in prop::collection::vec(1.0f64..200.0, 80),
        width in 4usize..30,
    ) {
        let series: Vec<Candle> = raw
            .iter()
            .enumerate()
            .map(|(i, &(open, close, volume))| bar(i as i64 * 60, open, close, volume))
            .collect();
        let width = width.min(series.len());
        let mut memory = PatternMemory::new();

        for end in width..=series.len() {
            let mut candles = series[end - width..end].to_vec();
            let last = candles[width - 1];
            candles[width - 1] = bar(last.time(), last.open(), provisional[end - 1], last.tick_volume());

            for candles in [candles, series[end - width..end].to_vec()] {
                let window = CandleWindow::new(candles, 1_000).unwrap();
                let stats = VolumeClassifier::statistics(&window).unwrap();
                let scan = PatternDetector::scan_with_memory(&window, stats.avg_body_size, &mut memory);

                let hits = scan.detected_indices();
                for pair in hits.windows(2) {
                    prop_assert!((pair[1] - pair[0]) as i64 >= COOLDOWN_BARS);
                }
                let candles = window.candles();
                for &i in &hits {
                    prop_assert!(i > 0);
                    prop_assert!(is_v_shape(&candles[i - 1], &candles[i], stats.avg_body_size));
                }
            }
        }
    }
}
