use crate::error::BotError;
use crate::execution::CandleWindow;
use crate::Result;

/// Adaptive signal bounds derived from the current window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub buy_bound: f64,    // 25th percentile of indicator values
    pub sell_bound: f64,   // 75th percentile of indicator values
    pub volume_floor: f64, // Median volume across the window
}

pub const BUY_PERCENTILE: f64 = 0.25;
pub const SELL_PERCENTILE: f64 = 0.75;

/// Derive thresholds from one window and its indicator series
///
/// Only candles with a defined indicator value feed the percentiles; the
/// volume median uses every candle. Nothing is carried between calls.
pub fn estimate_thresholds(
    window: &CandleWindow,
    indicator: &[Option<f64>],
    lookback: usize,
) -> Result<Thresholds> {
    if indicator.len() != window.len() {
        return Err(BotError::MalformedData(format!(
            "indicator series has {} values for {} candles",
            indicator.len(),
            window.len()
        )));
    }

    let values: Vec<f64> = indicator
        .iter()
        .flatten()
        .copied()
        .filter(|v| v.is_finite())
        .collect();

    if values.len() < lookback.max(1) {
        return Err(BotError::InsufficientData {
            needed: lookback.max(1),
            available: values.len(),
        });
    }

    let volumes = window.volumes();

    let buy_bound = percentile(&values, BUY_PERCENTILE)?;
    let sell_bound = percentile(&values, SELL_PERCENTILE)?;
    let volume_floor = median(&volumes)?;

    Ok(Thresholds {
        buy_bound,
        sell_bound,
        volume_floor,
    })
}

/// Percentile with linear interpolation between closest ranks
///
/// `q` is a fraction in [0, 1]. Monotone in `q`, so for the same data the
/// 25th percentile never exceeds the 75th.
pub fn percentile(values: &[f64], q: f64) -> Result<f64> {
    if values.is_empty() {
        return Err(BotError::InsufficientData {
            needed: 1,
            available: 0,
        });
    }
    if values.iter().any(|v| v.is_nan()) {
        return Err(BotError::MalformedData("NaN in percentile input".into()));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;

    Ok(sorted[lower] + (sorted[upper] - sorted[lower]) * frac)
}

pub fn median(values: &[f64]) -> Result<f64> {
    percentile(values, 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Candle;
    use chrono::{Duration, TimeZone, Utc};

    fn window_with_volumes(volumes: &[f64]) -> CandleWindow {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let candles = volumes
            .iter()
            .enumerate()
            .map(|(i, &volume)| Candle {
                timestamp: start + Duration::minutes(i as i64),
                open: 100.0,
                high: 100.0,
                low: 100.0,
                close: 100.0,
                volume,
            })
            .collect();
        CandleWindow::new(candles).unwrap()
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&values, 0.25).unwrap(), 2.0);
        assert_eq!(percentile(&values, 0.5).unwrap(), 3.0);

        let values = vec![1.0, 2.0, 3.0, 4.0];
        // pos = 0.75 -> 1.75
        assert!((percentile(&values, 0.25).unwrap() - 1.75).abs() < 1e-12);
        assert!((median(&values).unwrap() - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_percentile_ignores_input_order() {
        let values = vec![5.0, 1.0, 4.0, 2.0, 3.0];
        assert_eq!(percentile(&values, 0.75).unwrap(), 4.0);
    }

    #[test]
    fn test_percentile_empty_is_insufficient() {
        let result = percentile(&[], 0.5);
        assert!(matches!(result, Err(BotError::InsufficientData { .. })));
    }

    #[test]
    fn test_thresholds_use_defined_values_only() {
        let window = window_with_volumes(&[10.0, 20.0, 30.0, 40.0, 50.0, 60.0]);
        let indicator = vec![None, None, Some(10.0), Some(20.0), Some(30.0), Some(40.0)];

        let t = estimate_thresholds(&window, &indicator, 3).unwrap();

        assert!((t.buy_bound - 17.5).abs() < 1e-12);
        assert!((t.sell_bound - 32.5).abs() < 1e-12);
        // Median of all six volumes
        assert!((t.volume_floor - 35.0).abs() < 1e-12);
    }

    #[test]
    fn test_buy_bound_never_exceeds_sell_bound() {
        let window = window_with_volumes(&[1.0; 40]);
        for seed in 0..20u64 {
            let indicator: Vec<Option<f64>> = (0..40u64)
                .map(|i| Some(((i * 37 + seed * 11) % 101) as f64))
                .collect();
            let t = estimate_thresholds(&window, &indicator, 14).unwrap();
            assert!(t.buy_bound <= t.sell_bound);
        }
    }

    #[test]
    fn test_flat_indicator_gives_equal_bounds() {
        let window = window_with_volumes(&[1.0; 20]);
        let indicator = vec![Some(50.0); 20];
        let t = estimate_thresholds(&window, &indicator, 14).unwrap();
        assert_eq!(t.buy_bound, t.sell_bound);
    }

    #[test]
    fn test_insufficient_indicator_values() {
        let window = window_with_volumes(&[1.0; 5]);
        let indicator = vec![None, None, None, Some(40.0), Some(60.0)];

        let result = estimate_thresholds(&window, &indicator, 14);
        assert!(matches!(
            result,
            Err(BotError::InsufficientData {
                needed: 14,
                available: 2
            })
        ));
    }

    #[test]
    fn test_misaligned_series_is_malformed() {
        let window = window_with_volumes(&[1.0; 5]);
        let indicator = vec![Some(40.0); 4];
        let result = estimate_thresholds(&window, &indicator, 2);
        assert!(matches!(result, Err(BotError::MalformedData(_))));
    }

    #[test]
    fn test_estimation_is_repeatable() {
        let window = window_with_volumes(&[5.0, 1.0, 9.0, 3.0, 7.0]);
        let indicator = vec![Some(70.0), Some(20.0), Some(55.0), Some(35.0), Some(90.0)];

        let first = estimate_thresholds(&window, &indicator, 5).unwrap();
        let second = estimate_thresholds(&window, &indicator, 5).unwrap();
        assert_eq!(first, second);
    }
}
