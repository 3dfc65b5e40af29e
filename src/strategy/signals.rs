use super::Thresholds;
use crate::models::{Candle, Signal};

/// Turn the latest indicator reading into a discrete signal
///
/// Both directions require volume strictly above the floor. Inequalities are
/// strict, so when `buy_bound == sell_bound` a reading exactly on the bound
/// is a hold.
pub fn generate_signal(indicator: f64, volume: f64, thresholds: &Thresholds) -> Signal {
    let volume_confirmed = volume > thresholds.volume_floor;

    if indicator < thresholds.buy_bound && volume_confirmed {
        Signal::Buy
    } else if indicator > thresholds.sell_bound && volume_confirmed {
        Signal::Sell
    } else {
        Signal::Hold
    }
}

/// Warn about gaps wider than 1.5x the candle interval
///
/// Exchanges occasionally skip candles during maintenance; the window is
/// still usable, so gaps are reported rather than rejected.
pub fn find_candle_gaps(candles: &[Candle], expected_interval_secs: u64) -> usize {
    if candles.len() < 2 {
        return 0;
    }

    // Allow 50% tolerance for slight timing variations
    let max_gap_secs = expected_interval_secs + (expected_interval_secs / 2);
    let mut gaps = 0;

    for window in candles.windows(2) {
        let time_diff = (window[1].timestamp - window[0].timestamp).num_seconds();

        if time_diff > max_gap_secs as i64 {
            gaps += 1;
            tracing::warn!(
                "Data gap detected: {}s between candles (expected ~{}s). Gap from {} to {}",
                time_diff,
                expected_interval_secs,
                window[0].timestamp.format("%H:%M:%S"),
                window[1].timestamp.format("%H:%M:%S")
            );
        }
    }

    gaps
}
