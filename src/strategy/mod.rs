// Adaptive RSI strategy: thresholds from the window, then a signal for the latest candle
pub mod signals;
pub mod thresholds;

pub use signals::{find_candle_gaps, generate_signal};
pub use thresholds::{estimate_thresholds, median, percentile, Thresholds};
