// Momentum indicators consumed by the decision cycle

pub mod rsi;

pub use rsi::{calculate_rsi_series, Rsi};

/// Oscillator mapping closes to per-candle values on a 0-100 scale
///
/// Implementations must be pure: the same closes always produce the same
/// series, aligned 1:1 with the input and `None` where undefined.
pub trait MomentumIndicator: Send + Sync {
    /// Number of closes needed before the first value is defined
    fn lookback(&self) -> usize;

    fn compute(&self, closes: &[f64]) -> Vec<Option<f64>>;
}
