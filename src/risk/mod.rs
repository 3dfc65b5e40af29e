// Risk management module
pub mod volatility;

pub use volatility::{VolatilityCheck, VolatilityGuard, VOLATILITY_WINDOW};
