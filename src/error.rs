use thiserror::Error;

/// Errors raised while running the trading loop
#[derive(Debug, Error)]
pub enum BotError {
    /// Data source unreachable, rate-limited or rejected the request
    #[error("market data fetch failed: {0}")]
    Fetch(String),

    /// Not enough candles / indicator values to derive thresholds
    #[error("insufficient data: need {needed}, got {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("malformed market data: {0}")]
    MalformedData(String),

    /// Position bookkeeping is corrupt; trading must stop
    #[error("state invariant violated: {0}")]
    StateInvariant(String),

    #[error("ledger persistence failed: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl BotError {
    /// Fatal errors abort the loop; everything else skips one cycle
    pub fn is_fatal(&self) -> bool {
        matches!(self, BotError::StateInvariant(_))
    }
}

impl From<reqwest::Error> for BotError {
    fn from(e: reqwest::Error) -> Self {
        BotError::Fetch(e.to_string())
    }
}

impl From<config::ConfigError> for BotError {
    fn from(e: config::ConfigError) -> Self {
        BotError::Config(e.to_string())
    }
}
