pub mod binance;

pub use binance::BinanceClient;

use async_trait::async_trait;

use crate::models::{Balances, Candle};
use crate::Result;

/// Source of the most recent candles for a pair
///
/// Failures surface as `BotError::Fetch`; retrying is the caller's job.
#[async_trait]
pub trait CandleProvider: Send + Sync {
    async fn fetch_candles(&self, symbol: &str, interval: &str, limit: usize)
        -> Result<Vec<Candle>>;
}

/// Free balances of the trading account, queried once at startup
#[async_trait]
pub trait BalanceProvider: Send + Sync {
    async fn get_balances(&self) -> Result<Balances>;
}
