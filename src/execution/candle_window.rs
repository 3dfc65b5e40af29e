use crate::error::BotError;
use crate::models::Candle;
use crate::Result;

/// The most recent candles from one fetch, oldest first
///
/// Rebuilt from scratch every cycle. Construction validates ordering and
/// prices so later stages can index freely.
#[derive(Debug, Clone)]
pub struct CandleWindow {
    candles: Vec<Candle>,
}

impl CandleWindow {
    pub fn new(candles: Vec<Candle>) -> Result<Self> {
        if candles.is_empty() {
            return Err(BotError::InsufficientData {
                needed: 1,
                available: 0,
            });
        }

        for pair in candles.windows(2) {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(BotError::MalformedData(format!(
                    "candles are not sorted by timestamp ({} then {})",
                    pair[0].timestamp, pair[1].timestamp
                )));
            }
        }

        if let Some(bad) = candles
            .iter()
            .find(|c| !(c.close.is_finite() && c.close > 0.0) || !c.volume.is_finite())
        {
            return Err(BotError::MalformedData(format!(
                "invalid candle at {}: close={}, volume={}",
                bad.timestamp, bad.close, bad.volume
            )));
        }

        Ok(Self { candles })
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Newest candle; the one the decision is made on
    pub fn latest(&self) -> &Candle {
        // Non-empty by construction
        &self.candles[self.candles.len() - 1]
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.volume).collect()
    }
}
