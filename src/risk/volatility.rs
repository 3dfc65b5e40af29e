use crate::error::BotError;
use crate::Result;

/// Number of most recent closes inspected by the guard
pub const VOLATILITY_WINDOW: usize = 3;

/// Suppresses trading while short-term price dispersion is too high
#[derive(Debug, Clone, Copy)]
pub struct VolatilityGuard {
    pub threshold: f64, // e.g. 0.02 = 2% range over the last closes
}

/// Verdict for the current window
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VolatilityCheck {
    Calm { dispersion: f64 },
    Volatile { dispersion: f64 },
}

impl Default for VolatilityGuard {
    fn default() -> Self {
        Self { threshold: 0.02 }
    }
}

impl VolatilityGuard {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Compare `(max - min) / min` over the trailing closes with the threshold
    pub fn check(&self, closes: &[f64]) -> Result<VolatilityCheck> {
        let dispersion = dispersion(closes)?;

        if dispersion > self.threshold {
            Ok(VolatilityCheck::Volatile { dispersion })
        } else {
            Ok(VolatilityCheck::Calm { dispersion })
        }
    }
}

/// Relative range of the last `VOLATILITY_WINDOW` closes
pub fn dispersion(closes: &[f64]) -> Result<f64> {
    if closes.len() < VOLATILITY_WINDOW {
        return Err(BotError::InsufficientData {
            needed: VOLATILITY_WINDOW,
            available: closes.len(),
        });
    }

    let recent = &closes[closes.len() - VOLATILITY_WINDOW..];
    let max = recent.iter().copied().fold(f64::MIN, f64::max);
    let min = recent.iter().copied().fold(f64::MAX, f64::min);

    if !(min > 0.0 && max.is_finite()) {
        return Err(BotError::MalformedData(format!(
            "cannot measure dispersion of closes {:?}",
            recent
        )));
    }

    Ok((max - min) / min)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sharp_move_is_volatile() {
        let guard = VolatilityGuard::default();
        let check = guard.check(&[100.0, 103.0, 98.0]).unwrap();

        match check {
            VolatilityCheck::Volatile { dispersion } => {
                assert!((dispersion - 5.0 / 98.0).abs() < 1e-12);
            }
            other => panic!("expected volatile, got {:?}", other),
        }
    }

    #[test]
    fn test_quiet_market_is_calm() {
        let guard = VolatilityGuard::default();
        let check = guard.check(&[100.0, 100.5, 101.0]).unwrap();
        assert!(matches!(check, VolatilityCheck::Calm { .. }));
    }

    #[test]
    fn test_only_last_three_closes_count() {
        let guard = VolatilityGuard::default();
        // A big move earlier in the window does not matter
        let check = guard.check(&[50.0, 100.0, 100.2, 100.4]).unwrap();
        assert!(matches!(check, VolatilityCheck::Calm { .. }));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let guard = VolatilityGuard::new(0.02);
        let check = guard.check(&[100.0, 101.0, 102.0]).unwrap();
        assert_eq!(check, VolatilityCheck::Calm { dispersion: 0.02 });
    }

    #[test]
    fn test_too_few_closes() {
        let result = dispersion(&[100.0, 101.0]);
        assert!(matches!(result, Err(BotError::InsufficientData { .. })));
    }

    #[test]
    fn test_zero_price_is_malformed() {
        let result = dispersion(&[0.0, 1.0, 2.0]);
        assert!(matches!(result, Err(BotError::MalformedData(_))));
    }
}
