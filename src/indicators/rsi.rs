use super::MomentumIndicator;

/// Relative Strength Index with Wilder smoothing
///
/// RSI measures the magnitude of recent price changes to evaluate
/// overbought or oversold conditions on a 0-100 scale.
#[derive(Debug, Clone, Copy)]
pub struct Rsi {
    period: usize,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self { period }
    }
}

impl Default for Rsi {
    fn default() -> Self {
        Self::new(14)
    }
}

impl MomentumIndicator for Rsi {
    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, closes: &[f64]) -> Vec<Option<f64>> {
        calculate_rsi_series(closes, self.period)
    }
}

/// Calculate an RSI value for every close
///
/// The first change has no predecessor and counts as flat, so the averages
/// are seeded at index 0 and become valid once `period` samples have been
/// folded in. The first `period - 1` entries are `None`.
pub fn calculate_rsi_series(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut series = vec![None; prices.len()];
    if period == 0 || prices.len() < period {
        return series;
    }

    let alpha = 1.0 / period as f64;
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for i in 0..prices.len() {
        let change = if i == 0 { 0.0 } else { prices[i] - prices[i - 1] };
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        if i == 0 {
            avg_gain = gain;
            avg_loss = loss;
        } else {
            avg_gain = alpha * gain + (1.0 - alpha) * avg_gain;
            avg_loss = alpha * loss + (1.0 - alpha) * avg_loss;
        }

        if i + 1 >= period {
            series[i] = Some(rsi_from_averages(avg_gain, avg_loss));
        }
    }

    series
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }

    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calculate_rsi(prices: &[f64], period: usize) -> Option<f64> {
        calculate_rsi_series(prices, period).last().copied().flatten()
    }

    #[test]
    fn test_rsi_calculation() {
        let prices = vec![
            44.0, 44.25, 44.5, 43.75, 44.0, 44.5, 45.0, 45.5, 45.25, 45.5, 46.0, 46.5, 46.25,
            46.0, 46.5,
        ];

        let rsi = calculate_rsi(&prices, 14);
        assert!(rsi.is_some());

        let rsi_value = rsi.unwrap();
        assert!(rsi_value > 0.0 && rsi_value < 100.0);
    }

    #[test]
    fn test_rsi_insufficient_data() {
        let prices = vec![100.0, 102.0, 101.0];
        let rsi = calculate_rsi(&prices, 14);
        assert!(rsi.is_none());
    }

    #[test]
    fn test_rsi_all_gains() {
        let prices = vec![100.0, 101.0, 102.0, 103.0, 104.0, 105.0];
        let rsi = calculate_rsi(&prices, 5);
        assert_eq!(rsi, Some(100.0)); // All gains = RSI 100
    }

    #[test]
    fn test_rsi_all_losses() {
        let prices: Vec<f64> = (0..20).map(|i| 200.0 - i as f64).collect();
        let rsi = calculate_rsi(&prices, 14).unwrap();
        assert!(rsi.abs() < 1e-9);
    }

    #[test]
    fn test_series_alignment() {
        let prices: Vec<f64> = (0..30).map(|i| 100.0 + (i % 3) as f64).collect();
        let series = calculate_rsi_series(&prices, 14);

        assert_eq!(series.len(), prices.len());
        assert!(series[..13].iter().all(|v| v.is_none()));
        assert!(series[13..].iter().all(|v| v.is_some()));
        assert!(series
            .iter()
            .flatten()
            .all(|&v| (0.0..=100.0).contains(&v)));
    }

    #[test]
    fn test_wilder_smoothing_known_value() {
        // Alternating +2 / -1 moves; with period 2 the smoothing has a closed form
        let prices = vec![10.0, 12.0, 11.0];
        let series = calculate_rsi_series(&prices, 2);

        // i=1: gain avg = 0.5*2 = 1.0, loss avg = 0 -> 100
        assert_eq!(series[1], Some(100.0));
        // i=2: gain avg = 0.5, loss avg = 0.5 -> 50
        let last = series[2].unwrap();
        assert!((last - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_indicator_trait() {
        let rsi = Rsi::default();
        assert_eq!(rsi.lookback(), 14);
        assert_eq!(rsi.compute(&[1.0, 2.0]).len(), 2);
    }
}
