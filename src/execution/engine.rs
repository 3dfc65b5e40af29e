use chrono::{DateTime, Utc};

use crate::api::CandleProvider;
use crate::config::Settings;
use crate::error::BotError;
use crate::execution::{CandleWindow, Executor, PositionManager, Transition};
use crate::indicators::MomentumIndicator;
use crate::models::Signal;
use crate::risk::{VolatilityCheck, VolatilityGuard};
use crate::strategy::{estimate_thresholds, find_candle_gaps, generate_signal, Thresholds};
use crate::Result;

/// What one iteration of the loop produced
#[derive(Debug)]
pub enum CycleOutcome {
    Completed(CycleReport),
    Skipped(SkipReason),
    Failed(BotError),
}

/// Intentional no-op outcomes; not errors
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    Volatility { dispersion: f64, threshold: f64 },
}

/// Everything decided on the latest candle of a completed cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub indicator: f64,
    pub volume: f64,
    pub thresholds: Thresholds,
    pub signal: Signal,
    pub transition: Transition,
}

/// Runs the decision pipeline for a single pair
///
/// fetch -> indicator -> thresholds -> volatility guard -> signal -> transition
pub struct TradingEngine<P: CandleProvider, I: MomentumIndicator> {
    provider: P,
    indicator: I,
    symbol: String,
    interval: String,
    interval_secs: u64,
    window_size: usize,
    guard: VolatilityGuard,
    executor: Executor,
    positions: PositionManager,
}

impl<P: CandleProvider, I: MomentumIndicator> TradingEngine<P, I> {
    pub fn new(provider: P, indicator: I, settings: &Settings, positions: PositionManager) -> Self {
        Self {
            provider,
            indicator,
            symbol: settings.symbol.clone(),
            interval: settings.interval.clone(),
            interval_secs: settings.interval_secs(),
            window_size: settings.window_size,
            guard: VolatilityGuard::new(settings.volatility_threshold),
            executor: Executor::new(settings.stop_loss_threshold),
            positions,
        }
    }

    pub fn positions(&self) -> &PositionManager {
        &self.positions
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Run one cycle, folding every error into the outcome
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        match self.evaluate().await {
            Ok(outcome) => outcome,
            Err(e) => CycleOutcome::Failed(e),
        }
    }

    async fn evaluate(&mut self) -> Result<CycleOutcome> {
        let candles = self
            .provider
            .fetch_candles(&self.symbol, &self.interval, self.window_size)
            .await?;
        let window = CandleWindow::new(candles)?;
        find_candle_gaps(window.candles(), self.interval_secs);

        let closes = window.closes();
        let series = self.indicator.compute(&closes);
        let thresholds = estimate_thresholds(&window, &series, self.indicator.lookback())?;

        tracing::info!(
            "Dynamically determined thresholds - RSI Buy: {:.2}, RSI Sell: {:.2}, Volume Threshold: {:.2}",
            thresholds.buy_bound,
            thresholds.sell_bound,
            thresholds.volume_floor
        );

        if let VolatilityCheck::Volatile { dispersion } = self.guard.check(&closes)? {
            return Ok(CycleOutcome::Skipped(SkipReason::Volatility {
                dispersion,
                threshold: self.guard.threshold,
            }));
        }

        let latest = window.latest();
        let indicator = series.last().copied().flatten().ok_or_else(|| {
            BotError::MalformedData("latest candle has no indicator value".to_string())
        })?;

        let signal = generate_signal(indicator, latest.volume, &thresholds);

        tracing::debug!(
            "Timestamp={}, Price={}, RSI={:.2}, Volume={}, Signal={:?}",
            latest.timestamp.format("%Y-%m-%d %H:%M:%S"),
            latest.close,
            indicator,
            latest.volume,
            signal
        );

        let decision = self
            .executor
            .process_signal(&self.positions, signal, latest.close)?;
        tracing::info!("  Decision: {:?} - {}", decision.action, decision.reason);

        let transition = self
            .positions
            .execute(decision.action, latest.close, latest.timestamp)?;

        Ok(CycleOutcome::Completed(CycleReport {
            timestamp: latest.timestamp,
            price: latest.close,
            indicator,
            volume: latest.volume,
            thresholds,
            signal,
            transition,
        }))
    }
}
