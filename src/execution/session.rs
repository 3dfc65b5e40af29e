use std::time::Duration;

use tokio::sync::watch;

use crate::api::{BalanceProvider, CandleProvider};
use crate::config::Settings;
use crate::error::BotError;
use crate::execution::engine::{CycleOutcome, SkipReason, TradingEngine};
use crate::execution::{PositionManager, Transition};
use crate::indicators::MomentumIndicator;
use crate::persistence::LedgerWriter;
use crate::Result;

/// Balances and counts reported once the session ends
#[derive(Debug, Clone, PartialEq)]
pub struct FinalReport {
    pub quote_balance: f64,
    pub base_balance: f64,
    pub trades: usize,
    /// Mark-to-market value at the last price seen; `None` if no cycle completed
    pub portfolio_value: Option<f64>,
    pub stats: CycleStats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub cycles: u64,
    pub trades: u64,
    pub skips: u64,
    pub failures: u64,
}

/// Drives the engine on a fixed period until shutdown
///
/// The ledger is written and final balances are logged exactly once,
/// whether the loop returns, fails fatally or the session is dropped.
pub struct TradingSession<P: CandleProvider, I: MomentumIndicator> {
    engine: TradingEngine<P, I>,
    writer: LedgerWriter,
    period: Duration,
    stats: CycleStats,
    last_price: Option<f64>,
    report: Option<FinalReport>,
}

impl<P: CandleProvider, I: MomentumIndicator> TradingSession<P, I> {
    pub fn new(engine: TradingEngine<P, I>, writer: LedgerWriter, period: Duration) -> Self {
        Self {
            engine,
            writer,
            period,
            stats: CycleStats::default(),
            last_price: None,
            report: None,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.report.is_some()
    }

    /// Run cycles until `shutdown` flips to true, then finalize
    ///
    /// A fatal cycle error stops the loop and is returned after the
    /// ledger has been written.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<FinalReport> {
        tracing::info!(
            "🚀 Starting paper trading on {} (period {:?})",
            self.engine.symbol(),
            self.period
        );

        let loop_result = self.run_loop(&mut shutdown).await;
        let report = self.finalize();

        loop_result?;
        report
    }

    async fn run_loop(&mut self, shutdown: &mut watch::Receiver<bool>) -> Result<()> {
        loop {
            if *shutdown.borrow() {
                tracing::info!("Shutdown requested, stopping trading loop");
                return Ok(());
            }

            self.stats.cycles += 1;
            tracing::info!(
                "💹 [TRADING] Cycle {} at {}",
                self.stats.cycles,
                chrono::Utc::now().format("%H:%M:%S")
            );

            match self.engine.run_cycle().await {
                CycleOutcome::Completed(report) => {
                    self.last_price = Some(report.price);
                    if report.transition != Transition::NoOp {
                        self.stats.trades += 1;
                    }
                }
                CycleOutcome::Skipped(SkipReason::Volatility {
                    dispersion,
                    threshold,
                }) => {
                    self.stats.skips += 1;
                    tracing::warn!(
                        "⚠️  High volatility detected ({:.4} > {:.4}). Skipping trade.",
                        dispersion,
                        threshold
                    );
                }
                CycleOutcome::Failed(e) if e.is_fatal() => {
                    self.stats.failures += 1;
                    tracing::error!("❌ Fatal error, stopping trading loop: {}", e);
                    return Err(e);
                }
                CycleOutcome::Failed(e @ BotError::InsufficientData { .. }) => {
                    self.stats.failures += 1;
                    tracing::warn!("⚠️  Skipping cycle: {}", e);
                }
                CycleOutcome::Failed(e) => {
                    self.stats.failures += 1;
                    tracing::error!("❌ Cycle failed: {}", e);
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.period) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        tracing::info!("Shutdown channel closed, stopping trading loop");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Write the ledger and log final balances
    ///
    /// Only the first call does any work; later calls return the same report.
    pub fn finalize(&mut self) -> Result<FinalReport> {
        if let Some(report) = &self.report {
            return Ok(report.clone());
        }

        let positions = self.engine.positions();
        let position = positions.position();
        let report = FinalReport {
            quote_balance: position.quote_balance,
            base_balance: position.base_balance,
            trades: positions.ledger().len(),
            portfolio_value: self.last_price.map(|price| position.value(price)),
            stats: self.stats,
        };
        self.report = Some(report.clone());

        let written = self.writer.write(positions.ledger());
        match &written {
            Ok(()) => tracing::info!("💾 Trading log saved to {}", self.writer.path().display()),
            Err(e) => tracing::error!(
                "❌ Failed to save trading log to {}: {}",
                self.writer.path().display(),
                e
            ),
        }

        tracing::info!(
            "🏁 Final Balances: quote={:.2}, base={:.6} ({} trades, {} cycles, {} skipped, {} failed)",
            report.quote_balance,
            report.base_balance,
            report.trades,
            report.stats.cycles,
            report.stats.skips,
            report.stats.failures
        );

        if let (Some(value), Some(price)) = (report.portfolio_value, self.last_price) {
            tracing::info!("📊 Portfolio value at {:.4}: {:.2}", price, value);
        }

        written.map(|()| report)
    }
}

impl<P: CandleProvider, I: MomentumIndicator> Drop for TradingSession<P, I> {
    fn drop(&mut self) {
        if self.report.is_none() {
            if let Err(e) = self.finalize() {
                tracing::error!("❌ Finalization on drop failed: {}", e);
            }
        }
    }
}

/// Shutdown flag flipped by Ctrl-C or, on Unix, SIGTERM
///
/// The SIGTERM handler is installed before this returns, so a signal sent
/// afterwards always reaches the flag instead of killing the process.
pub fn listen_for_shutdown() -> std::io::Result<watch::Receiver<bool>> {
    let (tx, rx) = watch::channel(false);

    #[cfg(unix)]
    let mut terminate =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::spawn(async move {
        #[cfg(unix)]
        let terminated = async {
            terminate.recv().await;
        };
        #[cfg(not(unix))]
        let terminated = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c_received() => tracing::info!("🛑 Ctrl-C received, finishing up"),
            _ = terminated => tracing::info!("🛑 SIGTERM received, finishing up"),
        }
        tx.send(true).ok();
    });

    Ok(rx)
}

async fn ctrl_c_received() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Build the starting paper position
///
/// A configured starting balance wins; otherwise the account's free quote
/// balance is used. Base already held in the account is not traded.
pub async fn seed_position(
    settings: &Settings,
    balances: Option<&dyn BalanceProvider>,
) -> Result<PositionManager> {
    if let Some(quote) = settings.starting_quote_balance {
        tracing::info!(
            "Using configured starting balance: {}={:.2}",
            settings.quote_asset,
            quote
        );
        return Ok(PositionManager::new(quote, settings.trading_fee));
    }

    let provider = balances.ok_or_else(|| {
        BotError::Config("no starting balance configured and no account to query".to_string())
    })?;
    let account = provider.get_balances().await?;

    let quote = account.get(&settings.quote_asset).copied().unwrap_or(0.0);
    let base = account.get(&settings.base_asset).copied().unwrap_or(0.0);

    tracing::info!(
        "Initial Testnet Balances: {}={:.2}, {}={:.6}",
        settings.quote_asset,
        quote,
        settings.base_asset,
        base
    );
    if base > 0.0 {
        tracing::warn!(
            "Existing {} balance of {:.6} is not part of the paper position",
            settings.base_asset,
            base
        );
    }

    Ok(PositionManager::new(quote, settings.trading_fee))
}
