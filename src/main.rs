use anyhow::Context;
use clap::Parser;
use paperbot::api::{BalanceProvider, BinanceClient};
use paperbot::config::{Cli, Settings};
use paperbot::execution::{listen_for_shutdown, seed_position, TradingEngine, TradingSession};
use paperbot::indicators::Rsi;
use paperbot::persistence::LedgerWriter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let settings = Settings::from_cli(&cli).context("failed to load settings")?;
    setup_logging(&settings.log_level);

    tracing::info!(
        "🚀 Paperbot starting: {} on {} candles, window {}, fee {}, stop {}",
        settings.symbol,
        settings.interval,
        settings.window_size,
        settings.trading_fee,
        settings.stop_loss_threshold
    );

    let client = build_client(&settings)?;
    let balances: Option<&dyn BalanceProvider> = Some(&client);
    let positions = seed_position(&settings, balances)
        .await
        .context("failed to determine starting balance")?;

    let engine = TradingEngine::new(
        client.clone(),
        Rsi::new(settings.indicator_lookback),
        &settings,
        positions,
    );
    let mut session = TradingSession::new(
        engine,
        LedgerWriter::new(&settings.ledger_path),
        settings.cycle_period(),
    );

    let shutdown_rx = listen_for_shutdown().context("failed to install signal handlers")?;

    let report = session.run(shutdown_rx).await.context("trading loop stopped")?;

    tracing::info!(
        "✅ Done: {} trades, final {}={:.2}, {}={:.6}",
        report.trades,
        settings.quote_asset,
        report.quote_balance,
        settings.base_asset,
        report.base_balance
    );

    Ok(())
}

fn setup_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Market data client, signed when credentials are in the environment
fn build_client(settings: &Settings) -> anyhow::Result<BinanceClient> {
    let client = BinanceClient::new(&settings.api_base_url)
        .context("failed to build HTTP client")?;

    match (
        std::env::var("BINANCE_API_KEY"),
        std::env::var("BINANCE_API_SECRET"),
    ) {
        (Ok(key), Ok(secret)) => Ok(client.with_credentials(key, secret)),
        _ => {
            if settings.starting_quote_balance.is_none() {
                tracing::warn!(
                    "BINANCE_API_KEY / BINANCE_API_SECRET not set; account balances unavailable"
                );
            }
            Ok(client)
        }
    }
}
