use crate::error::BotError;
use crate::Result;
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "PAPERBOT";
const BINANCE_TESTNET: &str = "https://testnet.binance.vision";

/// Runtime settings for the paper trading loop
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    // Market
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub interval: String,
    pub window_size: usize,
    pub api_base_url: String,

    // Strategy
    pub indicator_lookback: usize,
    pub trading_fee: f64,         // Fraction per conversion, e.g. 0.001 = 0.1%
    pub stop_loss_threshold: f64, // Sell when price < entry * threshold
    pub volatility_threshold: f64,

    // Loop
    pub cycle_period_secs: u64,

    // Paper account
    pub starting_quote_balance: Option<f64>, // Skip the account query when set
    pub ledger_path: PathBuf,

    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            symbol: "ETHUSDT".to_string(),
            base_asset: "ETH".to_string(),
            quote_asset: "USDT".to_string(),
            interval: "1m".to_string(),
            window_size: 100,
            api_base_url: BINANCE_TESTNET.to_string(),
            indicator_lookback: 14,
            trading_fee: 0.001,
            stop_loss_threshold: 0.98,
            volatility_threshold: 0.02,
            cycle_period_secs: 60,
            starting_quote_balance: None,
            ledger_path: PathBuf::from("paper_trading_results.csv"),
            log_level: "paperbot=info".to_string(),
        }
    }
}

/// Command line flags; anything set here wins over file and environment
#[derive(Debug, Default, Parser)]
#[command(name = "paperbot", about = "Paper-trade a single pair on an adaptive RSI signal")]
pub struct Cli {
    /// TOML settings file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Traded pair, e.g. ETHUSDT
    #[arg(long)]
    pub symbol: Option<String>,

    /// Candle interval, e.g. 1m
    #[arg(long)]
    pub interval: Option<String>,

    /// Seconds between cycles
    #[arg(long)]
    pub period: Option<u64>,

    /// Paper quote balance; skips the account balance query
    #[arg(long)]
    pub starting_balance: Option<f64>,

    /// Where the trade ledger is written on exit
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl Settings {
    /// Load defaults, then the optional file, then `PAPERBOT_*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings: Settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }

    /// Full layering: defaults < file < environment < CLI flags
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut settings = Self::load(cli.config.as_deref())?;
        settings.apply_cli(cli);
        settings.validate()?;
        Ok(settings)
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(symbol) = &cli.symbol {
            self.symbol = symbol.to_uppercase();
        }
        if let Some(interval) = &cli.interval {
            self.interval = interval.clone();
        }
        if let Some(period) = cli.period {
            self.cycle_period_secs = period;
        }
        if let Some(balance) = cli.starting_balance {
            self.starting_quote_balance = Some(balance);
        }
        if let Some(output) = &cli.output {
            self.ledger_path = output.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            return Err(BotError::Config("symbol must not be empty".into()));
        }
        if interval_secs(&self.interval).is_none() {
            return Err(BotError::Config(format!(
                "unsupported candle interval '{}'",
                self.interval
            )));
        }
        if self.indicator_lookback < 2 {
            return Err(BotError::Config("indicator_lookback must be at least 2".into()));
        }
        // RSI leaves lookback - 1 leading values undefined; thresholds need lookback defined ones
        if self.window_size < 2 * self.indicator_lookback - 1 {
            return Err(BotError::Config(format!(
                "window_size {} is too small for indicator_lookback {}",
                self.window_size, self.indicator_lookback
            )));
        }
        if !(0.0..1.0).contains(&self.trading_fee) {
            return Err(BotError::Config("trading_fee must be in [0, 1)".into()));
        }
        if !(self.stop_loss_threshold > 0.0 && self.stop_loss_threshold <= 1.0) {
            return Err(BotError::Config("stop_loss_threshold must be in (0, 1]".into()));
        }
        if self.volatility_threshold <= 0.0 {
            return Err(BotError::Config("volatility_threshold must be positive".into()));
        }
        if self.cycle_period_secs == 0 {
            return Err(BotError::Config("cycle_period_secs must be positive".into()));
        }
        if let Some(balance) = self.starting_quote_balance {
            if !(balance.is_finite() && balance >= 0.0) {
                return Err(BotError::Config(
                    "starting_quote_balance must be a non-negative number".into(),
                ));
            }
        }
        Ok(())
    }

    pub fn cycle_period(&self) -> Duration {
        Duration::from_secs(self.cycle_period_secs)
    }

    /// Candle interval in seconds (validated settings always have one)
    pub fn interval_secs(&self) -> u64 {
        interval_secs(&self.interval).unwrap_or(60)
    }
}

/// Binance kline interval string to seconds
pub fn interval_secs(interval: &str) -> Option<u64> {
    let secs = match interval {
        "1s" => 1,
        "1m" => 60,
        "3m" => 180,
        "5m" => 300,
        "15m" => 900,
        "30m" => 1_800,
        "1h" => 3_600,
        "2h" => 7_200,
        "4h" => 14_400,
        "6h" => 21_600,
        "8h" => 28_800,
        "12h" => 43_200,
        "1d" => 86_400,
        "3d" => 259_200,
        "1w" => 604_800,
        _ => return None,
    };
    Some(secs)
}
