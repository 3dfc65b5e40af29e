use chrono::{DateTime, Utc};

use crate::error::BotError;
use crate::execution::ExecutionAction;
use crate::models::{TradeAction, TradeRecord};
use crate::Result;

/// Economic state of the paper account
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositionState {
    Flat,
    Long { entry_price: f64 },
}

/// Balances of the simulated account
///
/// All-in/all-out: either everything sits in quote (flat) or everything
/// sits in base with a known entry price (long).
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub quote_balance: f64,
    pub base_balance: f64,
    pub entry_price: Option<f64>,
    pub cost_basis: f64, // Quote spent on the open position
}

impl Position {
    pub fn flat(quote_balance: f64) -> Self {
        Self {
            quote_balance,
            base_balance: 0.0,
            entry_price: None,
            cost_basis: 0.0,
        }
    }

    /// Classify the balances, rejecting combinations the model cannot reach
    pub fn state(&self) -> Result<PositionState> {
        match self.entry_price {
            Some(entry_price) => {
                if !(entry_price > 0.0 && entry_price.is_finite()) {
                    return Err(BotError::StateInvariant(format!(
                        "entry price {} is not a positive price",
                        entry_price
                    )));
                }
                if self.base_balance <= 0.0 {
                    return Err(BotError::StateInvariant(format!(
                        "entry price {} set but base balance is {}",
                        entry_price, self.base_balance
                    )));
                }
                if self.quote_balance != 0.0 {
                    return Err(BotError::StateInvariant(format!(
                        "long position still holds {} quote",
                        self.quote_balance
                    )));
                }
                Ok(PositionState::Long { entry_price })
            }
            None => {
                if self.base_balance != 0.0 {
                    return Err(BotError::StateInvariant(format!(
                        "base balance {} held without an entry price",
                        self.base_balance
                    )));
                }
                if self.quote_balance < 0.0 {
                    return Err(BotError::StateInvariant(format!(
                        "negative quote balance {}",
                        self.quote_balance
                    )));
                }
                Ok(PositionState::Flat)
            }
        }
    }

    /// Mark-to-market value in quote
    pub fn value(&self, price: f64) -> f64 {
        self.quote_balance + self.base_balance * price
    }
}

/// Result of applying one decision
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    StopLoss(TradeRecord),
    Buy(TradeRecord),
    Sell(TradeRecord),
    NoOp,
}

impl Transition {
    pub fn record(&self) -> Option<&TradeRecord> {
        match self {
            Transition::StopLoss(r) | Transition::Buy(r) | Transition::Sell(r) => Some(r),
            Transition::NoOp => None,
        }
    }
}

/// Owns the paper position and the append-only trade ledger
#[derive(Debug)]
pub struct PositionManager {
    position: Position,
    ledger: Vec<TradeRecord>,
    trading_fee: f64,
}

impl PositionManager {
    /// Start flat with the given quote balance
    pub fn new(starting_quote: f64, trading_fee: f64) -> Self {
        Self {
            position: Position::flat(starting_quote),
            ledger: Vec::new(),
            trading_fee,
        }
    }

    /// Restore from explicit balances; rejects inconsistent state up front
    pub fn with_position(position: Position, trading_fee: f64) -> Result<Self> {
        position.state()?;
        Ok(Self {
            position,
            ledger: Vec::new(),
            trading_fee,
        })
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn state(&self) -> Result<PositionState> {
        self.position.state()
    }

    /// Every trade so far, oldest first
    pub fn ledger(&self) -> &[TradeRecord] {
        &self.ledger
    }

    /// Apply the executor's decision at the given price
    pub fn execute(
        &mut self,
        action: ExecutionAction,
        price: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Transition> {
        let transition = match action {
            ExecutionAction::StopLoss => {
                Transition::StopLoss(self.close_long(price, timestamp, TradeAction::StopLossSell)?)
            }
            ExecutionAction::Buy => Transition::Buy(self.open_long(price, timestamp)?),
            ExecutionAction::Sell => {
                Transition::Sell(self.close_long(price, timestamp, TradeAction::Sell)?)
            }
            ExecutionAction::Skip => Transition::NoOp,
        };

        // Post-condition: bookkeeping must still classify cleanly
        self.position.state()?;
        Ok(transition)
    }

    /// Convert the whole quote balance into base, net of fee
    pub fn open_long(&mut self, price: f64, timestamp: DateTime<Utc>) -> Result<TradeRecord> {
        if self.position.state()? != PositionState::Flat {
            return Err(BotError::StateInvariant(
                "buy requested while already long".to_string(),
            ));
        }
        check_price(price)?;

        let spent = self.position.quote_balance;
        let acquired = spent * (1.0 - self.trading_fee) / price;

        self.position = Position {
            quote_balance: 0.0,
            base_balance: acquired,
            entry_price: Some(price),
            cost_basis: spent,
        };

        let record = TradeRecord {
            timestamp,
            action: TradeAction::Buy,
            price,
            realized_return: 0.0,
        };
        self.ledger.push(record.clone());

        tracing::info!(
            "🟢 Buy at {:.4} on {}. New Balances: quote={:.2}, base={:.6}",
            price,
            timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.position.quote_balance,
            self.position.base_balance
        );

        Ok(record)
    }

    /// Convert the whole base balance back into quote, net of fee
    pub fn close_long(
        &mut self,
        price: f64,
        timestamp: DateTime<Utc>,
        action: TradeAction,
    ) -> Result<TradeRecord> {
        let entry_price = match self.position.state()? {
            PositionState::Long { entry_price } => entry_price,
            PositionState::Flat => {
                return Err(BotError::StateInvariant(format!(
                    "{} requested without an open position",
                    action
                )))
            }
        };
        if action == TradeAction::Buy {
            return Err(BotError::StateInvariant(
                "close_long called with a buy action".to_string(),
            ));
        }
        check_price(price)?;

        let proceeds = self.position.base_balance * price * (1.0 - self.trading_fee);
        let realized_return = (price - entry_price) / entry_price;
        let net_pnl = proceeds - self.position.cost_basis;

        self.position = Position::flat(self.position.quote_balance + proceeds);

        let record = TradeRecord {
            timestamp,
            action,
            price,
            realized_return,
        };
        self.ledger.push(record.clone());

        tracing::info!(
            "🔴 {} at {:.4} on {} (Profit: {:.2}%, net {:+.2} quote). New Balances: quote={:.2}, base={:.6}",
            action,
            price,
            timestamp.format("%Y-%m-%d %H:%M:%S"),
            realized_return * 100.0,
            net_pnl,
            self.position.quote_balance,
            self.position.base_balance
        );

        Ok(record)
    }
}

fn check_price(price: f64) -> Result<()> {
    if price > 0.0 && price.is_finite() {
        Ok(())
    } else {
        Err(BotError::MalformedData(format!("invalid trade price {}", price)))
    }
}
