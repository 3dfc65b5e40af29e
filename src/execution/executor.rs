use crate::execution::{PositionManager, PositionState};
use crate::models::Signal;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionAction {
    StopLoss,
    Buy,
    Sell,
    Skip,
}

#[derive(Debug, Clone)]
pub struct ExecutionDecision {
    pub action: ExecutionAction,
    pub reason: String,
}

/// Picks at most one transition per cycle
///
/// Precedence: stop-loss, then signal buy, then signal sell. The stop-loss
/// check runs whatever the signal says.
#[derive(Debug, Clone, Copy)]
pub struct Executor {
    stop_loss_threshold: f64,
}

impl Executor {
    pub fn new(stop_loss_threshold: f64) -> Self {
        Self {
            stop_loss_threshold,
        }
    }

    /// Process a signal and decide what to do
    pub fn process_signal(
        &self,
        pm: &PositionManager,
        signal: Signal,
        current_price: f64,
    ) -> Result<ExecutionDecision> {
        let position = pm.position();

        match pm.state()? {
            PositionState::Long { entry_price } => {
                let stop_price = entry_price * self.stop_loss_threshold;

                if current_price < stop_price {
                    return Ok(ExecutionDecision {
                        action: ExecutionAction::StopLoss,
                        reason: format!(
                            "Price {:.4} below stop {:.4} ({:.1}% of entry {:.4})",
                            current_price,
                            stop_price,
                            self.stop_loss_threshold * 100.0,
                            entry_price
                        ),
                    });
                }

                match signal {
                    Signal::Sell => Ok(ExecutionDecision {
                        action: ExecutionAction::Sell,
                        reason: format!(
                            "Sell signal with {:.2}% move from entry",
                            (current_price - entry_price) / entry_price * 100.0
                        ),
                    }),
                    Signal::Buy => Ok(ExecutionDecision {
                        action: ExecutionAction::Skip,
                        reason: "Already long".to_string(),
                    }),
                    Signal::Hold => Ok(ExecutionDecision {
                        action: ExecutionAction::Skip,
                        reason: "Hold signal".to_string(),
                    }),
                }
            }

            PositionState::Flat => match signal {
                Signal::Buy if position.quote_balance > 0.0 => Ok(ExecutionDecision {
                    action: ExecutionAction::Buy,
                    reason: format!(
                        "Buy signal with {:.2} quote available",
                        position.quote_balance
                    ),
                }),
                Signal::Buy => Ok(ExecutionDecision {
                    action: ExecutionAction::Skip,
                    reason: "Buy signal but no quote balance".to_string(),
                }),
                Signal::Sell => Ok(ExecutionDecision {
                    action: ExecutionAction::Skip,
                    reason: "No position to sell".to_string(),
                }),
                Signal::Hold => Ok(ExecutionDecision {
                    action: ExecutionAction::Skip,
                    reason: "Hold signal".to_string(),
                }),
            },
        }
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(0.98)
    }
}
