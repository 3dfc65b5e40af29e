// Decision cycle, paper position and session control
pub mod candle_window;
pub mod engine;
pub mod executor;
pub mod position_manager;
pub mod session;

pub use candle_window::CandleWindow;
pub use engine::{CycleOutcome, CycleReport, SkipReason, TradingEngine};
pub use executor::{ExecutionAction, ExecutionDecision, Executor};
pub use position_manager::{Position, PositionManager, PositionState, Transition};
pub use session::{listen_for_shutdown, seed_position, CycleStats, FinalReport, TradingSession};
