pub mod backtest;
pub mod simulator;

pub use backtest::{BacktestReport, BacktestRunner};
pub use simulator::{
    simulate_position, ExitLevels, ExitPolicy, ExitReason, ExitRules, TradeResult,
    NO_MOVEMENT_FLAG,
};
