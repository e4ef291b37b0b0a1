//a Rust-based macro-release event trading and backtesting engine

pub mod config;
pub mod data;
pub mod decision;
pub mod engine;
pub mod live;
pub mod metrics;

//prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{
        Config, ConfigError, ExitStyle, Indicator, IndicatorSpec, LiveConfig, TradeConfig,
    };
    pub use crate::data::{
        collect_bars, load_events, DataError, EventWindow, IndicatorEvent, Located, PriceBar,
        PriceSeriesIndex,
    };
    pub use crate::decision::{decide, Direction, LeverageResult};
    pub use crate::engine::{
        simulate_position, BacktestReport, BacktestRunner, ExitLevels, ExitPolicy, ExitReason,
        TradeResult,
    };
    pub use crate::live::{
        BrokerAdapter, BrokerError, FetchError, IndicatorSource, LiveOutcome, LivePosition,
        LiveSession, OpenedPosition, PriceQuote, Proxy, ProxyRotation,
    };
    pub use crate::metrics::{EventStats, StatsReport};
}
