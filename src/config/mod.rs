pub mod settings;

pub use settings::{
    Config, ConfigError, ExitStyle, Indicator, IndicatorSpec, LiveConfig, TradeConfig,
};
