use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown indicator: {0}")]
    UnknownIndicator(String),
    #[error("no configuration row for indicator {0}")]
    MissingIndicator(&'static str),
}

//macro indicators the engine knows how to trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Indicator {
    Cpi,
    Gdp,
    Pce,
    Nfp,
    Fomc,
}

impl Indicator {
    //parse an indicator selector from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cpi" => Some(Indicator::Cpi),
            "gdp" => Some(Indicator::Gdp),
            "pce" => Some(Indicator::Pce),
            "nfp" | "payrolls" => Some(Indicator::Nfp),
            "fomc" | "fomc_rate" => Some(Indicator::Fomc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Indicator::Cpi => "cpi",
            Indicator::Gdp => "gdp",
            Indicator::Pce => "pce",
            Indicator::Nfp => "nfp",
            Indicator::Fomc => "fomc",
        }
    }
}

//per-indicator decision constants
//
//threshold is the expectation the live loop compares the published value
//against (the backtest uses each event's own consensus instead); offset
//converts the surprise into leverage units; direct=false inverts the
//relation (every indicator this engine trades is inverse: a hotter-than-
//expected print is bearish for the instrument)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndicatorSpec {
    pub threshold: f64,
    pub offset: f64,
    pub direct: bool,
    pub max_hold_secs: Option<u64>,
}

impl IndicatorSpec {
    //preset rows for the supported indicators

    pub fn cpi() -> Self {
        IndicatorSpec {
            threshold: 3.4,   //yoy percent
            offset: 0.2,
            direct: false,
            max_hold_secs: Some(1500),
        }
    }

    pub fn gdp() -> Self {
        IndicatorSpec {
            threshold: 2.0,   //annualized qoq percent
            offset: 0.5,
            direct: false,
            max_hold_secs: Some(1500),
        }
    }

    pub fn pce() -> Self {
        IndicatorSpec {
            threshold: 2.8,   //core yoy percent
            offset: 0.2,
            direct: false,
            max_hold_secs: Some(1500),
        }
    }

    pub fn nfp() -> Self {
        IndicatorSpec {
            threshold: 180_000.0, //jobs added
            offset: 50_000.0,
            direct: false,
            max_hold_secs: Some(1500),
        }
    }

    pub fn fomc() -> Self {
        IndicatorSpec {
            threshold: 5.25,  //target rate upper bound, percent
            offset: 0.25,
            direct: false,
            max_hold_secs: Some(1500),
        }
    }
}

//global position sizing and exit parameters shared by backtest and live mode
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeConfig {
    //notional traded per unit of leverage, in quote currency
    pub base_amount: f64,

    //hard cap on total position notional
    pub max_position_size: f64,

    //adverse move fraction that stops the position out
    pub stop_loss_pct: f64,

    //favorable move fraction that takes profit
    pub take_profit_pct: f64,

    //minimum favorable move required to keep the position past the grace period
    pub return_threshold_pct: f64,

    //seconds after entry before the no-movement exit is considered
    pub no_movement_grace_secs: u64,
}

impl TradeConfig {
    //largest leverage magnitude the sizing caps allow
    pub fn max_leverage(&self) -> i64 {
        if self.base_amount <= 0.0 {
            return 0;
        }
        (self.max_position_size / self.base_amount).floor() as i64
    }
}

impl Default for TradeConfig {
    fn default() -> Self {
        TradeConfig {
            base_amount: 200_000.0,
            max_position_size: 1_000_000.0,
            stop_loss_pct: 0.002,
            take_profit_pct: 0.02,
            return_threshold_pct: 0.001,
            no_movement_grace_secs: 10,
        }
    }
}

//how the live loop disposes of an opened position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStyle {
    //attach take-profit and stop-loss reduce-orders against the fill
    ProtectiveOrders,
    //hold for the indicator's max_hold_secs, then close at reference price
    TimedClose,
}

//live polling loop settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LiveConfig {
    pub poll_interval_secs: u64,

    //stop after a single fetch attempt instead of polling until publication
    pub single_shot: bool,

    //ignore any configured proxies and fetch directly
    pub proxyless: bool,

    pub exit_style: ExitStyle,
}

impl Default for LiveConfig {
    fn default() -> Self {
        LiveConfig {
            poll_interval_secs: 5,
            single_shot: false,
            proxyless: false,
            exit_style: ExitStyle::ProtectiveOrders,
        }
    }
}

//complete engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    //decision constants keyed by indicator selector ("cpi", "gdp", ...)
    pub indicators: IndexMap<String, IndicatorSpec>,

    pub trade: TradeConfig,

    pub live: LiveConfig,
}

impl Default for Config {
    fn default() -> Self {
        let mut indicators = IndexMap::new();
        indicators.insert(Indicator::Cpi.as_str().to_string(), IndicatorSpec::cpi());
        indicators.insert(Indicator::Gdp.as_str().to_string(), IndicatorSpec::gdp());
        indicators.insert(Indicator::Pce.as_str().to_string(), IndicatorSpec::pce());
        indicators.insert(Indicator::Nfp.as_str().to_string(), IndicatorSpec::nfp());
        indicators.insert(Indicator::Fomc.as_str().to_string(), IndicatorSpec::fomc());

        Config {
            indicators,
            trade: TradeConfig::default(),
            live: LiveConfig::default(),
        }
    }
}

impl Config {
    //load configuration from a JSON file
    pub fn from_json_file(path: &PathBuf) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        Ok(config)
    }

    //save configuration to a JSON file
    pub fn to_json_file(&self, path: &PathBuf) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    //looks up the decision constants for an indicator selector
    //
    //an unrecognized selector is a configuration error, fatal for
    //operator-supplied selectors; the backtest runner downgrades it to a
    //per-event skip
    pub fn spec_for(&self, selector: &str) -> Result<&IndicatorSpec, ConfigError> {
        let indicator = Indicator::parse(selector)
            .ok_or_else(|| ConfigError::UnknownIndicator(selector.to_string()))?;
        self.indicators
            .get(indicator.as_str())
            .ok_or(ConfigError::MissingIndicator(indicator.as_str()))
    }
}
