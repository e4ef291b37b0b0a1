use crate::data::DataError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

//a scheduled macroeconomic release
//
//event names the indicator ("cpi", "nfp", ...) and selects its configuration
//row; actual stays None until the value is published
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndicatorEvent {
    pub event: String,
    pub release_time: DateTime<Utc>,
    pub actual: Option<f64>,
    pub consensus: f64,
    #[serde(default)]
    pub previous: Option<f64>,
}

//loads the historical event dataset from a json array
pub fn load_events<P: AsRef<Path>>(path: P) -> Result<Vec<IndicatorEvent>, DataError> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let events: Vec<IndicatorEvent> = serde_json::from_str(&contents)?;
    Ok(events)
}
