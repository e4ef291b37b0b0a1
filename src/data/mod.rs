pub mod bar;
pub mod events;
pub mod index;
pub mod stream;

pub use bar::PriceBar;
pub use events::{load_events, IndicatorEvent};
pub use index::{Located, PriceSeriesIndex};
pub use stream::{collect_bars, EventWindow};

use thiserror::Error;

//errors raised by the price-history and event-dataset layer
#[derive(Error, Debug)]
pub enum DataError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("timestamp {0} is outside the representable range")]
    InvalidTimestamp(i64),
}
