pub mod broker;
pub mod fetch;
pub mod session;

pub use broker::{BrokerAdapter, BrokerError, LivePosition, OpenedPosition, PriceQuote};
pub use fetch::{FetchError, IndicatorSource, Proxy, ProxyRotation};
pub use session::{LiveOutcome, LiveSession};
