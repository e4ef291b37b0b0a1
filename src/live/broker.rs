use crate::decision::Direction;
use serde::{Deserialize, Serialize};
use thiserror::Error;

//failures talking to the trading venue
//
//always returned as values so callers are forced to branch before touching
//the payload; adapter implementations must not panic
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("broker rejected {call}: {reason}")]
    Rejected { call: &'static str, reason: String },
    #[error("broker transport failure: {0}")]
    Transport(String),
}

//a position opened at the venue, reported with actual fill values
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OpenedPosition {
    pub id: String,
    pub open_price: f64,
    pub quantity: f64,
}

//current market quote
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PriceQuote {
    pub bid: f64,
    pub ask: f64,
    pub price_ref: f64,
}

//a live position together with the protective order levels attached to it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LivePosition {
    pub id: String,
    pub direction: Direction,
    pub open_price: f64,
    pub quantity: f64,
    pub amount_base: f64,
    //price level of the attached stop-loss reduce-order, if the attach succeeded
    pub stop_order: Option<f64>,
    //price level of the attached take-profit reduce-order, if the attach succeeded
    pub target_order: Option<f64>,
}

//protocol adapter around a trading venue
//
//authentication, payload shapes and the price push listener live behind this
//trait; the engine only issues these calls
pub trait BrokerAdapter {
    fn open_position(
        &mut self,
        direction: Direction,
        amount_base: f64,
    ) -> Result<OpenedPosition, BrokerError>;

    fn attach_stop_order(
        &mut self,
        position_id: &str,
        price: f64,
        quantity: f64,
    ) -> Result<(), BrokerError>;

    fn attach_target_order(
        &mut self,
        position_id: &str,
        price: f64,
        quantity: f64,
    ) -> Result<(), BrokerError>;

    fn close_position(&mut self, position_id: &str, price_ref: f64) -> Result<(), BrokerError>;

    fn current_price(&mut self) -> Result<PriceQuote, BrokerError>;
}
