use crate::config::IndicatorSpec;
use serde::{Deserialize, Serialize};

//position direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    //converts to a pnl sign (Long = +1, Short = -1)
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn action_str(&self) -> &'static str {
        match self {
            Direction::Long => "buy",
            Direction::Short => "sell",
        }
    }
}

//the sized outcome of comparing a published value against its expectation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeverageResult {
    //signed leverage, negative for short
    pub leverage: i64,
    pub direction: Direction,
    //true when the raw surprise exceeded the sizing cap
    pub capped_at_max: bool,
}

//maps a published indicator value to a leverage and direction
//
//raw leverage is the surprise (value - threshold) scaled by the indicator's
//offset, truncated toward zero to an integer with sign preserved, clamped to
//the sizing cap, and negated when the indicator's relation is inverse. a
//result inside the dead zone (magnitude rounding to 0) is deliberate noise
//suppression and yields None, not an error. indicator-agnostic: cpi, gdp,
//pce, nfp and fomc differ only in their configured threshold and offset.
pub fn decide(
    value: f64,
    threshold: f64,
    spec: &IndicatorSpec,
    max_leverage: i64,
) -> Option<LeverageResult> {
    //an indicator without a usable offset produces no trade
    if spec.offset <= 0.0 {
        return None;
    }

    let raw = (value - threshold) / spec.offset;

    //integer magnitude, rounded toward zero, sign preserved
    //a non-finite value (unparsable upstream data) truncates to 0 and lands
    //in the dead zone
    let mut leverage = raw.trunc() as i64;

    let cap = max_leverage.max(0);
    let capped_at_max = leverage.abs() > cap;
    leverage = leverage.clamp(-cap, cap);

    if !spec.direct {
        leverage = -leverage;
    }

    if leverage == 0 {
        return None;
    }

    let direction = if leverage > 0 {
        Direction::Long
    } else {
        Direction::Short
    };

    Some(LeverageResult {
        leverage,
        direction,
        capped_at_max,
    })
}
