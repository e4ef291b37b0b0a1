use crate::config::TradeConfig;
use crate::data::{EventWindow, PriceBar};
use crate::decision::{Direction, LeverageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

//marker appended to the action string when the no-movement exit fired
pub const NO_MOVEMENT_FLAG: &str = " (closed due to no movement)";

//terminal states of a simulated position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    TookProfit,
    StoppedOut,
    TimedOutNoMovement,
    TimedOutMaxHold,
    //the price file ended while the position was still open
    DataExhausted,
}

//one simulated trade, appended to the backtest output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeResult {
    pub event: String,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub action: String,
    pub entry_price: f64,
    pub exit_price: f64,
    pub profit_or_loss: f64,
    pub position_size_base: f64,
}

impl TradeResult {
    pub fn is_no_movement_exit(&self) -> bool {
        self.action.ends_with(NO_MOVEMENT_FLAG)
    }
}

//absolute price levels governing one position's exit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitLevels {
    pub take_profit: f64,
    pub stop_loss: f64,
    pub return_threshold: f64,
}

impl ExitLevels {
    //derives the exit levels from the actual entry price
    //
    //for longs the target sits above entry and the stop below; shorts mirror
    pub fn for_entry(direction: Direction, entry_price: f64, trade: &TradeConfig) -> Self {
        match direction {
            Direction::Long => ExitLevels {
                take_profit: entry_price * (1.0 + trade.take_profit_pct),
                stop_loss: entry_price * (1.0 - trade.stop_loss_pct),
                return_threshold: entry_price * (1.0 + trade.return_threshold_pct),
            },
            Direction::Short => ExitLevels {
                take_profit: entry_price * (1.0 - trade.take_profit_pct),
                stop_loss: entry_price * (1.0 + trade.stop_loss_pct),
                return_threshold: entry_price * (1.0 - trade.return_threshold_pct),
            },
        }
    }
}

//exit parameters known before the entry price is (direction and timing);
//turned into absolute ExitRules once the entry bar's open is observed
#[derive(Debug, Clone)]
pub struct ExitPolicy {
    pub direction: Direction,
    pub entry_time: DateTime<Utc>,
    trade: TradeConfig,
    grace_secs: i64,
    max_hold_secs: Option<i64>,
}

impl ExitPolicy {
    pub fn new(
        direction: Direction,
        entry_time: DateTime<Utc>,
        trade: &TradeConfig,
        max_hold_secs: Option<u64>,
    ) -> Self {
        ExitPolicy {
            direction,
            entry_time,
            trade: trade.clone(),
            grace_secs: trade.no_movement_grace_secs as i64,
            max_hold_secs: max_hold_secs.map(|s| s as i64),
        }
    }

    pub fn rules_at(&self, entry_price: f64) -> ExitRules {
        ExitRules {
            direction: self.direction,
            entry_time: self.entry_time,
            levels: ExitLevels::for_entry(self.direction, entry_price, &self.trade),
            grace_secs: self.grace_secs,
            max_hold_secs: self.max_hold_secs,
        }
    }

    //stop condition for the bar stream
    //
    //stateful: remembers whether the return threshold was ever crossed, and
    //derives the absolute levels from the entry price on first invocation
    pub fn stop_condition(&self) -> impl FnMut(&PriceBar, f64) -> bool + '_ {
        let mut rules: Option<ExitRules> = None;
        let mut moved = false;

        move |bar, entry_price| {
            let rules = rules.get_or_insert_with(|| self.rules_at(entry_price));
            let done = rules.evaluate(bar, moved).is_some();
            moved = moved || rules.crosses_return_threshold(bar);
            done
        }
    }
}

//fully-resolved exit rules for one open position
#[derive(Debug, Clone)]
pub struct ExitRules {
    pub direction: Direction,
    pub entry_time: DateTime<Utc>,
    pub levels: ExitLevels,
    grace_secs: i64,
    max_hold_secs: Option<i64>,
}

impl ExitRules {
    fn touches_target(&self, bar: &PriceBar) -> bool {
        match self.direction {
            Direction::Long => bar.high >= self.levels.take_profit,
            Direction::Short => bar.low <= self.levels.take_profit,
        }
    }

    fn touches_stop(&self, bar: &PriceBar) -> bool {
        match self.direction {
            Direction::Long => bar.low <= self.levels.stop_loss,
            Direction::Short => bar.high >= self.levels.stop_loss,
        }
    }

    //whether the bar reaches the minimum favorable move
    pub fn crosses_return_threshold(&self, bar: &PriceBar) -> bool {
        match self.direction {
            Direction::Long => bar.high >= self.levels.return_threshold,
            Direction::Short => bar.low <= self.levels.return_threshold,
        }
    }

    //classifies one bar against the exit rules
    //
    //moved says whether the return threshold was crossed on an earlier bar.
    //take-profit is deliberately checked before stop-loss: when a single bar
    //touches both levels the favorable exit wins (documented tie-break)
    pub fn evaluate(&self, bar: &PriceBar, moved: bool) -> Option<(ExitReason, f64)> {
        if self.touches_target(bar) {
            return Some((ExitReason::TookProfit, self.levels.take_profit));
        }

        if self.touches_stop(bar) {
            return Some((ExitReason::StoppedOut, self.levels.stop_loss));
        }

        let held = bar.seconds_since(self.entry_time);

        if held >= self.grace_secs && !moved && !self.crosses_return_threshold(bar) {
            return Some((ExitReason::TimedOutNoMovement, bar.close));
        }

        if let Some(max_hold) = self.max_hold_secs {
            if held >= max_hold {
                return Some((ExitReason::TimedOutMaxHold, bar.close));
            }
        }

        None
    }

    //walks the bars of one event window and resolves the exit
    pub fn resolve_exit(&self, bars: &[PriceBar]) -> Option<(ExitReason, f64, DateTime<Utc>)> {
        let mut moved = false;

        for bar in bars {
            if let Some((reason, price)) = self.evaluate(bar, moved) {
                return Some((reason, price, bar.timestamp));
            }
            moved = moved || self.crosses_return_threshold(bar);
        }

        //still open at end of data: close at the final bar
        bars.last()
            .map(|bar| (ExitReason::DataExhausted, bar.close, bar.timestamp))
    }
}

//replays one event's price window against the exit rules and emits the trade
pub fn simulate_position(
    event: &str,
    decision: &LeverageResult,
    window: &EventWindow,
    policy: &ExitPolicy,
    base_amount: f64,
) -> TradeResult {
    let entry_price = window.entry_price;
    let rules = policy.rules_at(entry_price);

    //quantity in the base asset
    let quantity = base_amount * decision.leverage.abs() as f64 / entry_price;

    let (reason, exit_price, exit_time) = rules
        .resolve_exit(&window.bars)
        .unwrap_or((ExitReason::DataExhausted, entry_price, policy.entry_time));

    let profit_or_loss = (exit_price - entry_price) * quantity * policy.direction.sign();

    let mut action = policy.direction.action_str().to_string();
    if reason == ExitReason::TimedOutNoMovement {
        action.push_str(NO_MOVEMENT_FLAG);
    }

    TradeResult {
        event: event.to_string(),
        entry_time: policy.entry_time,
        exit_time,
        action,
        entry_price,
        exit_price,
        profit_or_loss,
        position_size_base: quantity,
    }
}
