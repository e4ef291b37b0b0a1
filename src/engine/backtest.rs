use crate::config::Config;
use crate::data::{collect_bars, DataError, IndicatorEvent, Located, PriceSeriesIndex};
use crate::decision::decide;
use crate::engine::simulator::{simulate_position, ExitPolicy, TradeResult};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

//result of a full backtest run
#[derive(Debug, Clone)]
pub struct BacktestReport {
    pub trades: Vec<TradeResult>,
    pub events_total: usize,
    pub events_skipped: usize,
}

//replays every historical release against the price history
//
//events are independent over shared read-only data, so they fan out across
//threads; the collected trades keep the dataset's event order
pub struct BacktestRunner {
    config: Config,
    prices_path: PathBuf,
}

impl BacktestRunner {
    pub fn new<P: AsRef<Path>>(config: Config, prices_path: P) -> Self {
        BacktestRunner {
            config,
            prices_path: prices_path.as_ref().to_path_buf(),
        }
    }

    //runs the backtest over the whole event dataset
    //
    //individual events are skipped (with a console note) for unpublished
    //values, unconfigured indicators, dead-zone surprises, and events that
    //precede the stored price history; the run always produces a complete
    //result set for the rest
    pub fn run(&self, events: &[IndicatorEvent]) -> Result<BacktestReport, DataError> {
        let index = PriceSeriesIndex::new(&self.prices_path);

        let outcomes: Result<Vec<Option<TradeResult>>, DataError> = events
            .par_iter()
            .map(|event| self.run_event(&index, event))
            .collect();

        let trades: Vec<TradeResult> = outcomes?.into_iter().flatten().collect();

        Ok(BacktestReport {
            events_total: events.len(),
            events_skipped: events.len() - trades.len(),
            trades,
        })
    }

    fn run_event(
        &self,
        index: &PriceSeriesIndex,
        event: &IndicatorEvent,
    ) -> Result<Option<TradeResult>, DataError> {
        let Some(actual) = event.actual else {
            println!(
                "{} @ {}: skipped (no published value)",
                event.event, event.release_time
            );
            return Ok(None);
        };

        let spec = match self.config.spec_for(&event.event) {
            Ok(spec) => spec,
            Err(err) => {
                println!("{} @ {}: skipped ({})", event.event, event.release_time, err);
                return Ok(None);
            }
        };

        //the event's own consensus is the expectation the surprise is measured against
        let max_leverage = self.config.trade.max_leverage();
        let Some(decision) = decide(actual, event.consensus, spec, max_leverage) else {
            println!(
                "{} @ {}: no action, inside threshold band (actual {}, consensus {})",
                event.event, event.release_time, actual, event.consensus
            );
            return Ok(None);
        };

        let offset = match index.locate(event.release_time)? {
            Located::At(offset) => offset,
            Located::PrecedesHistory => {
                println!(
                    "{} @ {}: skipped (precedes stored price history)",
                    event.event, event.release_time
                );
                return Ok(None);
            }
        };

        let policy = ExitPolicy::new(
            decision.direction,
            event.release_time,
            &self.config.trade,
            spec.max_hold_secs,
        );

        let window = collect_bars(
            &self.prices_path,
            offset,
            event.release_time,
            policy.stop_condition(),
        )?;

        let Some(window) = window else {
            println!(
                "{} @ {}: skipped (no price bars at or after release)",
                event.event, event.release_time
            );
            return Ok(None);
        };

        let trade = simulate_position(
            &event.event,
            &decision,
            &window,
            &policy,
            self.config.trade.base_amount,
        );

        println!(
            "{} @ {}: {} lev {:+} entry {} exit {} pnl {:.2}",
            event.event,
            event.release_time,
            trade.action,
            decision.leverage,
            trade.entry_price,
            trade.exit_price,
            trade.profit_or_loss
        );

        Ok(Some(trade))
    }
}
