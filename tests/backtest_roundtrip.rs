//end-to-end backtest over a generated price file: locate, stream, simulate,
//persist, and re-read the full result set

use approx::assert_relative_eq;
use chrono::{DateTime, TimeZone, Utc};
use pozole::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

const BASE_MILLIS: i64 = 1_700_000_000_000;

//release far enough into the file that the index has to search for it
const RELEASE_SECOND: i64 = 3_030;

fn utc(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).unwrap()
}

//one-second bars: flat at 60000 until the release, then declining 25/s and
//flooring at 58700 (deep enough to take a short's profit at 58800)
fn write_price_history() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "timestamp,open,high,low,close,volume").unwrap();

    for i in 0..10_000i64 {
        let millis = BASE_MILLIS + i * 1_000;
        let price = if i <= RELEASE_SECOND {
            60_000.0
        } else {
            (60_000.0 - 25.0 * (i - RELEASE_SECOND) as f64).max(58_700.0)
        };
        writeln!(
            file,
            "{},{},{},{},{},3",
            millis,
            price,
            price + 5.0,
            price - 5.0,
            price
        )
        .unwrap();
    }

    file.flush().unwrap();
    file
}

fn event(name: &str, millis: i64, actual: Option<f64>, consensus: f64) -> IndicatorEvent {
    IndicatorEvent {
        event: name.to_string(),
        release_time: utc(millis),
        actual,
        consensus,
        previous: None,
    }
}

#[test]
fn full_backtest_produces_and_round_trips_results() {
    let prices = write_price_history();
    let release_millis = BASE_MILLIS + RELEASE_SECOND * 1_000;

    let events = vec![
        //hot cpi print: surprise 2.2 over offset 0.2, clamped to a 5x short
        event("cpi", release_millis, Some(3.5), 1.3),
        //before any stored price history: skipped
        event("nfp", BASE_MILLIS - 1_000_000, Some(400_000.0), 180_000.0),
        //inside the dead zone: skipped
        event("nfp", release_millis, Some(190_000.0), 180_000.0),
        //not yet published: skipped
        event("gdp", release_millis, None, 2.0),
    ];

    let runner = BacktestRunner::new(Config::default(), prices.path());
    let report = runner.run(&events).unwrap();

    assert_eq!(report.events_total, 4);
    assert_eq!(report.events_skipped, 3);
    assert_eq!(report.trades.len(), 1);

    let trade = &report.trades[0];
    assert_eq!(trade.event, "cpi");
    assert_eq!(trade.action, "sell");
    assert_eq!(trade.entry_time, utc(release_millis));
    assert_relative_eq!(trade.entry_price, 60_000.0);

    //short take-profit at exactly entry * (1 - 0.02)
    assert_relative_eq!(trade.exit_price, 58_800.0);
    assert!(trade.exit_time > trade.entry_time);

    //quantity 200000 * 5 / 60000, pnl = 1200 * quantity
    assert_relative_eq!(trade.position_size_base, 1_000_000.0 / 60_000.0);
    assert_relative_eq!(trade.profit_or_loss, 20_000.0, max_relative = 1e-12);

    //persist the result set and read it back field-for-field
    let mut results_file = NamedTempFile::new().unwrap();
    let json = serde_json::to_string_pretty(&report.trades).unwrap();
    results_file.write_all(json.as_bytes()).unwrap();
    results_file.flush().unwrap();

    let contents = std::fs::read_to_string(results_file.path()).unwrap();
    let reread: Vec<TradeResult> = serde_json::from_str(&contents).unwrap();
    assert_eq!(reread, report.trades);

    //the statistics layer consumes the same records
    let stats = StatsReport::from_trades(&reread);
    assert_eq!(stats.total_trades, 1);
    assert_eq!(stats.winning_trades, 1);
    assert_relative_eq!(stats.win_rate, 1.0);
    assert_relative_eq!(stats.total_profit_or_loss, 20_000.0, max_relative = 1e-12);
    assert_eq!(stats.per_event["cpi"].trades, 1);
    assert_relative_eq!(stats.per_event["cpi"].success_probability, 1.0);
}

#[test]
fn no_movement_exit_flows_through_to_statistics() {
    //entirely flat history: every qualifying trade times out with the flag
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "timestamp,open,high,low,close,volume").unwrap();
    for i in 0..600i64 {
        let millis = BASE_MILLIS + i * 1_000;
        writeln!(file, "{},60000,60000,60000,60000,1", millis).unwrap();
    }
    file.flush().unwrap();

    let events = vec![event("cpi", BASE_MILLIS + 60_000, Some(3.5), 1.3)];

    let runner = BacktestRunner::new(Config::default(), file.path());
    let report = runner.run(&events).unwrap();

    assert_eq!(report.trades.len(), 1);
    let trade = &report.trades[0];
    assert!(trade.is_no_movement_exit());
    assert_relative_eq!(trade.exit_price, 60_000.0);
    assert_relative_eq!(trade.profit_or_loss, 0.0);
    //closed at the end of the grace period
    assert_eq!(
        trade.exit_time,
        utc(BASE_MILLIS + 60_000 + 10_000)
    );

    let stats = StatsReport::from_trades(&report.trades);
    assert_eq!(stats.no_movement_exits, 1);
    assert_eq!(stats.flat_trades, 1);
    assert_relative_eq!(stats.per_event["cpi"].impact_probability, 0.0);
}
