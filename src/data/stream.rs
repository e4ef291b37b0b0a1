use crate::data::bar::PriceBar;
use crate::data::DataError;
use chrono::{DateTime, Utc};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::Path;

#[derive(Debug, Deserialize)]
struct CsvRecord {
    timestamp: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

//the post-release slice of price history for one event
//
//entry_price is the open of the first bar at or after the event's release
//time; bars holds that bar and everything read up to and including the bar
//that satisfied the stop condition
#[derive(Debug, Clone, PartialEq)]
pub struct EventWindow {
    pub entry_price: f64,
    pub bars: Vec<PriceBar>,
}

//reads bars forward from a line-aligned byte offset until the stop condition
//fires or the file ends
//
//records before entry_time are discarded (the located offset may land a few
//records ahead of the release bar). once the entry price is captured the stop
//condition is consulted after every record; the record that triggers it is
//the last one included. returns None when no record ever reaches entry_time.
pub fn collect_bars<P, F>(
    path: P,
    start_offset: u64,
    entry_time: DateTime<Utc>,
    mut stop: F,
) -> Result<Option<EventWindow>, DataError>
where
    P: AsRef<Path>,
    F: FnMut(&PriceBar, f64) -> bool,
{
    let mut file = File::open(path.as_ref())?;
    file.seek(SeekFrom::Start(start_offset))?;

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .from_reader(BufReader::new(file));

    let entry_millis = entry_time.timestamp_millis();
    let mut entry_price: Option<f64> = None;
    let mut bars = Vec::new();

    for result in reader.deserialize() {
        let record: CsvRecord = result?;

        if entry_price.is_none() && record.timestamp < entry_millis {
            continue;
        }

        let timestamp = PriceBar::timestamp_from_millis(record.timestamp)
            .ok_or(DataError::InvalidTimestamp(record.timestamp))?;
        let bar = PriceBar::new_unchecked(
            timestamp,
            record.open,
            record.high,
            record.low,
            record.close,
            record.volume,
        );

        let price = *entry_price.get_or_insert(bar.open);
        let done = stop(&bar, price);
        bars.push(bar);

        if done {
            break;
        }
    }

    Ok(entry_price.map(|entry_price| EventWindow { entry_price, bars }))
}
