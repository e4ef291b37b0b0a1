use crate::data::DataError;
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

//bytes read per binary-search probe; must be much larger than one record
const PROBE_WINDOW: u64 = 50_000;
const HALF_WINDOW: u64 = PROBE_WINDOW / 2;

//outcome of an offset lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Located {
    //byte offset of the first complete record whose timestamp is at or after the target
    At(u64),
    //the target precedes the first stored record, so there is no price history for it
    PrecedesHistory,
}

//locates byte offsets in a large append-only price history file without scanning it
//
//the file is delimited text, one record per line, fields
//timestamp,open,high,low,close,volume with epoch-millisecond timestamps in
//strictly ascending order. records have variable length, so the search probes
//fixed windows around byte midpoints and corrects to line boundaries at the end.
pub struct PriceSeriesIndex {
    path: PathBuf,
}

impl PriceSeriesIndex {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        PriceSeriesIndex {
            path: path.as_ref().to_path_buf(),
        }
    }

    //finds the byte offset of the first record with timestamp >= target
    //
    //a target beyond the last record resolves to the end of the file; the
    //caller observes the resulting empty stream and treats the event as
    //having no usable price window
    pub fn locate(&self, target: DateTime<Utc>) -> Result<Located, DataError> {
        let target_millis = target.timestamp_millis();
        let size = std::fs::metadata(&self.path)?.len();

        if size == 0 {
            return Ok(Located::PrecedesHistory);
        }

        //events older than the stored history are skipped, not searched for
        match self.first_timestamp()? {
            Some(first) if first > target_millis => return Ok(Located::PrecedesHistory),
            Some(_) => {}
            None => return Ok(Located::PrecedesHistory),
        }

        //binary search over the byte range; a window containing a qualifying
        //timestamp narrows left and is remembered as the candidate region
        let mut lo: u64 = 0;
        let mut hi: u64 = size;
        let mut candidate: Option<u64> = None;

        while hi - lo > HALF_WINDOW {
            let mid = lo + (hi - lo) / 2;
            let start = mid.saturating_sub(HALF_WINDOW);

            if self.window_has_at_or_after(start, target_millis)? {
                candidate = Some(start);
                hi = mid;
            } else {
                lo = mid;
            }
        }

        //line-boundary correction: re-read from the candidate region and walk
        //forward to the exact first qualifying record
        let scan_from = candidate.unwrap_or_else(|| lo.saturating_sub(HALF_WINDOW));
        let offset = self.first_offset_at_or_after(scan_from, target_millis, size)?;

        Ok(Located::At(offset))
    }

    //reads one probe window and reports whether any complete in-window record
    //has a timestamp at or after the target
    fn window_has_at_or_after(&self, start: u64, target_millis: i64) -> Result<bool, DataError> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(start))?;

        let mut buf = vec![0u8; PROBE_WINDOW as usize];
        let read = read_up_to(&mut file, &mut buf)?;
        let window = String::from_utf8_lossy(&buf[..read]);

        let lines: Vec<&str> = window.split('\n').collect();
        let truncated_tail = (read as u64) == PROBE_WINDOW;

        for (i, line) in lines.iter().enumerate() {
            //the first line is truncated unless the window starts at the file head,
            //and the last line is truncated unless the window reached end of file
            if i == 0 && start > 0 {
                continue;
            }
            if truncated_tail && i == lines.len() - 1 {
                continue;
            }

            //malformed or empty lines inside a window are skipped, not errors
            if let Some(millis) = parse_leading_timestamp(line) {
                if millis >= target_millis {
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }

    //walks forward from an approximate offset to the first complete record
    //with timestamp >= target, returning its exact byte offset
    fn first_offset_at_or_after(
        &self,
        from: u64,
        target_millis: i64,
        size: u64,
    ) -> Result<u64, DataError> {
        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(from))?;

        let mut pos = from;
        let mut line = String::new();

        //skip the possibly-truncated line the offset landed inside
        if from > 0 {
            pos += reader.read_line(&mut line)? as u64;
        }

        loop {
            line.clear();
            let n = reader.read_line(&mut line)?;
            if n == 0 {
                return Ok(size);
            }

            if let Some(millis) = parse_leading_timestamp(&line) {
                if millis >= target_millis {
                    return Ok(pos);
                }
            }

            pos += n as u64;
        }
    }

    //timestamp of the first parsable record (the header line does not parse)
    fn first_timestamp(&self) -> Result<Option<i64>, DataError> {
        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(file);
        let mut line = String::new();

        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            if let Some(millis) = parse_leading_timestamp(&line) {
                return Ok(Some(millis));
            }
        }
    }
}

//parses the timestamp field (everything before the first comma) of a record line
fn parse_leading_timestamp(line: &str) -> Option<i64> {
    line.split(',').next()?.trim().parse::<i64>().ok()
}

//reads until the buffer is full or end of file
fn read_up_to(file: &mut File, buf: &mut [u8]) -> Result<usize, DataError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASE_MILLIS: i64 = 1_700_000_000_000;

    fn utc(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).unwrap()
    }

    //writes a price file of one-second bars and returns it with the byte
    //offset of every record keyed by timestamp
    fn write_price_file(bars: usize) -> (NamedTempFile, Vec<(i64, u64)>) {
        let mut file = NamedTempFile::new().unwrap();
        let mut offsets = Vec::with_capacity(bars);
        let mut pos = 0u64;

        let header = "timestamp,open,high,low,close,volume\n";
        file.write_all(header.as_bytes()).unwrap();
        pos += header.len() as u64;

        for i in 0..bars {
            let millis = BASE_MILLIS + (i as i64) * 1_000;
            let price = 60_000.0 + (i % 97) as f64;
            let line = format!(
                "{},{},{},{},{},{}\n",
                millis,
                price,
                price + 1.0,
                price - 1.0,
                price,
                10 + i % 7
            );
            offsets.push((millis, pos));
            file.write_all(line.as_bytes()).unwrap();
            pos += line.len() as u64;
        }

        file.flush().unwrap();
        (file, offsets)
    }

    #[test]
    fn exact_timestamp_in_large_file() {
        //enough bars that the file spans several probe windows
        let (file, offsets) = write_price_file(5_000);
        let index = PriceSeriesIndex::new(file.path());

        for probe in [0usize, 1, 499, 2_500, 4_321, 4_999] {
            let (millis, expected) = offsets[probe];
            let located = index.locate(utc(millis)).unwrap();
            assert_eq!(located, Located::At(expected), "bar {}", probe);
        }
    }

    #[test]
    fn between_records_resolves_to_next() {
        let (file, offsets) = write_price_file(3_000);
        let index = PriceSeriesIndex::new(file.path());

        //target halfway between two bars resolves to the later bar
        let (millis, _) = offsets[1_200];
        let (_, next_offset) = offsets[1_201];
        let located = index.locate(utc(millis + 500)).unwrap();
        assert_eq!(located, Located::At(next_offset));
    }

    #[test]
    fn target_before_history_is_skipped() {
        let (file, _) = write_price_file(100);
        let index = PriceSeriesIndex::new(file.path());

        let located = index.locate(utc(BASE_MILLIS - 1)).unwrap();
        assert_eq!(located, Located::PrecedesHistory);
    }

    #[test]
    fn target_at_first_record_returns_its_offset() {
        let (file, offsets) = write_price_file(100);
        let index = PriceSeriesIndex::new(file.path());

        let (millis, offset) = offsets[0];
        assert_eq!(index.locate(utc(millis)).unwrap(), Located::At(offset));
    }

    #[test]
    fn target_after_last_record_yields_empty_tail() {
        let (file, offsets) = write_price_file(2_000);
        let index = PriceSeriesIndex::new(file.path());

        let (last_millis, _) = offsets[1_999];
        let located = index.locate(utc(last_millis + 60_000)).unwrap();

        //the returned offset has no records after it
        match located {
            Located::At(offset) => {
                let size = std::fs::metadata(file.path()).unwrap().len();
                assert_eq!(offset, size);
            }
            Located::PrecedesHistory => panic!("expected an offset"),
        }
    }

    #[test]
    fn empty_file_precedes_history() {
        let file = NamedTempFile::new().unwrap();
        let index = PriceSeriesIndex::new(file.path());
        assert_eq!(
            index.locate(utc(BASE_MILLIS)).unwrap(),
            Located::PrecedesHistory
        );
    }

    #[test]
    fn malformed_lines_inside_file_are_skipped() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "timestamp,open,high,low,close,volume").unwrap();
        writeln!(file, "{},10,11,9,10,5", BASE_MILLIS).unwrap();
        writeln!(file, "not,a,real,record,at,all").unwrap();
        writeln!(file).unwrap();
        let target_line_offset = std::fs::metadata(file.path()).unwrap().len();
        writeln!(file, "{},12,13,11,12,5", BASE_MILLIS + 2_000).unwrap();
        file.flush().unwrap();

        let index = PriceSeriesIndex::new(file.path());
        let located = index.locate(utc(BASE_MILLIS + 1_000)).unwrap();
        assert_eq!(located, Located::At(target_line_offset));
    }
}
