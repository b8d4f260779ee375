//! CSV readers for already-normalised 5-minute series.
//!
//! Load files carry `date,minute,load_kwh`; PV files carry
//! `date,minute,pv_kwh`. Records must be contiguous 5-minute intervals
//! starting at minute 0 of the first date.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::Error;
use crate::sim::types::{INTERVAL_MINUTES, MINUTES_PER_DAY, SimulationInputRow};

#[derive(Debug, Deserialize)]
struct LoadRecord {
    date: NaiveDate,
    minute: u16,
    load_kwh: f64,
}

#[derive(Debug, Deserialize)]
struct PvRecord {
    date: NaiveDate,
    minute: u16,
    pv_kwh: f64,
}

/// A PV generation series read from CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct PvSeries {
    /// Date of the first record; `None` for an empty file.
    pub start: Option<NaiveDate>,
    pub generation_kwh: Vec<f64>,
}

/// Tracks the expected next interval while records stream in.
struct Cursor<'a> {
    origin: &'a str,
    start: Option<NaiveDate>,
    date: NaiveDate,
    minute: u16,
}

impl<'a> Cursor<'a> {
    fn new(origin: &'a str) -> Self {
        Self {
            origin,
            start: None,
            date: NaiveDate::MIN,
            minute: 0,
        }
    }

    /// Checks that `(date, minute)` is the next interval and returns its day
    /// index.
    fn advance(&mut self, record: usize, date: NaiveDate, minute: u16, value: f64) -> Result<u32, Error> {
        let origin = self.origin;
        let fail = |message: String| Error::Import {
            origin: origin.to_string(),
            record,
            message,
        };
        if !value.is_finite() || value < 0.0 {
            return Err(fail(format!("energy must be finite and >= 0, got {value}")));
        }
        let start = match self.start {
            None => {
                if minute != 0 {
                    return Err(fail(format!("series must start at minute 0, starts at {minute}")));
                }
                self.start = Some(date);
                self.date = date;
                self.minute = 0;
                date
            }
            Some(start) => start,
        };
        if (date, minute) != (self.date, self.minute) {
            return Err(fail(format!(
                "expected {} minute {}, got {date} minute {minute}",
                self.date, self.minute
            )));
        }

        self.minute += INTERVAL_MINUTES;
        if self.minute >= MINUTES_PER_DAY {
            self.minute = 0;
            self.date = self.date.succ_opt().unwrap_or(NaiveDate::MAX);
        }
        Ok((date - start).num_days() as u32)
    }
}

/// Reads load rows from CSV.
///
/// # Errors
///
/// Returns [`Error::Csv`] for malformed records and [`Error::Import`] for
/// negative values or discontinuous intervals.
pub fn read_load_csv(reader: impl Read, origin: &str) -> Result<Vec<SimulationInputRow>, Error> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut cursor = Cursor::new(origin);
    let mut rows = Vec::new();
    for (i, record) in rdr.deserialize::<LoadRecord>().enumerate() {
        let r = record?;
        let day_index = cursor.advance(i + 1, r.date, r.minute, r.load_kwh)?;
        rows.push(SimulationInputRow::new(r.date, r.minute, day_index, r.load_kwh));
    }
    Ok(rows)
}

/// Reads a per-interval PV generation series from CSV.
///
/// # Errors
///
/// Same as [`read_load_csv`].
pub fn read_pv_csv(reader: impl Read, origin: &str) -> Result<PvSeries, Error> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut cursor = Cursor::new(origin);
    let mut series = Vec::new();
    for (i, record) in rdr.deserialize::<PvRecord>().enumerate() {
        let r = record?;
        cursor.advance(i + 1, r.date, r.minute, r.pv_kwh)?;
        series.push(r.pv_kwh);
    }
    Ok(PvSeries {
        start: cursor.start,
        generation_kwh: series,
    })
}

/// Opens `path` and reads load rows from it.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be opened, otherwise as
/// [`read_load_csv`].
pub fn load_csv_file(path: &Path) -> Result<Vec<SimulationInputRow>, Error> {
    read_load_csv(File::open(path)?, &path.display().to_string())
}

/// Opens `path` and reads a PV series from it.
///
/// # Errors
///
/// As [`load_csv_file`].
pub fn pv_csv_file(path: &Path) -> Result<PvSeries, Error> {
    read_pv_csv(File::open(path)?, &path.display().to_string())
}
