//! Core simulation types: interval constants and input/output rows.

use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};

/// Length of one simulation interval in minutes.
pub const INTERVAL_MINUTES: u16 = 5;
/// Intervals per hour.
pub const ROWS_PER_HOUR: usize = 12;
/// Intervals per day.
pub const ROWS_PER_DAY: usize = 24 * ROWS_PER_HOUR;
/// Duration of one interval in hours, used to turn kW limits into kWh per interval.
pub const INTERVAL_HOURS: f64 = INTERVAL_MINUTES as f64 / 60.0;
/// Minutes in a day.
pub const MINUTES_PER_DAY: u16 = 1440;

/// Converts a power limit to the energy it allows within one interval.
pub fn kw_to_interval_kwh(kw: f64) -> f64 {
    kw * INTERVAL_HOURS
}

/// One prepared 5-minute input interval.
///
/// Rows arrive already deduplicated and wall-clock normalised: every calendar
/// day holds exactly [`ROWS_PER_DAY`] rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationInputRow {
    /// Calendar date of the interval (wall clock).
    pub date: NaiveDate,
    /// Minutes since local midnight at the start of the interval.
    pub minute_of_day: u16,
    /// Day of week of `date`.
    pub day_of_week: Weekday,
    /// Zero-based day index from the first simulated day.
    pub day_index: u32,
    /// Household demand in kWh for this interval.
    pub load_kwh: f64,
}

impl SimulationInputRow {
    /// Creates a row, deriving the weekday from `date`.
    pub fn new(date: NaiveDate, minute_of_day: u16, day_index: u32, load_kwh: f64) -> Self {
        Self {
            date,
            minute_of_day,
            day_of_week: date.weekday(),
            day_index,
            load_kwh,
        }
    }

    /// Builds a contiguous row sequence starting at midnight on `start`,
    /// one row per entry of `load_kwh`.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use pv_tariff_sim::sim::types::SimulationInputRow;
    ///
    /// let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    /// let rows = SimulationInputRow::series(start, &[0.1; 290]);
    /// assert_eq!(rows.len(), 290);
    /// assert_eq!(rows[288].minute_of_day, 0);
    /// assert_eq!(rows[289].day_index, 1);
    /// ```
    pub fn series(start: NaiveDate, load_kwh: &[f64]) -> Vec<Self> {
        load_kwh
            .iter()
            .enumerate()
            .map(|(i, &load)| {
                let day_index = (i / ROWS_PER_DAY) as u32;
                let minute = ((i % ROWS_PER_DAY) as u16) * INTERVAL_MINUTES;
                let date = start + chrono::Days::new(u64::from(day_index));
                Self::new(date, minute, day_index, load)
            })
            .collect()
    }

    /// Wall-clock timestamp at the start of the interval.
    pub fn local_time(&self) -> NaiveDateTime {
        let time = NaiveTime::from_num_seconds_from_midnight_opt(
            u32::from(self.minute_of_day) * 60,
            0,
        )
        .unwrap_or(NaiveTime::MIN);
        self.date.and_time(time)
    }
}

/// Simulated energy flows for one interval of one scenario.
///
/// All flows are kWh within the interval and never negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationOutputRow {
    pub date: NaiveDate,
    pub minute_of_day: u16,
    pub day_of_week: Weekday,
    /// Household demand.
    pub load: f64,
    /// Loss-adjusted PV across all inverters.
    pub pv: f64,
    /// Energy imported from the grid.
    pub buy: f64,
    /// Energy exported to the grid, after the feed loss.
    pub feed: f64,
    /// Aggregate state of charge across all batteries after this interval (kWh).
    pub soc: f64,
    pub pv_to_load: f64,
    pub pv_to_charge: f64,
    pub battery_to_load: f64,
}

impl fmt::Display for SimulationOutputRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:02}:{:02} | load={:.3} pv={:.3} | buy={:.3} feed={:.3} | \
             pv>load={:.3} pv>bat={:.3} bat>load={:.3} | SoC={:.2} kWh",
            self.date,
            self.minute_of_day / 60,
            self.minute_of_day % 60,
            self.load,
            self.pv,
            self.buy,
            self.feed,
            self.pv_to_load,
            self.pv_to_charge,
            self.battery_to_load,
            self.soc,
        )
    }
}
