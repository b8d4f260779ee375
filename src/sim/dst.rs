//! Daylight-saving alignment of standard-time PV series to wall-clock rows.
//!
//! PV estimates come in standard time while load rows follow the wall clock.
//! Rows inside the spring-forward gap never happened and get no PV; rows on
//! daylight time take the PV from one hour earlier.

use std::ops::Range;

use chrono::{LocalResult, NaiveDate, Offset, TimeZone};
use chrono_tz::Tz;

use super::types::{ROWS_PER_HOUR, SimulationInputRow};

/// Wall-clock classification of one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallClock {
    Standard,
    /// Skipped by the spring-forward transition.
    Gap,
    Daylight,
}

/// Per-row DST classification, derived from the row calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DstCorrection {
    phases: Vec<WallClock>,
}

impl DstCorrection {
    /// No correction: every row is treated as standard time.
    pub fn disabled(rows: usize) -> Self {
        Self {
            phases: vec![WallClock::Standard; rows],
        }
    }

    /// Classifies every row against the transitions of `tz`.
    ///
    /// Standard time is the smaller of the January and July UTC offsets of
    /// each row's year, which also handles zones that declare a negative
    /// winter DST offset.
    pub fn detect(rows: &[SimulationInputRow], tz: Tz) -> Self {
        let mut base_year = None;
        let mut base_offset = 0;
        let phases = rows
            .iter()
            .map(|row| {
                let year = chrono::Datelike::year(&row.date);
                if base_year != Some(year) {
                    base_offset = standard_offset(tz, year);
                    base_year = Some(year);
                }
                match tz.from_local_datetime(&row.local_time()) {
                    LocalResult::None => WallClock::Gap,
                    LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => {
                        if dt.offset().fix().local_minus_utc() > base_offset {
                            WallClock::Daylight
                        } else {
                            WallClock::Standard
                        }
                    }
                }
            })
            .collect();
        Self { phases }
    }

    pub fn phases(&self) -> &[WallClock] {
        &self.phases
    }

    /// Row range of the first spring-forward gap, if any.
    pub fn gap(&self) -> Option<Range<usize>> {
        let start = self.phases.iter().position(|p| *p == WallClock::Gap)?;
        let len = self.phases[start..]
            .iter()
            .take_while(|p| **p == WallClock::Gap)
            .count();
        Some(start..start + len)
    }

    /// Realigns a standard-time PV series to the wall-clock rows.
    pub fn apply(&self, pv: &[f64]) -> Vec<f64> {
        self.phases
            .iter()
            .enumerate()
            .map(|(i, phase)| match phase {
                WallClock::Standard => pv.get(i).copied().unwrap_or(0.0),
                WallClock::Gap => 0.0,
                WallClock::Daylight => i
                    .checked_sub(ROWS_PER_HOUR)
                    .and_then(|j| pv.get(j).copied())
                    .unwrap_or(0.0),
            })
            .collect()
    }
}

fn standard_offset(tz: Tz, year: i32) -> i32 {
    [1, 7]
        .into_iter()
        .filter_map(|month| NaiveDate::from_ymd_opt(year, month, 1))
        .filter_map(|d| d.and_hms_opt(12, 0, 0))
        .filter_map(|t| tz.from_local_datetime(&t).earliest())
        .map(|dt| dt.offset().fix().local_minus_utc())
        .min()
        .unwrap_or(0)
}
