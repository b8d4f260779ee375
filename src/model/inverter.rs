use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;

use super::battery::Battery;
use crate::sim::types::INTERVAL_MINUTES;

/// How panels in the same MPPT group combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMode {
    /// Panels share a string; their outputs add up.
    #[default]
    Parallel,
    /// Panels sit behind optimisers; the group follows its strongest panel.
    Optimized,
}

/// A PV generation source with its per-interval output (kWh).
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub name: String,
    pub mppt: u32,
    pub connection: ConnectionMode,
    /// Date of the first value of `generation_kwh`, which starts at midnight.
    /// `None` means the series is aligned with the scenario's rows.
    pub start_date: Option<NaiveDate>,
    pub generation_kwh: Vec<f64>,
}

impl Panel {
    /// Index of the interval starting at `at`, or `None` if the series starts later.
    pub fn offset(&self, at: NaiveDateTime) -> Option<usize> {
        let Some(start) = self.start_date else {
            return Some(0);
        };
        let minutes = (at - start.and_time(NaiveTime::MIN)).num_minutes();
        if minutes < 0 {
            return None;
        }
        usize::try_from(minutes / i64::from(INTERVAL_MINUTES)).ok()
    }

    /// The `rows` values starting at `at`, if the series covers all of them.
    pub fn window(&self, at: NaiveDateTime, rows: usize) -> Option<&[f64]> {
        let offset = self.offset(at)?;
        self.generation_kwh.get(offset..offset.checked_add(rows)?)
    }

    /// Number of values available from `at` onwards.
    pub fn available_from(&self, at: NaiveDateTime) -> usize {
        self.offset(at)
            .map_or(0, |offset| self.generation_kwh.len().saturating_sub(offset))
    }
}

/// An AC-coupled inverter with its MPPT inputs and optional battery.
#[derive(Debug, Clone, PartialEq)]
pub struct Inverter {
    pub name: String,
    /// DC to AC conversion loss (percent), applied to PV.
    pub dc_ac_loss_percent: f64,
    /// AC to DC conversion loss (percent).
    pub ac_dc_loss_percent: f64,
    /// DC to DC conversion loss (percent).
    pub dc_dc_loss_percent: f64,
    /// Surplus power at or below which nothing is charged or fed (kW).
    pub min_excess_kw: f64,
    /// Maximum AC output (kW).
    pub max_output_kw: f64,
    pub panels: Vec<Panel>,
    pub battery: Option<Battery>,
}

impl Inverter {
    /// A loss-free, unlimited inverter used when a scenario declares none.
    pub fn perfect() -> Self {
        Self {
            name: "perfect".to_string(),
            dc_ac_loss_percent: 0.0,
            ac_dc_loss_percent: 0.0,
            dc_dc_loss_percent: 0.0,
            min_excess_kw: 0.0,
            max_output_kw: f64::INFINITY,
            panels: Vec::new(),
            battery: None,
        }
    }

    /// Multiplier applied to DC generation to obtain AC output.
    pub fn dc_ac_factor(&self) -> f64 {
        1.0 - self.dc_ac_loss_percent / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_inverter_is_lossless_and_unbounded() {
        let inv = Inverter::perfect();
        assert_eq!(inv.dc_ac_factor(), 1.0);
        assert!(inv.max_output_kw.is_infinite());
        assert!(inv.battery.is_none());
    }

    fn panel(start_date: Option<NaiveDate>, len: usize) -> Panel {
        Panel {
            name: "roof".into(),
            mppt: 1,
            connection: ConnectionMode::Parallel,
            start_date,
            generation_kwh: (0..len).map(|i| i as f64).collect(),
        }
    }

    fn at(day: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, day)
            .unwrap()
            .and_hms_opt(minute / 60, minute % 60, 0)
            .unwrap()
    }

    #[test]
    fn unanchored_series_is_used_from_the_start() {
        let p = panel(None, 4);
        assert_eq!(p.window(at(20, 0), 4), Some(&[0.0, 1.0, 2.0, 3.0][..]));
        assert_eq!(p.window(at(20, 0), 5), None);
    }

    #[test]
    fn dated_series_is_windowed_by_calendar() {
        let p = panel(NaiveDate::from_ymd_opt(2025, 1, 5), 2 * 288);
        assert_eq!(p.offset(at(6, 10)), Some(290));
        assert_eq!(p.window(at(6, 0), 2), Some(&[288.0, 289.0][..]));
        assert_eq!(p.available_from(at(6, 0)), 288);
        assert_eq!(p.window(at(6, 0), 289), None);
    }

    #[test]
    fn series_starting_after_rows_is_unavailable() {
        let p = panel(NaiveDate::from_ymd_opt(2025, 7, 1), 288);
        assert_eq!(p.offset(at(6, 0)), None);
        assert_eq!(p.window(at(6, 0), 1), None);
        assert_eq!(p.available_from(at(6, 0)), 0);
    }

    #[test]
    fn connection_mode_parses_from_snake_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            mode: ConnectionMode,
        }
        let w: Wrapper = toml::from_str("mode = \"optimized\"").unwrap();
        assert_eq!(w.mode, ConnectionMode::Optimized);
    }
}
