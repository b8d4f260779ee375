//! PV aggregation: panels to MPPT groups to per-inverter effective output.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::model::{ConnectionMode, Inverter};

/// Why a scenario's panel data cannot be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingPanelData {
    pub inverter: String,
    pub panel: String,
    pub available: usize,
    pub required: usize,
}

/// Checks that every panel covers the `rows` intervals starting at `at`.
///
/// # Errors
///
/// Returns the first panel whose series is too short or dated outside the
/// rows.
pub fn check_coverage(inverters: &[Inverter], at: NaiveDateTime, rows: usize) -> Result<(), MissingPanelData> {
    for inverter in inverters {
        for panel in &inverter.panels {
            if rows > 0 && panel.window(at, rows).is_none() {
                return Err(MissingPanelData {
                    inverter: inverter.name.clone(),
                    panel: panel.name.clone(),
                    available: panel.available_from(at).min(rows),
                    required: rows,
                });
            }
        }
    }
    Ok(())
}

/// Combines one MPPT group's panels into a DC series.
///
/// Parallel panels add up; optimised panels contribute the strongest panel at
/// each interval.
fn group_series(panels: &[(ConnectionMode, &[f64])], rows: usize) -> Vec<f64> {
    let value = |series: &[f64], t: usize| series.get(t).copied().unwrap_or(0.0);
    (0..rows)
        .map(|t| {
            let parallel: f64 = panels
                .iter()
                .filter(|(mode, _)| *mode == ConnectionMode::Parallel)
                .map(|(_, series)| value(series, t))
                .sum();
            let optimized = panels
                .iter()
                .filter(|(mode, _)| *mode == ConnectionMode::Optimized)
                .map(|(_, series)| value(series, t))
                .fold(0.0_f64, f64::max);
            parallel + optimized
        })
        .collect()
}

/// Effective AC PV for one inverter over the `rows` intervals starting at `at`.
///
/// Panels that do not cover the window contribute nothing; run
/// [`check_coverage`] first to skip such scenarios.
pub fn inverter_pv(inverter: &Inverter, at: NaiveDateTime, rows: usize) -> Vec<f64> {
    let mut groups: BTreeMap<u32, Vec<(ConnectionMode, &[f64])>> = BTreeMap::new();
    for panel in &inverter.panels {
        let series = panel.window(at, rows).unwrap_or_default();
        groups.entry(panel.mppt).or_default().push((panel.connection, series));
    }

    let mut total = vec![0.0; rows];
    for panels in groups.values() {
        for (acc, v) in total.iter_mut().zip(group_series(panels, rows)) {
            *acc += v;
        }
    }

    let factor = inverter.dc_ac_factor();
    for v in &mut total {
        *v *= factor;
    }
    total
}
