//! Shared test fixtures for integration tests.
#![allow(dead_code)]

use chrono::NaiveDate;
use pv_tariff_sim::model::{Battery, ChargeCurve, ConnectionMode, Inverter, Panel, Scenario};
use pv_tariff_sim::sim::types::SimulationInputRow;
use pv_tariff_sim::tariff::{DayRate, PricePlan};

/// A Monday, so weekday-based tariffs line up with row indices.
pub fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()
}

/// Input rows from a load series, starting at [`start_date`].
pub fn rows(load: &[f64]) -> Vec<SimulationInputRow> {
    SimulationInputRow::series(start_date(), load)
}

/// A single parallel panel on MPPT 1.
pub fn panel(name: &str, series: Vec<f64>) -> Panel {
    Panel {
        name: name.into(),
        mppt: 1,
        connection: ConnectionMode::Parallel,
        start_date: None,
        generation_kwh: series,
    }
}

/// Battery with 12 kW limits (1 kWh per interval) and no discharge reserve.
pub fn battery(capacity_kwh: f64, storage_loss_percent: f64) -> Battery {
    Battery::new(capacity_kwh, 12.0, 12.0, 0.0, storage_loss_percent, ChargeCurve::default())
}

/// Loss-free inverter carrying `panels` and an optional battery.
pub fn inverter(name: &str, panels: Vec<Panel>, battery: Option<Battery>) -> Inverter {
    Inverter {
        name: name.into(),
        panels,
        battery,
        ..Inverter::perfect()
    }
}

/// Scenario with one inverter.
pub fn single_inverter_scenario(
    name: &str,
    load: &[f64],
    pv: Vec<f64>,
    battery: Option<Battery>,
) -> Scenario {
    let inv = inverter("inv", vec![panel("roof", pv)], battery);
    Scenario::new(name, vec![inv], rows(load))
}

/// Day-shaped PV: nothing at night, a plateau through the middle of the day.
pub fn daylight_pv(days: usize, midday_kwh: f64) -> Vec<f64> {
    (0..days * 288)
        .map(|t| {
            let slot = t % 288;
            if (96..216).contains(&slot) { midday_kwh } else { 0.0 }
        })
        .collect()
}

/// Flat tariff covering the whole week.
pub fn flat_plan(rate: f64) -> PricePlan {
    PricePlan {
        supplier: "Acme".into(),
        name: "Flat".into(),
        feed_rate: 0.1,
        standing_charges: 365.0,
        sign_up_bonus: 0.0,
        day_rates: vec![DayRate::every_day(0, 1440, rate)],
        active: true,
    }
}

/// Night/day tariff: cheap before 08:00.
pub fn night_day_plan() -> PricePlan {
    PricePlan {
        supplier: "Acme".into(),
        name: "NightDay".into(),
        feed_rate: 0.05,
        standing_charges: 0.0,
        sign_up_bonus: 10.0,
        day_rates: vec![DayRate::every_day(0, 480, 0.1), DayRate::every_day(480, 1440, 0.3)],
        active: true,
    }
}
