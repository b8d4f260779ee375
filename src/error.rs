//! Error taxonomy for simulation, tariff validation, and costing.

use chrono::{NaiveDate, Weekday};
use thiserror::Error;

use crate::config::ConfigError;

/// Top-level error for the CLI and file-backed operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{} configuration error(s)", .0.len())]
    InvalidConfig(Vec<ConfigError>),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    #[error("{origin}: record {record}: {message}")]
    Import {
        origin: String,
        record: usize,
        message: String,
    },
}

/// Malformed user-authored data: charge curves and tariff windows.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("charge curve has no points")]
    EmptyChargeCurve,
    #[error("charge curve must start at 0% SOC, starts at {0}%")]
    ChargeCurveStart(f64),
    #[error("charge curve breakpoints must be strictly ascending ({prev}% then {next}%)")]
    ChargeCurveOrder { prev: f64, next: f64 },
    #[error("charge curve value {0} is outside 0..=100")]
    ChargeCurveRange(f64),
    #[error("battery {field} must be {expected}, got {value}")]
    BatteryParameter {
        field: &'static str,
        expected: &'static str,
        value: f64,
    },
    #[error("day rate {index} of plan \"{plan}\" has an empty or inverted window {start}..{end}")]
    RateWindow {
        plan: String,
        index: usize,
        start: u16,
        end: u16,
    },
    #[error("plan \"{plan}\" has no rate for {day} minute {minute} (in effect on {date})")]
    RateGap {
        plan: String,
        date: NaiveDate,
        day: Weekday,
        minute: u16,
    },
    #[error(
        "plan \"{plan}\" has overlapping rates {first} and {second} at {day} minute {minute} (in effect on {date})"
    )]
    RateOverlap {
        plan: String,
        date: NaiveDate,
        day: Weekday,
        minute: u16,
        first: usize,
        second: usize,
    },
}

/// Unexpected failure while iterating a scenario's rows.
///
/// These abort the scenario without writing output and fail the batch.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("scenario \"{scenario}\": non-finite {field} at row {row}")]
    NonFinite {
        scenario: String,
        field: &'static str,
        row: usize,
    },
}

/// Failure of a single (scenario, plan) costing pair.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CostingError {
    #[error("no simulated rows for scenario \"{0}\"")]
    MissingScenario(String),
    #[error("price plan \"{0}\" not found")]
    MissingPlan(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("plan \"{plan}\" has no rate for {date} minute {minute}")]
    Unresolved {
        plan: String,
        date: NaiveDate,
        minute: u16,
    },
}
