//! Scenario simulator: folds power-flow decisions over a scenario's rows.

use std::fmt;

use chrono::NaiveDateTime;
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::error::{SimulationError, ValidationError};
use crate::model::{Battery, Inverter, Scenario};

use super::dst::DstCorrection;
use super::power_flow::{FlowInput, allocate};
use super::pv::{MissingPanelData, check_coverage, inverter_pv};
use super::types::{ROWS_PER_DAY, SimulationInputRow, SimulationOutputRow, kw_to_interval_kwh};

/// Lifecycle of one scenario run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    PvAggregation,
    RowIteration,
    Persisted,
    Failed,
}

/// Why a scenario produced no output without failing the batch.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    MissingPanelData(MissingPanelData),
    /// A battery's parameters or charge curve are malformed.
    InvalidHardware {
        inverter: String,
        error: ValidationError,
    },
    NoRows,
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingPanelData(m) => write!(
                f,
                "panel \"{}\" on inverter \"{}\" has {} of {} rows",
                m.panel, m.inverter, m.available, m.required
            ),
            Self::InvalidHardware { inverter, error } => write!(f, "inverter \"{inverter}\": {error}"),
            Self::NoRows => write!(f, "no load rows"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Result of a scenario run that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum ScenarioOutcome {
    Completed(Vec<SimulationOutputRow>),
    Skipped(SkipReason),
}

/// One inverter's share of the simulation, fixed for the whole run.
struct Pair {
    battery: Option<Battery>,
    pv: Vec<f64>,
    max_output: f64,
    min_excess: f64,
}

/// Scenario-local mutable state carried from row to row.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    /// SOC per inverter/battery pair (kWh); zero for pairs without a battery.
    pub socs: Vec<f64>,
}

impl SimulationState {
    fn initial(pairs: &[Pair]) -> Self {
        Self {
            socs: pairs
                .iter()
                .map(|p| p.battery.as_ref().map_or(0.0, Battery::discharge_reserve))
                .collect(),
        }
    }

    /// Aggregate SOC across all batteries.
    pub fn total_soc(&self) -> f64 {
        self.socs.iter().sum()
    }

    /// Advances one interval: a single shared grid decision over summed
    /// capacities, apportioned back to each pair by its available capacity.
    ///
    /// The curtailment threshold is the largest of the inverters' thresholds.
    fn step(&mut self, pairs: &[Pair], t: usize, row: &SimulationInputRow) -> SimulationOutputRow {
        let mut input = FlowInput {
            load: row.load_kwh,
            ..FlowInput::default()
        };
        let mut discharge = Vec::with_capacity(pairs.len());
        let mut charge = Vec::with_capacity(pairs.len());
        for (pair, &soc) in pairs.iter().zip(&self.socs) {
            let (d, c) = pair
                .battery
                .as_ref()
                .map_or((0.0, 0.0), |b| (b.deliverable_discharge(soc), b.charge_capacity(soc)));
            discharge.push(d);
            charge.push(c);
            input.pv += pair.pv[t];
            input.discharge_capacity += d;
            input.charge_capacity += c;
            input.max_output += pair.max_output;
            input.min_excess = input.min_excess.max(pair.min_excess);
        }

        let out = allocate(&input);

        for (k, pair) in pairs.iter().enumerate() {
            if let Some(battery) = &pair.battery {
                let delivered = share(out.battery_to_load, discharge[k], input.discharge_capacity);
                let charged = share(out.pv_to_charge, charge[k], input.charge_capacity);
                self.socs[k] = battery.next_soc(self.socs[k], delivered, charged);
            }
        }

        SimulationOutputRow {
            date: row.date,
            minute_of_day: row.minute_of_day,
            day_of_week: row.day_of_week,
            load: row.load_kwh,
            pv: input.pv,
            buy: out.buy,
            feed: out.feed,
            soc: self.total_soc(),
            pv_to_load: out.pv_to_load,
            pv_to_charge: out.pv_to_charge,
            battery_to_load: out.battery_to_load,
        }
    }
}

/// Pro-rata share of `amount` for a part `part` of `whole`.
fn share(amount: f64, part: f64, whole: f64) -> f64 {
    if whole > 0.0 { amount * part / whole } else { 0.0 }
}

/// Runs scenarios to completion, one row at a time.
///
/// The simulator itself is stateless between runs; every run builds its own
/// [`SimulationState`], so a single instance can serve many worker threads.
#[derive(Debug, Clone, Default)]
pub struct ScenarioSimulator {
    timezone: Option<Tz>,
}

impl ScenarioSimulator {
    /// Creates a simulator. With a time zone, PV is realigned across DST transitions.
    pub fn new(timezone: Option<Tz>) -> Self {
        Self { timezone }
    }

    /// Simulates one scenario.
    ///
    /// Cancellation is checked at each day boundary; a cancelled run returns
    /// [`SkipReason::Cancelled`] and no rows.
    ///
    /// # Errors
    ///
    /// Returns a [`SimulationError`] for non-finite inputs. Incomplete panel
    /// data and malformed batteries skip the scenario instead.
    pub fn run(&self, scenario: &Scenario, cancel: &CancelToken) -> Result<ScenarioOutcome, SimulationError> {
        let name = scenario.name.as_str();
        let rows = &scenario.rows;
        let mut state = RunState::NotStarted;
        debug!(scenario = name, ?state, rows = rows.len(), "scenario run requested");

        if rows.is_empty() {
            warn!(scenario = name, "skipping scenario without rows");
            return Ok(ScenarioOutcome::Skipped(SkipReason::NoRows));
        }
        let inverters = scenario.effective_inverters();
        let first = rows[0].local_time();
        if let Err(missing) = check_coverage(&inverters, first, rows.len()) {
            let reason = SkipReason::MissingPanelData(missing);
            warn!(scenario = name, %reason, "skipping scenario with incomplete panel data");
            return Ok(ScenarioOutcome::Skipped(reason));
        }
        if let Some(reason) = invalid_hardware(&inverters) {
            warn!(scenario = name, %reason, "skipping scenario with invalid hardware");
            return Ok(ScenarioOutcome::Skipped(reason));
        }

        state = RunState::PvAggregation;
        debug!(scenario = name, ?state);
        let pairs = self.build_pairs(scenario, &inverters, first);

        state = RunState::RowIteration;
        debug!(scenario = name, ?state);
        let mut sim = SimulationState::initial(&pairs);
        let mut output = Vec::with_capacity(rows.len());
        for (t, row) in rows.iter().enumerate() {
            if t % ROWS_PER_DAY == 0 && cancel.is_cancelled() {
                info!(scenario = name, row = t, "scenario run cancelled, discarding output");
                return Ok(ScenarioOutcome::Skipped(SkipReason::Cancelled));
            }
            if !row.load_kwh.is_finite() {
                return Err(non_finite(name, "load", t));
            }
            let out = sim.step(&pairs, t, row);
            if !out.pv.is_finite() {
                return Err(non_finite(name, "pv", t));
            }
            output.push(out);
        }

        info!(
            scenario = name,
            rows = output.len(),
            final_soc = sim.total_soc(),
            "scenario simulated"
        );
        Ok(ScenarioOutcome::Completed(output))
    }

    fn build_pairs(&self, scenario: &Scenario, inverters: &[Inverter], first: NaiveDateTime) -> Vec<Pair> {
        let rows = scenario.rows.len();
        let dst = match self.timezone {
            Some(tz) => DstCorrection::detect(&scenario.rows, tz),
            None => DstCorrection::disabled(rows),
        };
        if let Some(gap) = dst.gap() {
            debug!(scenario = %scenario.name, gap_start = gap.start, gap_end = gap.end, "DST gap detected");
        }

        inverters
            .iter()
            .map(|inv| Pair {
                battery: inv.battery.clone(),
                pv: dst.apply(&inverter_pv(inv, first, rows)),
                max_output: kw_to_interval_kwh(inv.max_output_kw),
                min_excess: kw_to_interval_kwh(inv.min_excess_kw),
            })
            .collect()
    }
}

/// First inverter whose battery fails validation.
fn invalid_hardware(inverters: &[Inverter]) -> Option<SkipReason> {
    inverters.iter().find_map(|inv| {
        let battery = inv.battery.as_ref()?;
        battery.validate().err().map(|error| SkipReason::InvalidHardware {
            inverter: inv.name.clone(),
            error,
        })
    })
}

fn non_finite(scenario: &str, field: &'static str, row: usize) -> SimulationError {
    SimulationError::NonFinite {
        scenario: scenario.to_string(),
        field,
        row,
    }
}
