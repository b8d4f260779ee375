//! Household hardware model: batteries, inverters, panels, and scenarios.

/// Battery capacity model and charge-rate curve.
pub mod battery;
/// Inverters, MPPT groups, and panels.
pub mod inverter;
pub mod scenario;

pub use battery::{Battery, ChargeCurve, ChargePoint};
pub use inverter::{ConnectionMode, Inverter, Panel};
pub use scenario::{Scenario, ScenarioFlags};
