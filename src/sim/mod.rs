/// Daylight-saving realignment of PV series.
pub mod dst;
pub mod engine;
pub mod kpi;
pub mod power_flow;
/// PV aggregation across panels and MPPT groups.
pub mod pv;
pub mod types;

pub use engine::{RunState, ScenarioOutcome, ScenarioSimulator, SkipReason};
pub use types::{SimulationInputRow, SimulationOutputRow};
