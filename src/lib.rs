//! PV/battery scenario simulator with time-of-use tariff costing.

/// Parallel batch execution across scenarios and price plans.
pub mod batch;
pub mod cancel;
pub mod config;
pub mod error;
pub mod io;
/// Hardware and scenario definitions.
pub mod model;
pub mod pipeline;
pub mod profiles;
/// Per-interval energy-flow simulation.
pub mod sim;
pub mod store;
pub mod tariff;

pub use error::{CostingError, Error, SimulationError, ValidationError};
