//! Tariff definitions, rate resolution and costing.

pub mod costing;
pub mod plan;
pub mod resolver;

pub use costing::{CostingEngine, CostingResult, SubTotal, SubTotals};
pub use plan::{DayRate, MonthDay, PricePlan, Season};
pub use resolver::{RateResolver, ResolvedRate};
