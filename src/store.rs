//! In-process result storage.
//!
//! Simulated rows and costing results are always written wholesale: a new
//! run for a scenario (or a new costing for a pair) replaces whatever was
//! there before. Nothing is ever patched.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::sim::types::SimulationOutputRow;
use crate::tariff::CostingResult;

/// Sink and source for simulation and costing output.
pub trait ResultStore: Send + Sync {
    /// Replaces all rows for `scenario`.
    fn replace_rows(&self, scenario: &str, rows: Vec<SimulationOutputRow>);

    /// Rows of the last completed run, if any.
    fn rows(&self, scenario: &str) -> Option<Arc<Vec<SimulationOutputRow>>>;

    /// Replaces the result for one (scenario, plan) pair.
    fn replace_costing(&self, result: CostingResult);

    fn costing(&self, scenario: &str, plan: &str) -> Option<CostingResult>;

    /// All costing results, ordered by scenario then plan.
    fn costings(&self) -> Vec<CostingResult>;
}

/// [`ResultStore`] backed by hash maps behind read/write locks.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<HashMap<String, Arc<Vec<SimulationOutputRow>>>>,
    costings: RwLock<HashMap<(String, String), CostingResult>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of scenarios with stored rows, sorted.
    pub fn scenarios(&self) -> Vec<String> {
        let mut names: Vec<String> = self.rows.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl ResultStore for MemoryStore {
    fn replace_rows(&self, scenario: &str, rows: Vec<SimulationOutputRow>) {
        self.rows.write().insert(scenario.to_string(), Arc::new(rows));
    }

    fn rows(&self, scenario: &str) -> Option<Arc<Vec<SimulationOutputRow>>> {
        self.rows.read().get(scenario).cloned()
    }

    fn replace_costing(&self, result: CostingResult) {
        let key = (result.scenario.clone(), result.plan.clone());
        self.costings.write().insert(key, result);
    }

    fn costing(&self, scenario: &str, plan: &str) -> Option<CostingResult> {
        self.costings
            .read()
            .get(&(scenario.to_string(), plan.to_string()))
            .cloned()
    }

    fn costings(&self) -> Vec<CostingResult> {
        let mut all: Vec<CostingResult> = self.costings.read().values().cloned().collect();
        all.sort_by(|a, b| (&a.scenario, &a.plan).cmp(&(&b.scenario, &b.plan)));
        all
    }
}
