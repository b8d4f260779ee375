//! Parallel batch execution across scenarios and (scenario, plan) pairs.
//!
//! Scenarios carry no shared state, so they are fanned out over a fixed pool
//! of scoped worker threads pulling indices from an atomic counter. Results
//! are put back into input order before they are reported, which keeps batch
//! output deterministic regardless of scheduling.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use tracing::{error, info, warn};

use crate::cancel::CancelToken;
use crate::error::{CostingError, SimulationError};
use crate::model::Scenario;
use crate::sim::{RunState, ScenarioOutcome, ScenarioSimulator, SkipReason};
use crate::store::ResultStore;
use crate::tariff::{CostingEngine, PricePlan};

/// Read snapshot of everything a batch works on, taken once at batch start.
///
/// Later edits to the caller's scenarios or plans are picked up by the next
/// batch, never mid-run.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub scenarios: Arc<Vec<Scenario>>,
    pub plans: Arc<Vec<PricePlan>>,
}

impl Snapshot {
    pub fn new(scenarios: Vec<Scenario>, plans: Vec<PricePlan>) -> Self {
        Self {
            scenarios: Arc::new(scenarios),
            plans: Arc::new(plans),
        }
    }
}

/// Overall batch result, as shown to a job-status consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Completed,
    CompletedWithSkips,
    Cancelled,
    Failed,
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Completed => "completed",
            Self::CompletedWithSkips => "completed with skips",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Where one scenario ended up.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioReport {
    pub scenario: String,
    pub state: RunState,
    pub skipped: Option<SkipReason>,
    pub rows: usize,
}

/// A (scenario, plan) pair that could not be costed.
#[derive(Debug, Clone, PartialEq)]
pub struct PairFailure {
    pub scenario: String,
    pub plan: String,
    pub error: CostingError,
}

/// Collected outcome of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub status: BatchStatus,
    /// One entry per snapshot scenario, in snapshot order.
    pub scenarios: Vec<ScenarioReport>,
    pub failures: Vec<SimulationError>,
    pub costed_pairs: usize,
    pub pair_failures: Vec<PairFailure>,
}

impl BatchReport {
    /// Scenarios that were skipped, with their reasons.
    pub fn skipped(&self) -> impl Iterator<Item = (&str, &SkipReason)> {
        self.scenarios
            .iter()
            .filter_map(|s| s.skipped.as_ref().map(|r| (s.scenario.as_str(), r)))
    }

    pub fn persisted(&self) -> impl Iterator<Item = &str> {
        self.scenarios
            .iter()
            .filter(|s| s.state == RunState::Persisted)
            .map(|s| s.scenario.as_str())
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} simulated, {} skipped, {} failed, {} pairs costed, {} pairs failed",
            self.status,
            self.persisted().count(),
            self.skipped().count(),
            self.failures.len(),
            self.costed_pairs,
            self.pair_failures.len()
        )
    }
}

/// Result of the costing stage on its own.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CostingReport {
    pub costed: usize,
    pub failures: Vec<PairFailure>,
    pub cancelled: bool,
}

/// Result of the simulation stage on its own.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SimulationReport {
    pub scenarios: Vec<ScenarioReport>,
    pub failures: Vec<SimulationError>,
    pub cancelled: bool,
}

/// Runs simulation and costing batches on a fixed worker pool.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    simulator: ScenarioSimulator,
    costing: CostingEngine,
    workers: usize,
}

impl Default for BatchRunner {
    fn default() -> Self {
        Self::new(ScenarioSimulator::default(), default_workers())
    }
}

impl BatchRunner {
    /// Creates a runner. A worker count of zero is treated as one.
    pub fn new(simulator: ScenarioSimulator, workers: usize) -> Self {
        Self {
            simulator,
            costing: CostingEngine,
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Simulates every scenario in the snapshot, then costs every persisted
    /// scenario against every active plan.
    ///
    /// A simulation failure stops the batch from picking up further
    /// scenarios; scenarios already persisted stay persisted and costing is
    /// not run.
    pub fn run(&self, snapshot: &Snapshot, store: &dyn ResultStore, cancel: &CancelToken) -> BatchReport {
        info!(
            scenarios = snapshot.scenarios.len(),
            plans = snapshot.plans.len(),
            workers = self.workers,
            "batch started"
        );
        let sim = self.simulate(&snapshot.scenarios, store, cancel);

        let mut costing = CostingReport::default();
        if sim.failures.is_empty() && !sim.cancelled {
            let pairs: Vec<(String, String)> = sim
                .scenarios
                .iter()
                .filter(|s| s.state == RunState::Persisted)
                .flat_map(|s| {
                    snapshot
                        .plans
                        .iter()
                        .filter(|p| p.active)
                        .map(move |p| (s.scenario.clone(), p.id()))
                })
                .collect();
            costing = self.cost(&pairs, &snapshot.plans, store, cancel);
        }

        let skipped = sim.scenarios.iter().any(|s| s.skipped.is_some());
        let status = if !sim.failures.is_empty() {
            BatchStatus::Failed
        } else if sim.cancelled || costing.cancelled {
            BatchStatus::Cancelled
        } else if skipped || !costing.failures.is_empty() {
            BatchStatus::CompletedWithSkips
        } else {
            BatchStatus::Completed
        };

        let report = BatchReport {
            status,
            scenarios: sim.scenarios,
            failures: sim.failures,
            costed_pairs: costing.costed,
            pair_failures: costing.failures,
        };
        info!(%report, "batch finished");
        report
    }

    /// Simulates `scenarios` and replaces their rows in `store`.
    pub fn simulate(
        &self,
        scenarios: &[Scenario],
        store: &dyn ResultStore,
        cancel: &CancelToken,
    ) -> SimulationReport {
        let halted = AtomicBool::new(false);
        let outcomes = parallel_map(scenarios, self.workers, |scenario| {
            if cancel.is_cancelled() || halted.load(Ordering::SeqCst) {
                return None;
            }
            let ran = match self.simulator.run(scenario, cancel) {
                Ok(ScenarioOutcome::Completed(rows)) => {
                    let count = rows.len();
                    store.replace_rows(&scenario.name, rows);
                    Ok(Ok(count))
                }
                Ok(ScenarioOutcome::Skipped(reason)) => Ok(Err(reason)),
                Err(e) => {
                    error!(scenario = %scenario.name, error = %e, "scenario failed");
                    halted.store(true, Ordering::SeqCst);
                    Err(e)
                }
            };
            Some(ran)
        });

        let mut report = SimulationReport::default();
        for (scenario, outcome) in scenarios.iter().zip(outcomes) {
            let mut entry = ScenarioReport {
                scenario: scenario.name.clone(),
                state: RunState::NotStarted,
                skipped: None,
                rows: 0,
            };
            match outcome {
                None => report.cancelled |= cancel.is_cancelled(),
                Some(Ok(Ok(rows))) => {
                    entry.state = RunState::Persisted;
                    entry.rows = rows;
                }
                Some(Ok(Err(reason))) => {
                    if reason == SkipReason::Cancelled {
                        report.cancelled = true;
                    } else {
                        warn!(scenario = %entry.scenario, %reason, "scenario skipped");
                    }
                    entry.skipped = Some(reason);
                }
                Some(Err(e)) => {
                    entry.state = RunState::Failed;
                    report.failures.push(e);
                }
            }
            report.scenarios.push(entry);
        }
        report
    }

    /// Costs each `(scenario, plan id)` pair from the rows held in `store`.
    ///
    /// Missing rows, unknown plans and invalid rate tables fail the pair
    /// only; the remaining pairs are still costed.
    pub fn cost(
        &self,
        pairs: &[(String, String)],
        plans: &[PricePlan],
        store: &dyn ResultStore,
        cancel: &CancelToken,
    ) -> CostingReport {
        let results = parallel_map(pairs, self.workers, |(scenario, plan_id)| {
            if cancel.is_cancelled() {
                return None;
            }
            let plan = plans
                .iter()
                .find(|p| &p.id() == plan_id)
                .ok_or_else(|| CostingError::MissingPlan(plan_id.clone()));
            let rows = store
                .rows(scenario)
                .ok_or_else(|| CostingError::MissingScenario(scenario.clone()));
            Some(plan.and_then(|plan| {
                let rows = rows?;
                let result = self.costing.cost(scenario, &rows, plan)?;
                store.replace_costing(result);
                Ok(())
            }))
        });

        let mut report = CostingReport::default();
        for ((scenario, plan), result) in pairs.iter().zip(results) {
            match result {
                None => report.cancelled = true,
                Some(Ok(())) => report.costed += 1,
                Some(Err(error)) => {
                    warn!(%scenario, %plan, %error, "pair not costed");
                    report.failures.push(PairFailure {
                        scenario: scenario.clone(),
                        plan: plan.clone(),
                        error,
                    });
                }
            }
        }
        report
    }
}

/// Worker count from available parallelism, falling back to one.
pub fn default_workers() -> usize {
    thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

/// Applies `f` to every item on up to `workers` scoped threads and returns
/// the results in input order.
fn parallel_map<T, R, F>(items: &[T], workers: usize, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    let next = AtomicUsize::new(0);
    let workers = workers.clamp(1, items.len().max(1));
    let mut indexed: Vec<(usize, R)> = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                scope.spawn(|| {
                    let mut local = Vec::new();
                    loop {
                        let i = next.fetch_add(1, Ordering::SeqCst);
                        let Some(item) = items.get(i) else { break };
                        local.push((i, f(item)));
                    }
                    local
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect()
    });
    indexed.sort_by_key(|(i, _)| *i);
    indexed.into_iter().map(|(_, r)| r).collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::model::{ConnectionMode, Inverter, Panel};
    use crate::sim::types::SimulationInputRow;
    use crate::store::MemoryStore;
    use crate::tariff::DayRate;

    fn rows(n: usize) -> Vec<SimulationInputRow> {
        SimulationInputRow::series(NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(), &vec![0.1; n])
    }

    fn plan(name: &str, active: bool) -> PricePlan {
        PricePlan {
            supplier: "Acme".into(),
            name: name.into(),
            feed_rate: 0.1,
            standing_charges: 0.0,
            sign_up_bonus: 0.0,
            day_rates: vec![DayRate::every_day(0, 1440, 0.3)],
            active,
        }
    }

    fn short_panel_scenario() -> Scenario {
        let inv = Inverter {
            name: "inv".into(),
            panels: vec![Panel {
                name: "roof".into(),
                mppt: 1,
                connection: ConnectionMode::Parallel,
                start_date: None,
                generation_kwh: vec![0.0; 2],
            }],
            ..Inverter::perfect()
        };
        Scenario::new("short", vec![inv], rows(10))
    }

    #[test]
    fn parallel_map_preserves_order() {
        let items: Vec<usize> = (0..100).collect();
        let out = parallel_map(&items, 4, |x| x * 2);
        assert_eq!(out, items.iter().map(|x| x * 2).collect::<Vec<_>>());
        assert!(parallel_map(&Vec::<usize>::new(), 4, |x| *x).is_empty());
    }

    #[test]
    fn batch_costs_active_plans_only() {
        let snapshot = Snapshot::new(
            vec![
                Scenario::new("a", Vec::new(), rows(12)),
                Scenario::new("b", Vec::new(), rows(12)),
            ],
            vec![plan("on", true), plan("off", false)],
        );
        let store = MemoryStore::new();
        let report = BatchRunner::new(ScenarioSimulator::default(), 2).run(&snapshot, &store, &CancelToken::new());
        assert_eq!(report.status, BatchStatus::Completed);
        assert_eq!(report.costed_pairs, 2);
        assert_eq!(store.costings().len(), 2);
        assert!(store.costing("a", "Acme/off").is_none());
    }

    #[test]
    fn skipped_scenarios_are_reported_separately() {
        let snapshot = Snapshot::new(
            vec![Scenario::new("ok", Vec::new(), rows(12)), short_panel_scenario()],
            vec![plan("on", true)],
        );
        let store = MemoryStore::new();
        let report = BatchRunner::new(ScenarioSimulator::default(), 2).run(&snapshot, &store, &CancelToken::new());
        assert_eq!(report.status, BatchStatus::CompletedWithSkips);
        let skipped: Vec<_> = report.skipped().map(|(name, _)| name).collect();
        assert_eq!(skipped, vec!["short"]);
        assert!(report.pair_failures.is_empty());
        assert!(store.rows("short").is_none());
        assert_eq!(report.costed_pairs, 1);
    }

    #[test]
    fn simulation_failure_fails_batch_and_skips_costing() {
        let mut bad = rows(3);
        bad[1].load_kwh = f64::INFINITY;
        let snapshot = Snapshot::new(
            vec![Scenario::new("bad", Vec::new(), bad)],
            vec![plan("on", true)],
        );
        let store = MemoryStore::new();
        let report = BatchRunner::new(ScenarioSimulator::default(), 1).run(&snapshot, &store, &CancelToken::new());
        assert_eq!(report.status, BatchStatus::Failed);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.scenarios[0].state, RunState::Failed);
        assert_eq!(report.costed_pairs, 0);
        assert!(store.costings().is_empty());
    }

    #[test]
    fn cancelled_before_start_writes_nothing() {
        let snapshot = Snapshot::new(vec![Scenario::new("a", Vec::new(), rows(12))], vec![plan("on", true)]);
        let store = MemoryStore::new();
        let token = CancelToken::new();
        token.cancel();
        let report = BatchRunner::default().run(&snapshot, &store, &token);
        assert_eq!(report.status, BatchStatus::Cancelled);
        assert_eq!(report.scenarios[0].state, RunState::NotStarted);
        assert!(store.rows("a").is_none());
    }

    #[test]
    fn missing_rows_and_plans_fail_pairs_only() {
        let store = MemoryStore::new();
        let runner = BatchRunner::new(ScenarioSimulator::default(), 2);
        runner.simulate(&[Scenario::new("a", Vec::new(), rows(12))], &store, &CancelToken::new());

        let pairs = vec![
            ("a".to_string(), "Acme/on".to_string()),
            ("gone".to_string(), "Acme/on".to_string()),
            ("a".to_string(), "Acme/deleted".to_string()),
        ];
        let report = runner.cost(&pairs, &[plan("on", true)], &store, &CancelToken::new());
        assert_eq!(report.costed, 1);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].error, CostingError::MissingScenario("gone".into()));
        assert_eq!(report.failures[1].error, CostingError::MissingPlan("Acme/deleted".into()));
    }
}
