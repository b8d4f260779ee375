//! End-to-end batches: simulate, store, cost, and the run pipeline around them.

mod common;

use approx::assert_relative_eq;
use pv_tariff_sim::batch::{BatchRunner, BatchStatus, Snapshot};
use pv_tariff_sim::cancel::CancelToken;
use pv_tariff_sim::config::StudyConfig;
use pv_tariff_sim::error::{CostingError, Error};
use pv_tariff_sim::model::Scenario;
use pv_tariff_sim::pipeline::{Pipeline, ScenarioSource};
use pv_tariff_sim::sim::{ScenarioSimulator, SkipReason};
use pv_tariff_sim::store::{MemoryStore, ResultStore};
use pv_tariff_sim::tariff::{CostingEngine, DayRate};

fn runner() -> BatchRunner {
    BatchRunner::new(ScenarioSimulator::default(), 3)
}

fn snapshot() -> Snapshot {
    let load = vec![0.1; 288];
    Snapshot::new(
        vec![
            Scenario::new("grid_only", Vec::new(), common::rows(&load)),
            common::single_inverter_scenario("pv_only", &load, common::daylight_pv(1, 0.3), None),
        ],
        vec![common::flat_plan(0.3), common::night_day_plan()],
    )
}

#[test]
fn night_day_costing_of_grid_only_day() {
    let store = MemoryStore::new();
    let report = runner().run(&snapshot(), &store, &CancelToken::new());
    assert_eq!(report.status, BatchStatus::Completed);
    assert_eq!(report.costed_pairs, 4);

    let c = store.costing("grid_only", "Acme/NightDay").unwrap();
    // 96 night intervals at 0.1, 192 day intervals at 0.3.
    assert_relative_eq!(c.buy_cost, 96.0 * 0.1 * 0.1 + 192.0 * 0.1 * 0.3, epsilon = 1e-9);
    assert_relative_eq!(c.nett, c.buy_cost - 10.0, epsilon = 1e-9);
    assert_eq!(c.days, 1);
    assert_eq!(c.sub_totals.len(), 2);
    assert_relative_eq!(c.sub_totals.get(0.1).unwrap().energy_kwh, 9.6, epsilon = 1e-9);
}

#[test]
fn standing_charge_is_prorated_and_pv_cuts_cost() {
    let store = MemoryStore::new();
    runner().run(&snapshot(), &store, &CancelToken::new());

    let grid = store.costing("grid_only", "Acme/Flat").unwrap();
    let pv = store.costing("pv_only", "Acme/Flat").unwrap();
    assert_relative_eq!(grid.standing_cost, 1.0, epsilon = 1e-9);
    assert_eq!(grid.sell_income, 0.0);
    assert!(pv.buy_cost < grid.buy_cost);
    assert!(pv.sell_income > 0.0);
    assert!(pv.nett < grid.nett);
    assert_relative_eq!(pv.sell_income, pv.feed_kwh * 0.1, epsilon = 1e-9);
}

#[test]
fn rerunning_replaces_results_with_identical_values() {
    let store = MemoryStore::new();
    runner().run(&snapshot(), &store, &CancelToken::new());
    let first = store.costings();
    runner().run(&snapshot(), &store, &CancelToken::new());
    assert_eq!(store.costings(), first);

    let rows = store.rows("pv_only").unwrap();
    let plan = common::night_day_plan();
    let a = CostingEngine.cost("pv_only", &rows, &plan).unwrap();
    assert_eq!(a, CostingEngine.cost("pv_only", &rows, &plan).unwrap());
}

#[test]
fn plan_with_gap_fails_its_pairs_only() {
    let mut broken = common::flat_plan(0.3);
    broken.name = "Broken".into();
    broken.day_rates = vec![DayRate::every_day(0, 600, 0.2)];
    let mut snap = snapshot();
    snap.plans = std::sync::Arc::new(vec![common::flat_plan(0.3), broken]);

    let store = MemoryStore::new();
    let report = runner().run(&snap, &store, &CancelToken::new());
    assert_eq!(report.status, BatchStatus::CompletedWithSkips);
    assert_eq!(report.costed_pairs, 2);
    assert_eq!(report.pair_failures.len(), 2);
    assert!(
        report
            .pair_failures
            .iter()
            .all(|f| f.plan == "Acme/Broken" && matches!(f.error, CostingError::Validation(_)))
    );
}

#[test]
fn cancelled_batch_persists_nothing() {
    let token = CancelToken::new();
    token.cancel();
    let store = MemoryStore::new();
    let report = runner().run(&snapshot(), &store, &token);
    assert_eq!(report.status, BatchStatus::Cancelled);
    assert!(store.scenarios().is_empty());
    assert!(store.costings().is_empty());
}

#[test]
fn preset_study_runs_through_pipeline() {
    let mut study = StudyConfig::baseline();
    study.simulation.days = 2;
    let timezone = study.timezone().unwrap();
    let pipeline = Pipeline::new(
        study,
        BatchRunner::new(ScenarioSimulator::new(timezone), 2),
        MemoryStore::new(),
    );

    pipeline.submit("test");
    let report = pipeline.run_pending(&CancelToken::new()).unwrap().unwrap();
    assert_eq!(report.status, BatchStatus::Completed);
    assert_eq!(report.persisted().count(), 3);
    assert_eq!(pipeline.store().rows("pv_battery").unwrap().len(), 2 * 288);
    assert_eq!(report.costed_pairs, 3 * 2);
    assert!(pipeline.run_pending(&CancelToken::new()).is_none());
}

#[test]
fn invalid_study_stops_before_simulation() {
    let mut study = StudyConfig::baseline();
    study.scenarios[0].name.clear();
    let pipeline = Pipeline::new(study, runner(), MemoryStore::new());

    pipeline.submit("test");
    let result = pipeline.run_pending(&CancelToken::new()).unwrap();
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
    assert!(pipeline.store().scenarios().is_empty());
}

#[test]
fn bundled_study_file_is_valid() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("studies/weekday_peak.toml");
    let mut study = StudyConfig::from_toml_file(&path).unwrap();
    assert!(study.validate().is_empty(), "{:?}", study.validate());

    study.simulation.days = 3;
    let store = MemoryStore::new();
    let snapshot = study.normalize().unwrap();
    let report = runner().run(&snapshot, &store, &CancelToken::new());
    assert_eq!(report.status, BatchStatus::Completed);
    assert_eq!(store.costings().len(), 4);
    assert_eq!(store.costing("south_roof_battery", "Brightwave/Weekday Peak").unwrap().days, 3);
}

#[test]
fn malformed_battery_skips_only_its_scenario() {
    let load = vec![0.1; 288];
    let mut bad = common::battery(5.0, 0.0);
    bad.max_charge_kw = -1.0;
    let snap = Snapshot::new(
        vec![
            Scenario::new("grid_only", Vec::new(), common::rows(&load)),
            common::single_inverter_scenario("bad_battery", &load, common::daylight_pv(1, 0.3), Some(bad)),
        ],
        vec![common::flat_plan(0.3)],
    );

    let store = MemoryStore::new();
    let report = runner().run(&snap, &store, &CancelToken::new());
    assert_eq!(report.status, BatchStatus::CompletedWithSkips);
    assert!(report.failures.is_empty());
    assert_eq!(report.costed_pairs, 1);
    assert!(store.costing("grid_only", "Acme/Flat").is_some());
    let skipped: Vec<_> = report.skipped().collect();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].0, "bad_battery");
    assert!(matches!(skipped[0].1, SkipReason::InvalidHardware { .. }));
}

fn write_series(path: &std::path::Path, column: &str, date: &str, value: f64) {
    let mut csv = format!("date,minute,{column}\n");
    for minute in (0..1440).step_by(5) {
        csv.push_str(&format!("{date},{minute},{value}\n"));
    }
    std::fs::write(path, csv).unwrap();
}

#[test]
fn pv_file_for_other_dates_skips_scenario() {
    let dir = tempfile::tempdir().unwrap();
    write_series(&dir.path().join("load.csv"), "load_kwh", "2025-01-06", 0.1);
    write_series(&dir.path().join("pv_july.csv"), "pv_kwh", "2025-07-01", 0.4);
    write_series(&dir.path().join("pv_january.csv"), "pv_kwh", "2025-01-06", 0.05);

    let study_path = dir.path().join("study.toml");
    std::fs::write(
        &study_path,
        r#"
[simulation]
start = "2025-01-06"
days = 1

[[scenarios]]
name = "july_panels"
[scenarios.load]
csv = "load.csv"
[[scenarios.inverters]]
name = "inv"
[[scenarios.inverters.panels]]
name = "roof"
csv = "pv_july.csv"

[[scenarios]]
name = "january_panels"
[scenarios.load]
csv = "load.csv"
[[scenarios.inverters]]
name = "inv"
[[scenarios.inverters.panels]]
name = "roof"
csv = "pv_january.csv"

[[price_plans]]
supplier = "Acme"
name = "Flat"
[[price_plans.day_rates]]
rate = 0.3
"#,
    )
    .unwrap();

    let study = StudyConfig::from_toml_file(&study_path).unwrap();
    let store = MemoryStore::new();
    let report = runner().run(&study.normalize().unwrap(), &store, &CancelToken::new());

    assert_eq!(report.status, BatchStatus::CompletedWithSkips);
    let skipped: Vec<_> = report.skipped().collect();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].0, "july_panels");
    assert!(matches!(skipped[0].1, SkipReason::MissingPanelData(_)));
    assert!(store.rows("july_panels").is_none());

    let rows = store.rows("january_panels").unwrap();
    assert_eq!(rows.len(), 288);
    assert!(rows.iter().all(|r| r.pv > 0.0 && r.pv <= 0.05));
}
