//! Study runner entry point: CLI wiring, logging setup and result output.

use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pv_tariff_sim::batch::{BatchRunner, BatchStatus, default_workers};
use pv_tariff_sim::cancel::CancelToken;
use pv_tariff_sim::config::StudyConfig;
use pv_tariff_sim::io::export::{export_costs_csv, export_rows_csv, write_costs_json};
use pv_tariff_sim::pipeline::Pipeline;
use pv_tariff_sim::sim::ScenarioSimulator;
use pv_tariff_sim::sim::kpi::EnergySummary;
use pv_tariff_sim::store::{MemoryStore, ResultStore};

/// Simulate PV/battery scenarios over a year and cost them against price plans.
#[derive(Debug, Parser)]
#[command(name = "pv-tariff-sim", version, about)]
struct Cli {
    /// Study configuration (TOML)
    #[arg(long, conflicts_with = "preset")]
    config: Option<PathBuf>,

    /// Built-in study preset (baseline, high_solar, multi_inverter)
    #[arg(long)]
    preset: Option<String>,

    /// Override the random seed for synthetic series
    #[arg(long)]
    seed: Option<u64>,

    /// Override the number of simulated days
    #[arg(long)]
    days: Option<u32>,

    /// Worker threads (0 = available parallelism)
    #[arg(long, env = "PV_TARIFF_SIM_WORKERS")]
    workers: Option<usize>,

    /// Export simulated rows to CSV
    #[arg(long)]
    rows_out: Option<PathBuf>,

    /// Export costing results to CSV
    #[arg(long)]
    costs_out: Option<PathBuf>,

    /// Print costing results as JSON instead of a table
    #[arg(long)]
    json: bool,
}

fn load_study(cli: &Cli) -> StudyConfig {
    let loaded = match (&cli.config, &cli.preset) {
        (Some(path), _) => StudyConfig::from_toml_file(path),
        (None, Some(name)) => StudyConfig::from_preset(name),
        (None, None) => Ok(StudyConfig::baseline()),
    };
    let mut study = loaded.unwrap_or_else(|e| {
        eprintln!("{e}");
        process::exit(1);
    });

    if let Some(seed) = cli.seed {
        study.simulation.seed = seed;
    }
    if let Some(days) = cli.days {
        study.simulation.days = days;
    }
    if let Some(workers) = cli.workers {
        study.simulation.workers = workers;
    }
    study
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    let study = load_study(&cli);

    let errors = study.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    let timezone = study.timezone().unwrap_or_else(|e| {
        eprintln!("{e}");
        process::exit(1);
    });
    let workers = match study.simulation.workers {
        0 => default_workers(),
        n => n,
    };
    let runner = BatchRunner::new(ScenarioSimulator::new(timezone), workers);
    let scenario_names: Vec<String> = study.scenarios.iter().map(|s| s.name.clone()).collect();
    let capacities: Vec<f64> = study
        .scenarios
        .iter()
        .map(|s| {
            s.inverters
                .iter()
                .filter_map(|i| i.battery.as_ref())
                .map(|b| b.capacity_kwh)
                .sum()
        })
        .collect();

    let pipeline = Pipeline::new(study, runner, MemoryStore::new());
    pipeline.submit("cli");
    let report = match pipeline.run_pending(&CancelToken::new()) {
        Some(Ok(report)) => report,
        Some(Err(e)) => {
            error!(error = %e, "study failed");
            process::exit(1);
        }
        None => {
            eprintln!("error: no run was started");
            process::exit(1);
        }
    };
    let store = pipeline.store();

    for (name, capacity) in scenario_names.iter().zip(&capacities) {
        if let Some(rows) = store.rows(name) {
            println!("== {name} ==");
            println!("{}\n", EnergySummary::from_rows(&rows, *capacity));
        }
    }

    let costings = store.costings();
    if cli.json {
        if let Err(e) = write_costs_json(&costings, BufWriter::new(io::stdout())) {
            eprintln!("error: failed to write JSON: {e}");
            process::exit(1);
        }
        println!();
    } else {
        for c in &costings {
            println!("{c}");
        }
    }

    if let Some(path) = &cli.rows_out {
        let stored: Vec<_> = scenario_names
            .iter()
            .filter_map(|name| store.rows(name).map(|rows| (name.as_str(), rows)))
            .collect();
        let blocks = stored.iter().map(|(name, rows)| (*name, rows.as_slice()));
        if let Err(e) = export_rows_csv(blocks, path) {
            eprintln!("error: failed to write CSV: {e}");
            process::exit(1);
        }
        info!(path = %path.display(), "rows written");
    }
    if let Some(path) = &cli.costs_out {
        if let Err(e) = export_costs_csv(&costings, path) {
            eprintln!("error: failed to write CSV: {e}");
            process::exit(1);
        }
        info!(path = %path.display(), "costs written");
    }

    eprintln!("{report}");
    if report.status == BatchStatus::Failed {
        process::exit(2);
    }
}
