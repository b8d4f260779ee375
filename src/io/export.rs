//! CSV and JSON export for simulated rows and costing results.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::sim::types::SimulationOutputRow;
use crate::tariff::CostingResult;

/// Column header for simulated row export.
const ROWS_HEADER: &str = "scenario,date,minute,weekday,load_kwh,pv_kwh,buy_kwh,feed_kwh,\
                           soc_kwh,pv_to_load_kwh,pv_to_charge_kwh,battery_to_load_kwh";

/// Column header for costing export.
const COSTS_HEADER: &str = "scenario,plan,days,buy_kwh,feed_kwh,buy_cost,sell_income,\
                            standing_cost,sign_up_bonus,nett";

/// Exports the rows of several scenarios to a CSV file.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_rows_csv<'a>(
    scenarios: impl IntoIterator<Item = (&'a str, &'a [SimulationOutputRow])>,
    path: &Path,
) -> io::Result<()> {
    let file = File::create(path)?;
    write_rows_csv(scenarios, io::BufWriter::new(file))
}

/// Writes simulated rows as CSV to any writer, one block per scenario.
///
/// Output is deterministic for identical inputs.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_rows_csv<'a>(
    scenarios: impl IntoIterator<Item = (&'a str, &'a [SimulationOutputRow])>,
    writer: impl Write,
) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(ROWS_HEADER.split(',').map(str::trim))?;

    for (scenario, rows) in scenarios {
        for r in rows {
            wtr.write_record(&[
                scenario.to_string(),
                r.date.to_string(),
                r.minute_of_day.to_string(),
                r.day_of_week.to_string(),
                format!("{:.4}", r.load),
                format!("{:.4}", r.pv),
                format!("{:.4}", r.buy),
                format!("{:.4}", r.feed),
                format!("{:.4}", r.soc),
                format!("{:.4}", r.pv_to_load),
                format!("{:.4}", r.pv_to_charge),
                format!("{:.4}", r.battery_to_load),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}

/// Exports costing results to a CSV file.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_costs_csv(results: &[CostingResult], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_costs_csv(results, io::BufWriter::new(file))
}

/// Writes costing results as CSV, one row per (scenario, plan) pair.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_costs_csv(results: &[CostingResult], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(COSTS_HEADER.split(',').map(str::trim))?;

    for c in results {
        wtr.write_record(&[
            c.scenario.clone(),
            c.plan.clone(),
            c.days.to_string(),
            format!("{:.3}", c.buy_kwh),
            format!("{:.3}", c.feed_kwh),
            format!("{:.2}", c.buy_cost),
            format!("{:.2}", c.sell_income),
            format!("{:.2}", c.standing_cost),
            format!("{:.2}", c.sign_up_bonus),
            format!("{:.2}", c.nett),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Writes costing results, including rate sub-totals, as pretty JSON.
///
/// # Errors
///
/// Returns a `serde_json::Error` if serialization or writing fails.
pub fn write_costs_json(results: &[CostingResult], writer: impl Write) -> serde_json::Result<()> {
    serde_json::to_writer_pretty(writer, results)
}
