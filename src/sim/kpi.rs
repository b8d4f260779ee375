//! Post-hoc energy summary computed from simulated rows.

use std::fmt;

use super::types::SimulationOutputRow;

/// Aggregate energy figures for one scenario run.
///
/// Computed post-hoc from the output rows so the report can never disagree
/// with the rows the costing engine sees.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnergySummary {
    /// Total household demand (kWh).
    pub load_kwh: f64,
    /// Total loss-adjusted PV (kWh).
    pub pv_kwh: f64,
    /// Total grid import (kWh).
    pub buy_kwh: f64,
    /// Total grid export after feed loss (kWh).
    pub feed_kwh: f64,
    /// PV consumed directly by the load (kWh).
    pub pv_to_load_kwh: f64,
    /// PV stored in batteries (kWh).
    pub pv_to_charge_kwh: f64,
    /// Battery energy delivered to the load (kWh).
    pub battery_to_load_kwh: f64,
    /// PV neither used, stored nor exported, before feed loss (kWh).
    pub curtailed_kwh: f64,
    /// Share of demand not bought from the grid (%).
    pub self_sufficiency_pct: f64,
    /// Battery equivalent full cycles (charged energy / total capacity).
    pub battery_equivalent_full_cycles: f64,
    /// Peak single-interval import (kWh).
    pub peak_buy_kwh: f64,
}

impl EnergySummary {
    /// Computes the summary from a complete row set.
    ///
    /// `battery_capacity_kwh` is the total capacity across all batteries; pass
    /// zero for scenarios without storage.
    pub fn from_rows(rows: &[SimulationOutputRow], battery_capacity_kwh: f64) -> Self {
        let mut s = Self::default();
        for r in rows {
            s.load_kwh += r.load;
            s.pv_kwh += r.pv;
            s.buy_kwh += r.buy;
            s.feed_kwh += r.feed;
            s.pv_to_load_kwh += r.pv_to_load;
            s.pv_to_charge_kwh += r.pv_to_charge;
            s.battery_to_load_kwh += r.battery_to_load;
            s.peak_buy_kwh = s.peak_buy_kwh.max(r.buy);
        }

        let exported_dc = s.feed_kwh / super::power_flow::FEED_LOSS_FACTOR;
        s.curtailed_kwh = (s.pv_kwh - s.pv_to_load_kwh - s.pv_to_charge_kwh - exported_dc).max(0.0);
        s.self_sufficiency_pct = if s.load_kwh > 0.0 {
            100.0 * (1.0 - s.buy_kwh / s.load_kwh)
        } else {
            0.0
        };
        s.battery_equivalent_full_cycles = if battery_capacity_kwh > 0.0 {
            s.pv_to_charge_kwh / battery_capacity_kwh
        } else {
            0.0
        };
        s
    }
}

impl fmt::Display for EnergySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Load:              {:>10.1} kWh", self.load_kwh)?;
        writeln!(f, "PV:                {:>10.1} kWh", self.pv_kwh)?;
        writeln!(f, "Bought:            {:>10.1} kWh", self.buy_kwh)?;
        writeln!(f, "Fed:               {:>10.1} kWh", self.feed_kwh)?;
        writeln!(f, "PV to load:        {:>10.1} kWh", self.pv_to_load_kwh)?;
        writeln!(f, "PV to battery:     {:>10.1} kWh", self.pv_to_charge_kwh)?;
        writeln!(f, "Battery to load:   {:>10.1} kWh", self.battery_to_load_kwh)?;
        writeln!(f, "Curtailed:         {:>10.1} kWh", self.curtailed_kwh)?;
        writeln!(f, "Self-sufficiency:  {:>10.1}%", self.self_sufficiency_pct)?;
        write!(
            f,
            "Battery cycles:    {:>10.1} (peak import {:.3} kWh/interval)",
            self.battery_equivalent_full_cycles, self.peak_buy_kwh
        )
    }
}
