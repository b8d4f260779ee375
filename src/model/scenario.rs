use crate::sim::types::SimulationInputRow;

use super::inverter::Inverter;

/// Optional subsystems a scenario declares.
///
/// EV charging and hot-water diversion are carried for reporting but are not
/// simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScenarioFlags {
    pub has_panels: bool,
    pub has_batteries: bool,
    pub has_ev_charging: bool,
    pub has_hot_water: bool,
}

/// The unit of simulation: hardware plus one year of load.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub name: String,
    /// Inverters; empty means a perfect pseudo-inverter is substituted.
    pub inverters: Vec<Inverter>,
    /// Prepared load rows in chronological order.
    pub rows: Vec<SimulationInputRow>,
    pub flags: ScenarioFlags,
}

impl Scenario {
    /// Creates a scenario, deriving the panel and battery flags from the hardware.
    pub fn new(name: impl Into<String>, inverters: Vec<Inverter>, rows: Vec<SimulationInputRow>) -> Self {
        let flags = ScenarioFlags {
            has_panels: inverters.iter().any(|i| !i.panels.is_empty()),
            has_batteries: inverters.iter().any(|i| i.battery.is_some()),
            ..ScenarioFlags::default()
        };
        Self {
            name: name.into(),
            inverters,
            rows,
            flags,
        }
    }

    /// Inverters to simulate, substituting the perfect inverter when none are declared.
    pub fn effective_inverters(&self) -> Vec<Inverter> {
        if self.inverters.is_empty() {
            vec![Inverter::perfect()]
        } else {
            self.inverters.clone()
        }
    }

    /// Total battery capacity across all inverters (kWh).
    pub fn total_battery_capacity(&self) -> f64 {
        self.inverters
            .iter()
            .filter_map(|i| i.battery.as_ref())
            .map(|b| b.capacity_kwh)
            .sum()
    }
}
