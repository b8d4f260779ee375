//! Per-interval allocation of load and PV surplus between PV, battery and grid.

/// Fraction of exported energy that survives inverter and feed losses.
pub const FEED_LOSS_FACTOR: f64 = 0.95;

/// Inputs to one power-flow decision. All values are kWh within the interval.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FlowInput {
    pub load: f64,
    /// Loss-adjusted PV across all inverters.
    pub pv: f64,
    /// Energy the batteries can deliver to the load.
    pub discharge_capacity: f64,
    /// Energy the batteries can absorb.
    pub charge_capacity: f64,
    /// Inverter export ceiling.
    pub max_output: f64,
    /// Surplus at or below which nothing is charged or fed.
    pub min_excess: f64,
}

/// Outcome of one power-flow decision. All fields are non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FlowOutcome {
    pub buy: f64,
    pub feed: f64,
    pub pv_to_load: f64,
    pub pv_to_charge: f64,
    pub battery_to_load: f64,
}

/// Allocates one interval's energy.
///
/// Branches are evaluated in order and the first match wins:
///
/// 1. Load exceeds PV plus battery: the battery empties its available energy
///    and the grid covers the rest.
/// 2. Load exceeds PV: the battery covers the shortfall.
/// 3. Otherwise PV covers the load and any surplus above `min_excess` charges
///    the battery first, then feeds the grid up to the inverter ceiling with
///    [`FEED_LOSS_FACTOR`] applied. A smaller surplus is curtailed.
///
/// # Examples
///
/// ```
/// use pv_tariff_sim::sim::power_flow::{FlowInput, allocate};
///
/// let out = allocate(&FlowInput { load: 1.0, pv: 0.25, discharge_capacity: 0.5, ..Default::default() });
/// assert_eq!(out.buy, 0.25);
/// assert_eq!(out.battery_to_load, 0.5);
/// ```
pub fn allocate(input: &FlowInput) -> FlowOutcome {
    let FlowInput {
        load,
        pv,
        discharge_capacity,
        charge_capacity,
        max_output,
        min_excess,
    } = *input;

    if load > pv + discharge_capacity {
        FlowOutcome {
            buy: load - pv - discharge_capacity,
            pv_to_load: pv,
            battery_to_load: discharge_capacity,
            ..FlowOutcome::default()
        }
    } else if load > pv {
        FlowOutcome {
            pv_to_load: pv,
            battery_to_load: load - pv,
            ..FlowOutcome::default()
        }
    } else {
        let surplus = pv - load;
        if surplus > min_excess {
            let pv_to_charge = surplus.min(charge_capacity).max(0.0);
            let remaining = surplus - pv_to_charge;
            let feed = remaining.min(max_output - pv_to_charge).max(0.0) * FEED_LOSS_FACTOR;
            FlowOutcome {
                feed,
                pv_to_load: load,
                pv_to_charge,
                ..FlowOutcome::default()
            }
        } else {
            FlowOutcome {
                pv_to_load: load,
                ..FlowOutcome::default()
            }
        }
    }
}
