//! Turns simulated flows into money for one (scenario, plan) pair.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use ordered_float::OrderedFloat;
use serde::{Serialize, Serializer};

use super::plan::PricePlan;
use super::resolver::RateResolver;
use crate::error::CostingError;
use crate::sim::types::SimulationOutputRow;

const DAYS_PER_YEAR: f64 = 365.0;

/// Energy bought at one rate and what it cost.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SubTotal {
    pub rate: f64,
    pub energy_kwh: f64,
    pub cost: f64,
}

/// Import totals bucketed by the rate that applied, in ascending rate order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubTotals(BTreeMap<OrderedFloat<f64>, SubTotal>);

impl SubTotals {
    pub fn add(&mut self, rate: f64, energy_kwh: f64) {
        let entry = self.0.entry(OrderedFloat(rate)).or_insert(SubTotal {
            rate,
            energy_kwh: 0.0,
            cost: 0.0,
        });
        entry.energy_kwh += energy_kwh;
        entry.cost += rate * energy_kwh;
    }

    pub fn get(&self, rate: f64) -> Option<&SubTotal> {
        self.0.get(&OrderedFloat(rate))
    }

    pub fn iter(&self) -> impl Iterator<Item = &SubTotal> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for SubTotals {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.values())
    }
}

/// Aggregate cost of running one scenario on one price plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostingResult {
    pub scenario: String,
    pub plan: String,
    pub buy_kwh: f64,
    pub feed_kwh: f64,
    pub buy_cost: f64,
    pub sell_income: f64,
    /// Annual standing charge pro-rated over `days`.
    pub standing_cost: f64,
    pub sign_up_bonus: f64,
    pub nett: f64,
    /// Distinct dates covered by the costed rows.
    pub days: usize,
    pub sub_totals: SubTotals,
}

impl fmt::Display for CostingResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<20} {:<28} buy {:>9.2}  sell {:>9.2}  standing {:>8.2}  nett {:>9.2}",
            self.scenario, self.plan, self.buy_cost, self.sell_income, self.standing_cost, self.nett
        )
    }
}

/// Stateless costing pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct CostingEngine;

impl CostingEngine {
    /// Costs `rows` (the complete output of one scenario run) against `plan`.
    ///
    /// The result depends only on its inputs, so repeated calls are
    /// idempotent.
    ///
    /// # Errors
    ///
    /// * [`CostingError::MissingScenario`] when `rows` is empty.
    /// * [`CostingError::Validation`] when the plan's rate windows have gaps
    ///   or overlaps on any covered date.
    pub fn cost(
        &self,
        scenario: &str,
        rows: &[SimulationOutputRow],
        plan: &PricePlan,
    ) -> Result<CostingResult, CostingError> {
        if rows.is_empty() {
            return Err(CostingError::MissingScenario(scenario.to_string()));
        }
        let dates: BTreeSet<_> = rows.iter().map(|r| r.date).collect();
        let resolver = RateResolver::new(plan, dates.iter().copied())?;

        let mut buy_kwh = 0.0;
        let mut feed_kwh = 0.0;
        let mut buy_cost = 0.0;
        let mut sell_income = 0.0;
        let mut sub_totals = SubTotals::default();

        for row in rows {
            let resolved = resolver
                .resolve(row.date, row.minute_of_day, row.day_of_week)
                .ok_or_else(|| CostingError::Unresolved {
                    plan: plan.id(),
                    date: row.date,
                    minute: row.minute_of_day,
                })?;
            buy_kwh += row.buy;
            feed_kwh += row.feed;
            buy_cost += resolved.rate * row.buy;
            sell_income += plan.feed_rate * row.feed;
            sub_totals.add(resolved.rate, row.buy);
        }

        let days = dates.len();
        let standing_cost = plan.standing_charges * days as f64 / DAYS_PER_YEAR;
        let nett = buy_cost - sell_income + standing_cost - plan.sign_up_bonus;

        Ok(CostingResult {
            scenario: scenario.to_string(),
            plan: plan.id(),
            buy_kwh,
            feed_kwh,
            buy_cost,
            sell_income,
            standing_cost,
            sign_up_bonus: plan.sign_up_bonus,
            nett,
            days,
            sub_totals,
        })
    }
}
