//! Minute-of-week rate lookup for a price plan.
//!
//! A plan's day rates are compiled into one 10 080-slot weekly table per
//! distinct set of seasonally valid windows. Every slot must be covered by
//! exactly one window; gaps and overlaps are rejected up front so that
//! costing never meets an ambiguous minute.

use std::collections::{BTreeSet, HashMap};

use chrono::{NaiveDate, Weekday};
use tracing::debug;

use super::plan::{ALL_DAYS, PricePlan};
use crate::error::ValidationError;
use crate::sim::types::MINUTES_PER_DAY;

pub const MINUTES_PER_WEEK: usize = 7 * MINUTES_PER_DAY as usize;

const UNSET: u16 = u16::MAX;

/// The rate in effect at one minute, with the index of the day rate that
/// supplied it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedRate {
    pub rate: f64,
    pub day_rate: usize,
}

/// Compiled lookup for one plan over a fixed set of dates.
#[derive(Debug, Clone)]
pub struct RateResolver {
    rates: Vec<f64>,
    tables: Vec<Vec<u16>>,
    by_date: HashMap<NaiveDate, usize>,
}

impl RateResolver {
    /// Compiles `plan` for every date in `dates`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::RateWindow`] for an empty or out-of-range
    /// window, [`ValidationError::RateGap`] for the first uncovered minute and
    /// [`ValidationError::RateOverlap`] for the first minute covered twice.
    pub fn new(
        plan: &PricePlan,
        dates: impl IntoIterator<Item = NaiveDate>,
    ) -> Result<Self, ValidationError> {
        let plan_id = plan.id();
        for (index, dr) in plan.day_rates.iter().enumerate() {
            if dr.start_minute >= dr.end_minute || dr.end_minute > MINUTES_PER_DAY {
                return Err(ValidationError::RateWindow {
                    plan: plan_id,
                    index,
                    start: dr.start_minute,
                    end: dr.end_minute,
                });
            }
        }

        let dates: BTreeSet<NaiveDate> = dates.into_iter().collect();
        let mut tables = Vec::new();
        let mut by_key: HashMap<Vec<usize>, usize> = HashMap::new();
        let mut by_date = HashMap::with_capacity(dates.len());

        for date in dates {
            let key: Vec<usize> = plan
                .day_rates
                .iter()
                .enumerate()
                .filter(|(_, dr)| dr.applies_on(date))
                .map(|(i, _)| i)
                .collect();
            let table = match by_key.get(&key) {
                Some(&t) => t,
                None => {
                    let slots = build_table(plan, &plan_id, &key, date)?;
                    tables.push(slots);
                    by_key.insert(key, tables.len() - 1);
                    tables.len() - 1
                }
            };
            by_date.insert(date, table);
        }

        debug!(plan = %plan_id, tables = tables.len(), dates = by_date.len(), "compiled rate tables");
        Ok(Self {
            rates: plan.day_rates.iter().map(|dr| dr.rate).collect(),
            tables,
            by_date,
        })
    }

    /// Looks up the rate for one interval. `None` when `date` was not part of
    /// the compiled range.
    pub fn resolve(
        &self,
        date: NaiveDate,
        minute_of_day: u16,
        day_of_week: Weekday,
    ) -> Option<ResolvedRate> {
        let table = self.tables.get(*self.by_date.get(&date)?)?;
        let slot = *table.get(slot_index(day_of_week, minute_of_day))?;
        let day_rate = usize::from(slot);
        Some(ResolvedRate {
            rate: *self.rates.get(day_rate)?,
            day_rate,
        })
    }

    /// Number of distinct weekly tables (one per seasonal combination).
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }
}

fn slot_index(day: Weekday, minute: u16) -> usize {
    day.num_days_from_monday() as usize * MINUTES_PER_DAY as usize + usize::from(minute)
}

fn build_table(
    plan: &PricePlan,
    plan_id: &str,
    applicable: &[usize],
    date: NaiveDate,
) -> Result<Vec<u16>, ValidationError> {
    let mut slots = vec![UNSET; MINUTES_PER_WEEK];
    for &index in applicable {
        let dr = &plan.day_rates[index];
        for &day in &dr.days {
            for minute in dr.start_minute..dr.end_minute {
                let slot = &mut slots[slot_index(day, minute)];
                if *slot != UNSET {
                    return Err(ValidationError::RateOverlap {
                        plan: plan_id.to_string(),
                        date,
                        day,
                        minute,
                        first: usize::from(*slot),
                        second: index,
                    });
                }
                *slot = index as u16;
            }
        }
    }

    if let Some(pos) = slots.iter().position(|&s| s == UNSET) {
        let per_day = MINUTES_PER_DAY as usize;
        return Err(ValidationError::RateGap {
            plan: plan_id.to_string(),
            date,
            day: ALL_DAYS[pos / per_day],
            minute: (pos % per_day) as u16,
        });
    }
    Ok(slots)
}

#[cfg(test)]
mod tests {
    use chrono::Datelike;

    use super::*;
    use crate::tariff::plan::{DayRate, Season};

    fn plan(day_rates: Vec<DayRate>) -> PricePlan {
        PricePlan {
            supplier: "Acme".into(),
            name: "Night Saver".into(),
            feed_rate: 0.2,
            standing_charges: 100.0,
            sign_up_bonus: 0.0,
            day_rates,
            active: true,
        }
    }

    fn june() -> impl Iterator<Item = NaiveDate> {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .iter_days()
            .take(30)
    }

    #[test]
    fn night_and_day_split_covers_week() {
        let p = plan(vec![
            DayRate::every_day(0, 480, 0.10),
            DayRate::every_day(480, 1440, 0.30),
        ]);
        let r = RateResolver::new(&p, june()).unwrap();
        assert_eq!(r.table_count(), 1);
        let d = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();
        let wd = d.weekday();
        assert_eq!(r.resolve(d, 0, wd).unwrap().rate, 0.10);
        assert_eq!(r.resolve(d, 475, wd).unwrap().rate, 0.10);
        assert_eq!(r.resolve(d, 480, wd).unwrap().rate, 0.30);
        assert_eq!(r.resolve(d, 1435, wd).unwrap().day_rate, 1);
    }

    #[test]
    fn every_week_minute_resolves() {
        let p = plan(vec![
            DayRate {
                days: vec![Weekday::Sat, Weekday::Sun],
                ..DayRate::every_day(0, 1440, 0.15)
            },
            DayRate {
                days: vec![
                    Weekday::Mon,
                    Weekday::Tue,
                    Weekday::Wed,
                    Weekday::Thu,
                    Weekday::Fri,
                ],
                ..DayRate::every_day(0, 1440, 0.25)
            },
        ]);
        let start = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let r = RateResolver::new(&p, start.iter_days().take(7)).unwrap();
        for date in start.iter_days().take(7) {
            let expected = if date.weekday().num_days_from_monday() >= 5 {
                0.15
            } else {
                0.25
            };
            for minute in 0..MINUTES_PER_DAY {
                let got = r.resolve(date, minute, date.weekday()).unwrap();
                assert_eq!(got.rate, expected, "{date} minute {minute}");
            }
        }
    }

    #[test]
    fn gap_is_reported_with_first_uncovered_minute() {
        let p = plan(vec![
            DayRate::every_day(0, 480, 0.10),
            DayRate::every_day(490, 1440, 0.30),
        ]);
        let err = RateResolver::new(&p, june()).unwrap_err();
        match err {
            ValidationError::RateGap { day, minute, .. } => {
                assert_eq!(day, Weekday::Mon);
                assert_eq!(minute, 480);
            }
            other => panic!("expected gap, got {other:?}"),
        }
    }

    #[test]
    fn overlap_is_reported() {
        let p = plan(vec![
            DayRate::every_day(0, 600, 0.10),
            DayRate::every_day(480, 1440, 0.30),
        ]);
        let err = RateResolver::new(&p, june()).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::RateOverlap {
                minute: 480,
                first: 0,
                second: 1,
                ..
            }
        ));
    }

    #[test]
    fn inverted_window_is_rejected() {
        let p = plan(vec![DayRate::every_day(600, 600, 0.1)]);
        assert!(matches!(
            RateResolver::new(&p, june()),
            Err(ValidationError::RateWindow { index: 0, .. })
        ));
    }

    #[test]
    fn seasonal_rates_build_separate_tables() {
        let summer = Season {
            from: "04-01".parse().unwrap(),
            to: "09-30".parse().unwrap(),
        };
        let winter = Season {
            from: "10-01".parse().unwrap(),
            to: "03-31".parse().unwrap(),
        };
        let p = plan(vec![
            DayRate {
                season: Some(summer),
                ..DayRate::every_day(0, 1440, 0.20)
            },
            DayRate {
                season: Some(winter),
                ..DayRate::every_day(0, 1440, 0.35)
            },
        ]);
        let year = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .iter_days()
            .take(365);
        let r = RateResolver::new(&p, year).unwrap();
        assert_eq!(r.table_count(), 2);

        let jan = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let jul = NaiveDate::from_ymd_opt(2025, 7, 15).unwrap();
        assert_eq!(r.resolve(jan, 720, jan.weekday()).unwrap().rate, 0.35);
        assert_eq!(r.resolve(jul, 720, jul.weekday()).unwrap().rate, 0.20);
    }

    #[test]
    fn season_hole_is_a_gap() {
        let p = plan(vec![DayRate {
            season: Some(Season {
                from: "01-01".parse().unwrap(),
                to: "06-30".parse().unwrap(),
            }),
            ..DayRate::every_day(0, 1440, 0.20)
        }]);
        let dates = NaiveDate::from_ymd_opt(2025, 6, 29)
            .unwrap()
            .iter_days()
            .take(3);
        let err = RateResolver::new(&p, dates).unwrap_err();
        assert!(matches!(err, ValidationError::RateGap { minute: 0, .. }));
    }

    #[test]
    fn date_outside_range_is_unresolved() {
        let p = plan(vec![DayRate::every_day(0, 1440, 0.2)]);
        let r = RateResolver::new(&p, june()).unwrap();
        let d = NaiveDate::from_ymd_opt(2025, 8, 1).unwrap();
        assert!(r.resolve(d, 0, d.weekday()).is_none());
    }
}
