use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Weekday};

/// A calendar day without a year, written `MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthDay {
    pub month: u32,
    pub day: u32,
}

impl MonthDay {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            month: date.month(),
            day: date.day(),
        }
    }
}

impl FromStr for MonthDay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (m, d) = s
            .split_once('-')
            .ok_or_else(|| format!("expected MM-DD, got \"{s}\""))?;
        let month: u32 = m.parse().map_err(|_| format!("bad month in \"{s}\""))?;
        let day: u32 = d.parse().map_err(|_| format!("bad day in \"{s}\""))?;
        // 2024 is a leap year, so 02-29 is accepted.
        NaiveDate::from_ymd_opt(2024, month, day)
            .map(Self::of)
            .ok_or_else(|| format!("no such day \"{s}\""))
    }
}

impl fmt::Display for MonthDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}

/// Inclusive seasonal validity window; `from > to` wraps across New Year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Season {
    pub from: MonthDay,
    pub to: MonthDay,
}

impl Season {
    pub fn contains(&self, date: NaiveDate) -> bool {
        let md = MonthDay::of(date);
        if self.from <= self.to {
            self.from <= md && md <= self.to
        } else {
            md >= self.from || md <= self.to
        }
    }
}

/// A tariff window: a rate valid on some weekdays for a minute range.
#[derive(Debug, Clone, PartialEq)]
pub struct DayRate {
    pub days: Vec<Weekday>,
    /// First minute of the day covered (inclusive).
    pub start_minute: u16,
    /// Last minute covered (exclusive); 1440 reaches midnight.
    pub end_minute: u16,
    /// Import price (currency/kWh).
    pub rate: f64,
    /// Seasonal validity; `None` applies all year.
    pub season: Option<Season>,
}

impl DayRate {
    /// A window covering every day of the week.
    pub fn every_day(start_minute: u16, end_minute: u16, rate: f64) -> Self {
        Self {
            days: ALL_DAYS.to_vec(),
            start_minute,
            end_minute,
            rate,
            season: None,
        }
    }

    pub fn applies_on(&self, date: NaiveDate) -> bool {
        self.season.is_none_or(|s| s.contains(date))
    }
}

pub const ALL_DAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// A supplier's tariff.
#[derive(Debug, Clone, PartialEq)]
pub struct PricePlan {
    pub supplier: String,
    pub name: String,
    /// Export price (currency/kWh).
    pub feed_rate: f64,
    /// Annual standing charge, pro-rated by the days a costing run covers.
    pub standing_charges: f64,
    /// One-off credit subtracted from the nett cost.
    pub sign_up_bonus: f64,
    pub day_rates: Vec<DayRate>,
    /// Inactive plans are left out of costing batches.
    pub active: bool,
}

impl PricePlan {
    /// Stable identifier, `supplier/name`.
    pub fn id(&self) -> String {
        format!("{}/{}", self.supplier, self.name)
    }
}
