//! Synthetic PV generation with correlated cloud cover.

use chrono::NaiveDate;
use rand::{SeedableRng, rngs::StdRng};

use super::{gaussian_noise, winter_weight};
use crate::sim::types::{INTERVAL_MINUTES, ROWS_PER_DAY, kw_to_interval_kwh};

/// Minimum cloud multiplier (heavy overcast).
const MULTIPLIER_MIN: f64 = 0.1;
/// Maximum cloud multiplier (cloud-edge enhancement).
const MULTIPLIER_MAX: f64 = 1.1;

/// Synthetic generation for one panel string, in standard (non-DST) time.
///
/// Output follows a half-sine between sunrise and sunset. Day length and
/// peak output swing with the season; an AR(1) cloud multiplier reverting to
/// clear sky adds correlated weather:
///
/// ```text
/// m(t) = alpha * m(t-1) + (1 - alpha) * (1 + epsilon(t))
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SolarProfile {
    /// Clear-sky summer peak (kW).
    pub kw_peak: f64,
    /// Solar noon in standard time (minutes after midnight).
    pub solar_noon_minute: u16,
    /// Day length at midsummer (hours).
    pub summer_day_hours: f64,
    /// Day length at midwinter (hours).
    pub winter_day_hours: f64,
    /// Fraction of the summer peak still reached at midwinter.
    pub winter_peak_ratio: f64,
    /// AR(1) persistence of the cloud multiplier (0..=1).
    pub alpha: f64,
    /// Standard deviation of the cloud innovation.
    pub cloud_noise_std: f64,
    pub seed: u64,
}

impl Default for SolarProfile {
    fn default() -> Self {
        Self {
            kw_peak: 4.0,
            solar_noon_minute: 750,
            summer_day_hours: 16.0,
            winter_day_hours: 8.0,
            winter_peak_ratio: 0.35,
            alpha: 0.95,
            cloud_noise_std: 0.3,
            seed: 7,
        }
    }
}

impl SolarProfile {
    /// Day length in minutes on `date`.
    pub fn day_minutes(&self, date: NaiveDate) -> f64 {
        let w = (winter_weight(date) + 1.0) / 2.0;
        60.0 * (self.summer_day_hours + (self.winter_day_hours - self.summer_day_hours) * w)
    }

    /// Fraction of the day's peak at `minute_of_day`, `0` outside daylight.
    pub fn daylight_fraction(&self, date: NaiveDate, minute_of_day: u16) -> f64 {
        let len = self.day_minutes(date);
        let sunrise = f64::from(self.solar_noon_minute) - len / 2.0;
        let pos = (f64::from(minute_of_day) - sunrise) / len;
        if (0.0..1.0).contains(&pos) {
            (std::f64::consts::PI * pos).sin()
        } else {
            0.0
        }
    }

    /// Clear-sky peak (kW) on `date`.
    pub fn peak_kw(&self, date: NaiveDate) -> f64 {
        let w = (winter_weight(date) + 1.0) / 2.0;
        self.kw_peak * (1.0 - (1.0 - self.winter_peak_ratio) * w)
    }

    /// Generates `days` whole days of generation (kWh per interval).
    pub fn generate(&self, start: NaiveDate, days: u32) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let alpha = self.alpha.clamp(0.0, 1.0);
        let mut multiplier = 1.0;
        let mut series = Vec::with_capacity(days as usize * ROWS_PER_DAY);
        for day in 0..days {
            let date = start + chrono::Days::new(u64::from(day));
            let peak = self.peak_kw(date);
            for slot in 0..ROWS_PER_DAY {
                // The multiplier evolves through the night to keep weather correlated across days.
                let epsilon = gaussian_noise(&mut rng, self.cloud_noise_std);
                multiplier = (alpha * multiplier + (1.0 - alpha) * (1.0 + epsilon))
                    .clamp(MULTIPLIER_MIN, MULTIPLIER_MAX);

                let minute = slot as u16 * INTERVAL_MINUTES;
                let frac = self.daylight_fraction(date, minute);
                let kw = (peak * frac * multiplier).max(0.0);
                series.push(kw_to_interval_kwh(kw));
            }
        }
        series
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn midsummer() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 17).unwrap()
    }

    fn midwinter() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 16).unwrap()
    }

    #[test]
    fn no_generation_at_night() {
        let p = SolarProfile::default();
        let series = p.generate(midsummer(), 1);
        assert_eq!(series[0], 0.0);
        assert_eq!(series[ROWS_PER_DAY - 1], 0.0);
    }

    #[test]
    fn peak_at_solar_noon() {
        let p = SolarProfile::default();
        assert_relative_eq!(p.daylight_fraction(midsummer(), 750), 1.0, epsilon = 1e-3);
        assert!(p.daylight_fraction(midsummer(), 600) < 1.0);
    }

    #[test]
    fn winter_days_are_shorter_and_weaker() {
        let p = SolarProfile::default();
        assert!(p.day_minutes(midwinter()) < p.day_minutes(midsummer()));
        assert!(p.peak_kw(midwinter()) < p.peak_kw(midsummer()));
        assert_eq!(p.daylight_fraction(midwinter(), 7 * 60), 0.0);
        assert!(p.daylight_fraction(midsummer(), 7 * 60) > 0.0);
    }

    #[test]
    fn deterministic_and_bounded() {
        let p = SolarProfile::default();
        let a = p.generate(midsummer(), 2);
        assert_eq!(a, p.generate(midsummer(), 2));
        let cap = kw_to_interval_kwh(p.kw_peak * MULTIPLIER_MAX);
        assert!(a.iter().all(|&v| (0.0..=cap + 1e-12).contains(&v)));
        assert!(a.iter().any(|&v| v > 0.0));
    }

    #[test]
    fn different_seeds_differ() {
        let a = SolarProfile::default();
        let b = SolarProfile { seed: 8, ..a.clone() };
        assert_ne!(a.generate(midsummer(), 1), b.generate(midsummer(), 1));
    }
}
