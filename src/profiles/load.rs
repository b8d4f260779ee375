use chrono::NaiveDate;
use rand::{SeedableRng, rngs::StdRng};

use super::{gaussian_noise, winter_weight};
use crate::sim::types::{INTERVAL_MINUTES, ROWS_PER_DAY, SimulationInputRow, kw_to_interval_kwh};

/// Synthetic household demand.
///
/// A daily sinusoid around `base_kw`, scaled up in winter and down in summer
/// by `seasonal_amp`, plus Gaussian noise.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use pv_tariff_sim::profiles::LoadProfile;
///
/// let profile = LoadProfile::default();
/// let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
/// let rows = profile.generate(start, 2);
/// assert_eq!(rows.len(), 576);
/// assert!(rows.iter().all(|r| r.load_kwh >= 0.0));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct LoadProfile {
    /// Average demand (kW).
    pub base_kw: f64,
    /// Daily swing amplitude (kW).
    pub amp_kw: f64,
    /// Phase of the daily sinusoid (radians); `PI` peaks at 18:00.
    pub phase_rad: f64,
    /// Noise standard deviation (kW).
    pub noise_std: f64,
    /// Relative winter uplift / summer reduction (0.2 = ±20%).
    pub seasonal_amp: f64,
    pub seed: u64,
}

impl Default for LoadProfile {
    fn default() -> Self {
        Self {
            base_kw: 0.45,
            amp_kw: 0.25,
            phase_rad: std::f64::consts::PI,
            noise_std: 0.05,
            seasonal_amp: 0.2,
            seed: 42,
        }
    }
}

impl LoadProfile {
    /// Demand (kW) at one interval before noise.
    pub fn mean_kw(&self, date: NaiveDate, minute_of_day: u16) -> f64 {
        let day_pos = f64::from(minute_of_day) / 1440.0;
        let angle = 2.0 * std::f64::consts::PI * day_pos + self.phase_rad;
        let daily = self.base_kw + self.amp_kw * angle.sin();
        daily * (1.0 + self.seasonal_amp * winter_weight(date))
    }

    /// Generates `days` whole days of rows starting at `start`.
    ///
    /// Identical parameters and seed give identical rows.
    pub fn generate(&self, start: NaiveDate, days: u32) -> Vec<SimulationInputRow> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut rows = Vec::with_capacity(days as usize * ROWS_PER_DAY);
        for day_index in 0..days {
            let date = start + chrono::Days::new(u64::from(day_index));
            for slot in 0..ROWS_PER_DAY {
                let minute = slot as u16 * INTERVAL_MINUTES;
                let kw = self.mean_kw(date, minute) + gaussian_noise(&mut rng, self.noise_std);
                rows.push(SimulationInputRow::new(
                    date,
                    minute,
                    day_index,
                    kw_to_interval_kwh(kw.max(0.0)),
                ));
            }
        }
        rows
    }
}
