//! Seeded synthetic 5-minute series for presets and demos.
//!
//! Real studies read prepared series from CSV; these generators stand in for
//! that import when a scenario asks for synthetic data.

pub mod load;
pub mod solar;

pub use load::LoadProfile;
pub use solar::SolarProfile;

use chrono::{Datelike, NaiveDate};
use rand::{Rng, rngs::StdRng};

/// Gaussian noise via the Box-Muller transform.
///
/// Returns `0.0` when `std_dev <= 0`.
pub fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-9, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * std_dev
}

/// Seasonal position in `[-1, 1]`: `1` around mid-January, `-1` around
/// mid-July.
pub fn winter_weight(date: NaiveDate) -> f64 {
    let doy = f64::from(date.ordinal0());
    (2.0 * std::f64::consts::PI * (doy - 15.0) / 365.0).cos()
}
