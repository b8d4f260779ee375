use crate::error::ValidationError;
use crate::sim::types::kw_to_interval_kwh;

/// One breakpoint of a charge-rate curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargePoint {
    /// State of charge, as a percentage of capacity, where this band begins.
    pub soc_percent: f64,
    /// Allowed charge rate, as a percentage of the battery's rated maximum.
    pub rate_percent: f64,
}

/// Piecewise-constant charge-rate curve keyed by SOC percentage.
///
/// Point `k` applies above its breakpoint; the first point also covers 0%, and
/// the last point applies from its breakpoint inclusive. When several points
/// apply, the highest one wins. The default curve therefore reads
/// `<=12% -> 100`, `(12, 90] -> 100`, `(90, 100) -> 10`, `100% -> 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeCurve {
    points: Vec<ChargePoint>,
}

impl Default for ChargeCurve {
    fn default() -> Self {
        Self {
            points: vec![
                ChargePoint { soc_percent: 0.0, rate_percent: 100.0 },
                ChargePoint { soc_percent: 12.0, rate_percent: 100.0 },
                ChargePoint { soc_percent: 90.0, rate_percent: 10.0 },
                ChargePoint { soc_percent: 100.0, rate_percent: 0.0 },
            ],
        }
    }
}

impl ChargeCurve {
    /// Builds a curve from ordered breakpoints.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the curve is empty, does not start at
    /// 0%, has non-ascending breakpoints, or contains values outside `0..=100`.
    pub fn new(points: Vec<ChargePoint>) -> Result<Self, ValidationError> {
        let first = points.first().ok_or(ValidationError::EmptyChargeCurve)?;
        if first.soc_percent != 0.0 {
            return Err(ValidationError::ChargeCurveStart(first.soc_percent));
        }
        for p in &points {
            for v in [p.soc_percent, p.rate_percent] {
                if !(0.0..=100.0).contains(&v) {
                    return Err(ValidationError::ChargeCurveRange(v));
                }
            }
        }
        for pair in points.windows(2) {
            if pair[1].soc_percent <= pair[0].soc_percent {
                return Err(ValidationError::ChargeCurveOrder {
                    prev: pair[0].soc_percent,
                    next: pair[1].soc_percent,
                });
            }
        }
        Ok(Self { points })
    }

    /// Builds the classic four-band curve with breakpoints at 0/12/90/100%.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if any rate is outside `0..=100`.
    pub fn four_point(p0: f64, p12: f64, p90: f64, p100: f64) -> Result<Self, ValidationError> {
        Self::new(
            [(0.0, p0), (12.0, p12), (90.0, p90), (100.0, p100)]
                .into_iter()
                .map(|(soc_percent, rate_percent)| ChargePoint { soc_percent, rate_percent })
                .collect(),
        )
    }

    /// Breakpoints in ascending order.
    pub fn points(&self) -> &[ChargePoint] {
        &self.points
    }

    /// Looks up the allowed charge rate percentage at `soc_percent`.
    pub fn rate_percent(&self, soc_percent: f64) -> f64 {
        let last = self.points.len() - 1;
        self.points
            .iter()
            .enumerate()
            .filter(|(k, p)| {
                *k == 0 || soc_percent > p.soc_percent || (*k == last && soc_percent >= p.soc_percent)
            })
            .map(|(_, p)| p.rate_percent)
            .last()
            .unwrap_or(0.0)
    }
}

/// A stationary battery attached to an inverter.
///
/// Rates are in kW; the capacity functions below return kWh available within
/// one simulation interval. SOC itself is not stored here: it is scenario-local
/// simulation state passed in by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Battery {
    /// Usable capacity in kWh. Zero means "no battery connected".
    pub capacity_kwh: f64,
    /// Rated maximum charge power (kW).
    pub max_charge_kw: f64,
    /// Rated maximum discharge power (kW).
    pub max_discharge_kw: f64,
    /// SOC percentage below which discharge stops.
    pub discharge_stop_percent: f64,
    /// Storage loss in percent, applied when discharging.
    pub storage_loss_percent: f64,
    pub charge_curve: ChargeCurve,
}

impl Battery {
    pub fn new(
        capacity_kwh: f64,
        max_charge_kw: f64,
        max_discharge_kw: f64,
        discharge_stop_percent: f64,
        storage_loss_percent: f64,
        charge_curve: ChargeCurve,
    ) -> Self {
        Self {
            capacity_kwh,
            max_charge_kw,
            max_discharge_kw,
            discharge_stop_percent,
            storage_loss_percent,
            charge_curve,
        }
    }

    /// Checks the numeric parameters.
    ///
    /// # Errors
    ///
    /// Returns the first out-of-range parameter.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let checks = [
            ("capacity_kwh", ">= 0", self.capacity_kwh, self.capacity_kwh >= 0.0),
            ("max_charge_kw", ">= 0", self.max_charge_kw, self.max_charge_kw >= 0.0),
            ("max_discharge_kw", ">= 0", self.max_discharge_kw, self.max_discharge_kw >= 0.0),
            (
                "discharge_stop_percent",
                "in 0..=100",
                self.discharge_stop_percent,
                (0.0..=100.0).contains(&self.discharge_stop_percent),
            ),
            (
                "storage_loss_percent",
                ">= 0",
                self.storage_loss_percent,
                self.storage_loss_percent >= 0.0,
            ),
        ];
        match checks.into_iter().find(|(.., ok)| !ok) {
            Some((field, expected, value, _)) => Err(ValidationError::BatteryParameter {
                field,
                expected,
                value,
            }),
            None => Ok(()),
        }
    }

    /// Energy held back from discharge (kWh).
    pub fn discharge_reserve(&self) -> f64 {
        self.discharge_stop_percent / 100.0 * self.capacity_kwh
    }

    /// Stored energy drawn per kWh delivered.
    pub fn storage_loss_factor(&self) -> f64 {
        1.0 + self.storage_loss_percent / 100.0
    }

    /// Maximum charge energy for one interval at `soc`, per the charge curve.
    pub fn max_charge_for_soc(&self, soc: f64) -> f64 {
        if self.capacity_kwh <= 0.0 {
            return 0.0;
        }
        let soc_percent = soc / self.capacity_kwh * 100.0;
        kw_to_interval_kwh(self.max_charge_kw) * self.charge_curve.rate_percent(soc_percent) / 100.0
    }

    /// Stored energy that may leave the battery this interval (kWh).
    pub fn discharge_capacity(&self, soc: f64) -> f64 {
        if self.capacity_kwh <= 0.0 {
            return 0.0;
        }
        kw_to_interval_kwh(self.max_discharge_kw).min((soc - self.discharge_reserve()).max(0.0))
    }

    /// Energy the battery can deliver to the load this interval, net of storage loss.
    pub fn deliverable_discharge(&self, soc: f64) -> f64 {
        self.discharge_capacity(soc) / self.storage_loss_factor()
    }

    /// Energy the battery can absorb this interval (kWh).
    pub fn charge_capacity(&self, soc: f64) -> f64 {
        if self.capacity_kwh <= 0.0 {
            return 0.0;
        }
        (self.capacity_kwh - soc).min(self.max_charge_for_soc(soc)).max(0.0)
    }

    /// Applies a delivered discharge and a charge to `soc`, returning the new SOC
    /// clamped to `[0, capacity]`.
    pub fn next_soc(&self, soc: f64, delivered: f64, charged: f64) -> f64 {
        (soc - delivered * self.storage_loss_factor() + charged).clamp(0.0, self.capacity_kwh.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn battery() -> Battery {
        // 12 kW rates make the per-interval limit exactly 1 kWh.
        Battery::new(10.0, 12.0, 12.0, 10.0, 0.0, ChargeCurve::default())
    }

    #[test]
    fn reserve_is_percentage_of_capacity() {
        assert_relative_eq!(battery().discharge_reserve(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn discharge_capacity_never_negative() {
        let b = battery();
        assert_eq!(b.discharge_capacity(0.5), 0.0);
        assert_relative_eq!(b.discharge_capacity(1.5), 0.5, epsilon = 1e-12);
        assert_relative_eq!(b.discharge_capacity(8.0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn charge_capacity_limited_by_headroom() {
        let b = battery();
        // 95% SOC sits in the (90, 100) band at 10% of 1 kWh.
        assert_relative_eq!(b.charge_capacity(9.5), 0.1, epsilon = 1e-12);
        assert_relative_eq!(b.charge_capacity(9.95), 0.05, epsilon = 1e-12);
        assert_relative_eq!(b.charge_capacity(5.0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn full_battery_does_not_charge_when_top_band_is_zero() {
        let b = battery();
        assert_eq!(b.charge_capacity(10.0), 0.0);
        assert_eq!(b.max_charge_for_soc(10.0), 0.0);
    }

    #[test]
    fn zero_capacity_is_inert() {
        let b = Battery::new(0.0, 5.0, 5.0, 0.0, 0.0, ChargeCurve::default());
        assert_eq!(b.charge_capacity(0.0), 0.0);
        assert_eq!(b.discharge_capacity(0.0), 0.0);
        assert_eq!(b.next_soc(0.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn curve_bands_use_last_match() {
        let curve = ChargeCurve::four_point(100.0, 80.0, 20.0, 0.0).unwrap();
        assert_eq!(curve.rate_percent(0.0), 100.0);
        assert_eq!(curve.rate_percent(12.0), 100.0);
        assert_eq!(curve.rate_percent(12.5), 80.0);
        assert_eq!(curve.rate_percent(90.0), 80.0);
        assert_eq!(curve.rate_percent(99.9), 20.0);
        assert_eq!(curve.rate_percent(100.0), 0.0);
    }

    #[test]
    fn curve_supports_more_points() {
        let curve = ChargeCurve::new(vec![
            ChargePoint { soc_percent: 0.0, rate_percent: 50.0 },
            ChargePoint { soc_percent: 50.0, rate_percent: 40.0 },
            ChargePoint { soc_percent: 75.0, rate_percent: 30.0 },
            ChargePoint { soc_percent: 95.0, rate_percent: 5.0 },
            ChargePoint { soc_percent: 100.0, rate_percent: 0.0 },
        ])
        .unwrap();
        assert_eq!(curve.rate_percent(60.0), 40.0);
        assert_eq!(curve.rate_percent(80.0), 30.0);
        assert_eq!(curve.rate_percent(96.0), 5.0);
    }

    #[test]
    fn curve_rejects_malformed_points() {
        assert_eq!(ChargeCurve::new(vec![]), Err(ValidationError::EmptyChargeCurve));
        assert!(matches!(
            ChargeCurve::new(vec![ChargePoint { soc_percent: 5.0, rate_percent: 10.0 }]),
            Err(ValidationError::ChargeCurveStart(_))
        ));
        assert!(matches!(
            ChargeCurve::four_point(100.0, 120.0, 10.0, 0.0),
            Err(ValidationError::ChargeCurveRange(_))
        ));
        assert!(matches!(
            ChargeCurve::new(vec![
                ChargePoint { soc_percent: 0.0, rate_percent: 100.0 },
                ChargePoint { soc_percent: 90.0, rate_percent: 10.0 },
                ChargePoint { soc_percent: 12.0, rate_percent: 50.0 },
            ]),
            Err(ValidationError::ChargeCurveOrder { .. })
        ));
    }

    #[test]
    fn storage_loss_applies_on_discharge_only() {
        let b = Battery::new(10.0, 12.0, 12.0, 0.0, 10.0, ChargeCurve::default());
        assert_relative_eq!(b.next_soc(5.0, 1.0, 0.0), 3.9, epsilon = 1e-12);
        assert_relative_eq!(b.next_soc(5.0, 0.0, 1.0), 6.0, epsilon = 1e-12);
        assert_relative_eq!(b.deliverable_discharge(5.0), 1.0 / 1.1, epsilon = 1e-12);
    }

    #[test]
    fn validate_flags_bad_parameters() {
        assert!(battery().validate().is_ok());
        let mut b = battery();
        b.discharge_stop_percent = 120.0;
        assert!(matches!(
            b.validate(),
            Err(ValidationError::BatteryParameter { field: "discharge_stop_percent", .. })
        ));
        let mut b = battery();
        b.capacity_kwh = f64::NAN;
        assert!(b.validate().is_err());
    }

    #[test]
    fn next_soc_is_clamped() {
        let b = battery();
        assert_eq!(b.next_soc(0.2, 1.0, 0.0), 0.0);
        assert_eq!(b.next_soc(9.9, 0.0, 1.0), 10.0);
    }
}
