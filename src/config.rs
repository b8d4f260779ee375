//! TOML-based study configuration and preset definitions.
//!
//! A study names the simulated period, the scenarios (hardware plus load and
//! PV sources) and the price plans to cost them against.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Weekday};
use chrono_tz::Tz;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::batch::Snapshot;
use crate::error::Error;
use crate::io::import::{self, PvSeries};
use crate::model::{Battery, ChargeCurve, ChargePoint, ConnectionMode, Inverter, Panel, Scenario};
use crate::pipeline::ScenarioSource;
use crate::profiles::{LoadProfile, SolarProfile};
use crate::sim::types::ROWS_PER_DAY;
use crate::tariff::plan::ALL_DAYS;
use crate::tariff::{DayRate, PricePlan, RateResolver, Season};

/// Top-level study configuration parsed from TOML.
///
/// Load from TOML with [`StudyConfig::from_toml_file`] or start from a
/// preset with [`StudyConfig::from_preset`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StudyConfig {
    /// Simulated period and global parameters.
    pub simulation: SimulationConfig,
    pub scenarios: Vec<ScenarioConfig>,
    pub price_plans: Vec<PricePlanConfig>,
    /// Directory relative CSV paths are resolved against.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

/// Simulated period and global parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// First simulated day.
    pub start: NaiveDate,
    /// Number of days to simulate (must be > 0).
    pub days: u32,
    /// IANA time zone for DST realignment of PV; `None` disables it.
    pub timezone: Option<String>,
    /// Worker threads; 0 picks the available parallelism.
    pub workers: usize,
    /// Master random seed for synthetic series.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default(),
            days: 365,
            timezone: None,
            workers: 0,
            seed: 42,
        }
    }
}

/// One scenario: a load source plus inverters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioConfig {
    pub name: String,
    pub has_ev_charging: bool,
    pub has_hot_water: bool,
    pub load: LoadConfig,
    pub inverters: Vec<InverterConfig>,
}

/// Load source: a CSV file, or a synthetic profile when `csv` is unset.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadConfig {
    /// `date,minute,load_kwh` file.
    pub csv: Option<PathBuf>,
    /// Average demand (kW).
    pub base_kw: f64,
    /// Daily swing amplitude (kW).
    pub amp_kw: f64,
    /// Phase of the daily sinusoid (radians).
    pub phase_rad: f64,
    /// Noise standard deviation (kW).
    pub noise_std: f64,
    /// Relative winter uplift (0.2 = ±20%).
    pub seasonal_amp: f64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        let p = LoadProfile::default();
        Self {
            csv: None,
            base_kw: p.base_kw,
            amp_kw: p.amp_kw,
            phase_rad: p.phase_rad,
            noise_std: p.noise_std,
            seasonal_amp: p.seasonal_amp,
        }
    }
}

/// Inverter parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InverterConfig {
    pub name: String,
    pub dc_ac_loss_percent: f64,
    pub ac_dc_loss_percent: f64,
    pub dc_dc_loss_percent: f64,
    /// Surplus at or below this is curtailed (kW).
    pub min_excess_kw: f64,
    /// Maximum AC output (kW).
    pub max_output_kw: f64,
    pub battery: Option<BatteryConfig>,
    pub panels: Vec<PanelConfig>,
}

impl Default for InverterConfig {
    fn default() -> Self {
        Self {
            name: "inverter".to_string(),
            dc_ac_loss_percent: 4.0,
            ac_dc_loss_percent: 4.0,
            dc_dc_loss_percent: 2.0,
            min_excess_kw: 0.0,
            max_output_kw: 5.0,
            battery: None,
            panels: Vec::new(),
        }
    }
}

/// Battery parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatteryConfig {
    /// Usable capacity (kWh).
    pub capacity_kwh: f64,
    pub max_charge_kw: f64,
    pub max_discharge_kw: f64,
    /// SOC floor as a percentage of capacity.
    pub discharge_stop_percent: f64,
    /// Extra SOC drawn per kWh delivered (percent).
    pub storage_loss_percent: f64,
    /// `[soc_percent, rate_percent]` breakpoints in ascending order.
    pub charge_curve: Vec<[f64; 2]>,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            capacity_kwh: 10.0,
            max_charge_kw: 5.0,
            max_discharge_kw: 5.0,
            discharge_stop_percent: 10.0,
            storage_loss_percent: 5.0,
            charge_curve: ChargeCurve::default()
                .points()
                .iter()
                .map(|p| [p.soc_percent, p.rate_percent])
                .collect(),
        }
    }
}

/// Panel string: a CSV series, or a synthetic profile when `csv` is unset.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PanelConfig {
    pub name: String,
    /// MPPT group on the owning inverter.
    pub mppt: u32,
    pub connection: ConnectionMode,
    /// `date,minute,pv_kwh` file.
    pub csv: Option<PathBuf>,
    /// Clear-sky summer peak (kW).
    pub kw_peak: f64,
    /// Fraction of the summer peak reached at midwinter.
    pub winter_peak_ratio: f64,
    /// AR(1) cloud persistence (0..=1).
    pub alpha: f64,
    pub cloud_noise_std: f64,
}

impl Default for PanelConfig {
    fn default() -> Self {
        let p = SolarProfile::default();
        Self {
            name: "panel".to_string(),
            mppt: 1,
            connection: ConnectionMode::Parallel,
            csv: None,
            kw_peak: p.kw_peak,
            winter_peak_ratio: p.winter_peak_ratio,
            alpha: p.alpha,
            cloud_noise_std: p.cloud_noise_std,
        }
    }
}

/// Price plan parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PricePlanConfig {
    pub supplier: String,
    pub name: String,
    /// Export price per kWh.
    pub feed_rate: f64,
    /// Annual standing charge.
    pub standing_charges: f64,
    pub sign_up_bonus: f64,
    pub active: bool,
    pub day_rates: Vec<DayRateConfig>,
}

impl Default for PricePlanConfig {
    fn default() -> Self {
        Self {
            supplier: String::new(),
            name: String::new(),
            feed_rate: 0.0,
            standing_charges: 0.0,
            sign_up_bonus: 0.0,
            active: true,
            day_rates: Vec::new(),
        }
    }
}

/// Tariff window. Times are `HH:MM`; `end` may be `24:00`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DayRateConfig {
    pub days: Vec<Weekday>,
    pub start: String,
    pub end: String,
    /// Import price per kWh.
    pub rate: f64,
    /// Seasonal validity start, `MM-DD`.
    pub valid_from: Option<String>,
    /// Seasonal validity end (inclusive), `MM-DD`.
    pub valid_to: Option<String>,
}

impl Default for DayRateConfig {
    fn default() -> Self {
        Self {
            days: ALL_DAYS.to_vec(),
            start: "00:00".to_string(),
            end: "24:00".to_string(),
            rate: 0.0,
            valid_from: None,
            valid_to: None,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"scenarios[0].inverters[1].max_output_kw"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Parses `HH:MM` into minutes after midnight; `24:00` is allowed.
fn parse_clock(s: &str) -> Result<u16, String> {
    let (h, m) = s
        .split_once(':')
        .ok_or_else(|| format!("expected HH:MM, got \"{s}\""))?;
    let h: u16 = h.trim().parse().map_err(|_| format!("bad hour in \"{s}\""))?;
    let m: u16 = m.trim().parse().map_err(|_| format!("bad minute in \"{s}\""))?;
    if m >= 60 || h > 24 || (h == 24 && m != 0) {
        return Err(format!("\"{s}\" is not a time of day"));
    }
    Ok(h * 60 + m)
}

fn flat_plan(supplier: &str, name: &str, rate: f64, feed_rate: f64, standing: f64) -> PricePlanConfig {
    PricePlanConfig {
        supplier: supplier.to_string(),
        name: name.to_string(),
        feed_rate,
        standing_charges: standing,
        day_rates: vec![DayRateConfig {
            rate,
            ..DayRateConfig::default()
        }],
        ..PricePlanConfig::default()
    }
}

fn night_saver_plan() -> PricePlanConfig {
    PricePlanConfig {
        supplier: "Lumen".to_string(),
        name: "Night Saver".to_string(),
        feed_rate: 0.185,
        standing_charges: 260.0,
        sign_up_bonus: 50.0,
        day_rates: vec![
            DayRateConfig {
                end: "08:00".to_string(),
                rate: 0.16,
                ..DayRateConfig::default()
            },
            DayRateConfig {
                start: "08:00".to_string(),
                end: "17:00".to_string(),
                rate: 0.33,
                ..DayRateConfig::default()
            },
            DayRateConfig {
                start: "17:00".to_string(),
                end: "19:00".to_string(),
                rate: 0.41,
                ..DayRateConfig::default()
            },
            DayRateConfig {
                start: "19:00".to_string(),
                rate: 0.33,
                ..DayRateConfig::default()
            },
        ],
        ..PricePlanConfig::default()
    }
}

fn roof_panel(name: &str, mppt: u32, kw_peak: f64) -> PanelConfig {
    PanelConfig {
        name: name.to_string(),
        mppt,
        kw_peak,
        ..PanelConfig::default()
    }
}

impl StudyConfig {
    /// Returns the baseline study: a grid-only home, a PV-only home and a
    /// PV-plus-battery home on a flat and a time-of-use plan.
    pub fn baseline() -> Self {
        let simulation = SimulationConfig {
            timezone: Some("Europe/Dublin".to_string()),
            ..SimulationConfig::default()
        };
        let pv_inverter = InverterConfig {
            name: "hybrid".to_string(),
            panels: vec![roof_panel("south", 1, 4.0)],
            ..InverterConfig::default()
        };
        Self {
            simulation,
            scenarios: vec![
                ScenarioConfig {
                    name: "grid_only".to_string(),
                    ..ScenarioConfig::default()
                },
                ScenarioConfig {
                    name: "pv_only".to_string(),
                    inverters: vec![pv_inverter.clone()],
                    ..ScenarioConfig::default()
                },
                ScenarioConfig {
                    name: "pv_battery".to_string(),
                    inverters: vec![InverterConfig {
                        battery: Some(BatteryConfig::default()),
                        ..pv_inverter
                    }],
                    ..ScenarioConfig::default()
                },
            ],
            price_plans: vec![
                flat_plan("Lumen", "Standard", 0.30, 0.185, 250.0),
                night_saver_plan(),
            ],
            base_dir: None,
        }
    }

    /// Returns the high-solar preset: an east/west array on optimisers with
    /// a large battery and an export-capped inverter.
    pub fn high_solar() -> Self {
        let mut cfg = Self::baseline();
        cfg.scenarios = vec![ScenarioConfig {
            name: "east_west_big_battery".to_string(),
            has_ev_charging: true,
            inverters: vec![InverterConfig {
                name: "hybrid".to_string(),
                max_output_kw: 6.0,
                min_excess_kw: 0.05,
                battery: Some(BatteryConfig {
                    capacity_kwh: 15.0,
                    max_charge_kw: 7.0,
                    max_discharge_kw: 7.0,
                    ..BatteryConfig::default()
                }),
                panels: vec![
                    PanelConfig {
                        connection: ConnectionMode::Optimized,
                        ..roof_panel("east", 1, 4.5)
                    },
                    PanelConfig {
                        connection: ConnectionMode::Optimized,
                        ..roof_panel("west", 1, 4.5)
                    },
                    roof_panel("garage", 2, 2.0),
                ],
                ..InverterConfig::default()
            }],
            ..ScenarioConfig::default()
        }];
        cfg.price_plans.push(PricePlanConfig {
            supplier: "Brightwave".to_string(),
            name: "Seasonal".to_string(),
            feed_rate: 0.21,
            standing_charges: 230.0,
            day_rates: vec![
                DayRateConfig {
                    rate: 0.27,
                    valid_from: Some("04-01".to_string()),
                    valid_to: Some("09-30".to_string()),
                    ..DayRateConfig::default()
                },
                DayRateConfig {
                    rate: 0.36,
                    valid_from: Some("10-01".to_string()),
                    valid_to: Some("03-31".to_string()),
                    ..DayRateConfig::default()
                },
            ],
            ..PricePlanConfig::default()
        });
        cfg
    }

    /// Returns the multi-inverter preset: two inverters, each with its own
    /// battery, sharing one household load.
    pub fn multi_inverter() -> Self {
        let mut cfg = Self::baseline();
        let half = |name: &str, panel: &str| InverterConfig {
            name: name.to_string(),
            max_output_kw: 3.0,
            battery: Some(BatteryConfig {
                capacity_kwh: 5.0,
                max_charge_kw: 2.5,
                max_discharge_kw: 2.5,
                ..BatteryConfig::default()
            }),
            panels: vec![roof_panel(panel, 1, 2.5)],
            ..InverterConfig::default()
        };
        cfg.scenarios = vec![ScenarioConfig {
            name: "twin_hybrid".to_string(),
            load: LoadConfig {
                base_kw: 0.6,
                ..LoadConfig::default()
            },
            inverters: vec![half("inv_a", "front"), half("inv_b", "back")],
            ..ScenarioConfig::default()
        }];
        cfg
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "high_solar", "multi_inverter"];

    /// Loads a study from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "high_solar" => Ok(Self::high_solar()),
            "multi_inverter" => Ok(Self::multi_inverter()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a study from a TOML file. Relative CSV paths resolve against
    /// the file's directory.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("study", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        let mut cfg = Self::from_toml_str(&content)?;
        cfg.base_dir = path.parent().map(Path::to_path_buf);
        Ok(cfg)
    }

    /// Parses a study from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Parsed time zone, if one is configured.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` for an unknown zone name.
    pub fn timezone(&self) -> Result<Option<Tz>, ConfigError> {
        self.simulation
            .timezone
            .as_deref()
            .map(|name| {
                name.parse::<Tz>().map_err(|_| {
                    ConfigError::new("simulation.timezone", format!("unknown time zone \"{name}\""))
                })
            })
            .transpose()
    }

    /// Every simulated date, in order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        self.simulation
            .start
            .iter_days()
            .take(self.simulation.days as usize)
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let s = &self.simulation;

        if s.days == 0 {
            errors.push(ConfigError::new("simulation.days", "must be > 0"));
        }
        if let Err(e) = self.timezone() {
            errors.push(e);
        }
        if self.scenarios.is_empty() {
            errors.push(ConfigError::new("scenarios", "at least one scenario is required"));
        }

        let mut names = HashSet::new();
        for (i, sc) in self.scenarios.iter().enumerate() {
            let path = format!("scenarios[{i}]");
            if sc.name.trim().is_empty() {
                errors.push(ConfigError::new(format!("{path}.name"), "must not be empty"));
            } else if !names.insert(sc.name.as_str()) {
                errors.push(ConfigError::new(
                    format!("{path}.name"),
                    format!("duplicate scenario \"{}\"", sc.name),
                ));
            }
            validate_load(&sc.load, &format!("{path}.load"), &mut errors);
            for (j, inv) in sc.inverters.iter().enumerate() {
                validate_inverter(inv, &format!("{path}.inverters[{j}]"), &mut errors);
            }
        }

        let mut plan_ids = HashSet::new();
        for (i, p) in self.price_plans.iter().enumerate() {
            let path = format!("price_plans[{i}]");
            if p.supplier.trim().is_empty() || p.name.trim().is_empty() {
                errors.push(ConfigError::new(path.clone(), "supplier and name must not be empty"));
            }
            if !plan_ids.insert((p.supplier.as_str(), p.name.as_str())) {
                errors.push(ConfigError::new(
                    path.clone(),
                    format!("duplicate plan \"{}/{}\"", p.supplier, p.name),
                ));
            }
            for (field, value) in [
                ("feed_rate", p.feed_rate),
                ("standing_charges", p.standing_charges),
                ("sign_up_bonus", p.sign_up_bonus),
            ] {
                if !value.is_finite() || value < 0.0 {
                    errors.push(ConfigError::new(format!("{path}.{field}"), "must be >= 0"));
                }
            }
            if p.day_rates.is_empty() {
                errors.push(ConfigError::new(format!("{path}.day_rates"), "at least one day rate is required"));
                continue;
            }
            match plan_from_config(p, &path) {
                Ok(plan) if s.days > 0 => {
                    if let Err(e) = RateResolver::new(&plan, self.dates()) {
                        errors.push(ConfigError::new(format!("{path}.day_rates"), e.to_string()));
                    }
                }
                Ok(_) => {}
                Err(e) => errors.push(e),
            }
        }

        errors
    }

    /// Converts the configured plans into tariff definitions.
    ///
    /// # Errors
    ///
    /// Returns the first malformed time or season as a `ConfigError`.
    pub fn price_plans(&self) -> Result<Vec<PricePlan>, ConfigError> {
        self.price_plans
            .iter()
            .enumerate()
            .map(|(i, p)| plan_from_config(p, &format!("price_plans[{i}]")))
            .collect()
    }

    /// Builds every scenario, reading CSV sources and generating synthetic
    /// series as configured.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`], [`Error::Csv`] or [`Error::Import`] when a CSV
    /// source cannot be read.
    pub fn scenarios(&self) -> Result<Vec<Scenario>, Error> {
        self.scenarios
            .iter()
            .enumerate()
            .map(|(i, sc)| self.build_scenario(i, sc))
            .collect()
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }

    fn build_scenario(&self, index: usize, sc: &ScenarioConfig) -> Result<Scenario, Error> {
        let seed = self.simulation.seed.wrapping_add(1000 * index as u64);
        let days = self.simulation.days;
        let start = self.simulation.start;

        let rows = match &sc.load.csv {
            Some(path) => import::load_csv_file(&self.resolve(path))?,
            None => LoadProfile {
                base_kw: sc.load.base_kw,
                amp_kw: sc.load.amp_kw,
                phase_rad: sc.load.phase_rad,
                noise_std: sc.load.noise_std,
                seasonal_amp: sc.load.seasonal_amp,
                seed,
            }
            .generate(start, days),
        };

        let mut panel_seed = seed;
        let mut inverters = Vec::with_capacity(sc.inverters.len());
        for inv in &sc.inverters {
            let mut panels = Vec::with_capacity(inv.panels.len());
            for p in &inv.panels {
                panel_seed = panel_seed.wrapping_add(1);
                let series = match &p.csv {
                    Some(path) => import::pv_csv_file(&self.resolve(path))?,
                    None => PvSeries {
                        start: Some(start),
                        generation_kwh: SolarProfile {
                            kw_peak: p.kw_peak,
                            winter_peak_ratio: p.winter_peak_ratio,
                            alpha: p.alpha,
                            cloud_noise_std: p.cloud_noise_std,
                            seed: panel_seed,
                            ..SolarProfile::default()
                        }
                        .generate(start, days),
                    },
                };
                panels.push(Panel {
                    name: p.name.clone(),
                    mppt: p.mppt,
                    connection: p.connection,
                    start_date: series.start,
                    generation_kwh: series.generation_kwh,
                });
            }
            inverters.push(Inverter {
                name: inv.name.clone(),
                dc_ac_loss_percent: inv.dc_ac_loss_percent,
                ac_dc_loss_percent: inv.ac_dc_loss_percent,
                dc_dc_loss_percent: inv.dc_dc_loss_percent,
                min_excess_kw: inv.min_excess_kw,
                max_output_kw: inv.max_output_kw,
                panels,
                battery: inv.battery.as_ref().map(battery_from_config),
            });
        }

        let mut scenario = Scenario::new(sc.name.clone(), inverters, rows);
        scenario.flags.has_ev_charging = sc.has_ev_charging;
        scenario.flags.has_hot_water = sc.has_hot_water;
        debug!(
            scenario = %scenario.name,
            rows = scenario.rows.len(),
            expected = days as usize * ROWS_PER_DAY,
            "scenario prepared"
        );
        Ok(scenario)
    }
}

impl ScenarioSource for StudyConfig {
    fn normalize(&self) -> Result<Snapshot, Error> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(Error::InvalidConfig(errors));
        }
        let scenarios = self.scenarios()?;
        let plans = self.price_plans()?;
        info!(scenarios = scenarios.len(), plans = plans.len(), "study normalized");
        Ok(Snapshot::new(scenarios, plans))
    }
}

fn validate_load(load: &LoadConfig, path: &str, errors: &mut Vec<ConfigError>) {
    if load.csv.is_some() {
        return;
    }
    if load.base_kw < 0.0 {
        errors.push(ConfigError::new(format!("{path}.base_kw"), "must be >= 0"));
    }
    if load.noise_std < 0.0 {
        errors.push(ConfigError::new(format!("{path}.noise_std"), "must be >= 0"));
    }
    if !(0.0..1.0).contains(&load.seasonal_amp) {
        errors.push(ConfigError::new(format!("{path}.seasonal_amp"), "must be in [0.0, 1.0)"));
    }
}

fn validate_inverter(inv: &InverterConfig, path: &str, errors: &mut Vec<ConfigError>) {
    for (field, value) in [
        ("dc_ac_loss_percent", inv.dc_ac_loss_percent),
        ("ac_dc_loss_percent", inv.ac_dc_loss_percent),
        ("dc_dc_loss_percent", inv.dc_dc_loss_percent),
    ] {
        if !(0.0..=100.0).contains(&value) {
            errors.push(ConfigError::new(format!("{path}.{field}"), "must be in [0, 100]"));
        }
    }
    if inv.min_excess_kw < 0.0 {
        errors.push(ConfigError::new(format!("{path}.min_excess_kw"), "must be >= 0"));
    }
    if inv.max_output_kw.is_nan() || inv.max_output_kw <= 0.0 {
        errors.push(ConfigError::new(format!("{path}.max_output_kw"), "must be > 0"));
    }
    if let Some(b) = &inv.battery {
        let field = format!("{path}.battery");
        match curve_from_config(&b.charge_curve) {
            Ok(_) => {
                if let Err(e) = battery_from_config(b).validate() {
                    errors.push(ConfigError::new(field, e.to_string()));
                }
            }
            Err(e) => errors.push(ConfigError::new(format!("{field}.charge_curve"), e.to_string())),
        }
    }
    for (k, p) in inv.panels.iter().enumerate() {
        if p.csv.is_none() && p.kw_peak < 0.0 {
            errors.push(ConfigError::new(format!("{path}.panels[{k}].kw_peak"), "must be >= 0"));
        }
        if p.csv.is_none() && !(0.0..=1.0).contains(&p.alpha) {
            errors.push(ConfigError::new(format!("{path}.panels[{k}].alpha"), "must be in [0.0, 1.0]"));
        }
    }
}

fn curve_from_config(points: &[[f64; 2]]) -> Result<ChargeCurve, crate::error::ValidationError> {
    ChargeCurve::new(
        points
            .iter()
            .map(|&[soc_percent, rate_percent]| ChargePoint {
                soc_percent,
                rate_percent,
            })
            .collect(),
    )
}

fn battery_from_config(b: &BatteryConfig) -> Battery {
    // Invalid curves are reported by validate(); fall back to the default here.
    let curve = curve_from_config(&b.charge_curve).unwrap_or_default();
    Battery::new(
        b.capacity_kwh,
        b.max_charge_kw,
        b.max_discharge_kw,
        b.discharge_stop_percent,
        b.storage_loss_percent,
        curve,
    )
}

fn plan_from_config(p: &PricePlanConfig, path: &str) -> Result<PricePlan, ConfigError> {
    let day_rates = p
        .day_rates
        .iter()
        .enumerate()
        .map(|(k, dr)| {
            let field = format!("{path}.day_rates[{k}]");
            let start_minute = parse_clock(&dr.start).map_err(|m| ConfigError::new(format!("{field}.start"), m))?;
            let end_minute = parse_clock(&dr.end).map_err(|m| ConfigError::new(format!("{field}.end"), m))?;
            let season = match (&dr.valid_from, &dr.valid_to) {
                (None, None) => None,
                (Some(from), Some(to)) => Some(Season {
                    from: from
                        .parse()
                        .map_err(|m| ConfigError::new(format!("{field}.valid_from"), m))?,
                    to: to
                        .parse()
                        .map_err(|m| ConfigError::new(format!("{field}.valid_to"), m))?,
                }),
                _ => {
                    return Err(ConfigError::new(
                        field,
                        "valid_from and valid_to must be set together",
                    ));
                }
            };
            Ok(DayRate {
                days: dr.days.clone(),
                start_minute,
                end_minute,
                rate: dr.rate,
                season,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PricePlan {
        supplier: p.supplier.clone(),
        name: p.name.clone(),
        feed_rate: p.feed_rate,
        standing_charges: p.standing_charges,
        sign_up_bonus: p.sign_up_bonus,
        day_rates,
        active: p.active,
    })
}
