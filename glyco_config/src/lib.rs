#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and schedule parsing for the glucose forecaster.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Daily schedules are written as `{ start = "HH:MM", value = ... }` items;
//!   a schedule may also be loaded from a CSV with strict `start,value` headers.
use serde::Deserialize;

/// Minutes in one day; schedule offsets live in `[0, MINUTES_PER_DAY)`.
pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// One item of a repeating daily schedule.
///
/// CSV form (headers required):
/// start,value
/// 00:00,0.8
/// 06:30,1.1
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ScheduleItem {
    /// Local offset into the day, `HH:MM`.
    pub start: String,
    pub value: f64,
}

impl ScheduleItem {
    pub fn start_minutes(&self) -> Option<u32> {
        parse_clock_offset(&self.start)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TargetItem {
    pub start: String,
    pub min: f64,
    pub max: f64,
}

impl TargetItem {
    pub fn start_minutes(&self) -> Option<u32> {
        parse_clock_offset(&self.start)
    }
}

/// Treatment settings as repeating daily schedules.
#[derive(Debug, Deserialize, Clone)]
pub struct Schedules {
    /// Scheduled basal rate (U/h).
    pub basal: Vec<ScheduleItem>,
    /// Insulin sensitivity (mg/dL per U).
    pub sensitivity: Vec<ScheduleItem>,
    /// Carb ratio (g per U).
    pub carb_ratio: Vec<ScheduleItem>,
    /// Correction target range (mg/dL).
    pub target: Vec<TargetItem>,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InsulinModelKind {
    #[default]
    RapidActingAdult,
    RapidActingChild,
    Fiasp,
    Lyumjev,
    Afrezza,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SensitivityMode {
    /// ISF looked up once at the dose start.
    #[default]
    DoseStart,
    /// ISF looked up at each output time (mid-absorption changes apply).
    EffectTime,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DosingStrategy {
    #[default]
    TempBasalOnly,
    AutomaticBolus,
    ManualBolus,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AlgorithmCfg {
    /// Grid step for every effect and prediction curve.
    pub delta_minutes: u32,
    pub insulin_model: InsulinModelKind,
    pub sensitivity_mode: SensitivityMode,
    /// Max distance between a grid point and the glucose sample standing in for it.
    pub glucose_tolerance_minutes: u32,
    /// How far back history is requested from the provider.
    pub history_hours: u32,
    /// Optional lower bound applied to emitted predictions.
    pub prediction_floor: Option<f64>,
}

impl Default for AlgorithmCfg {
    fn default() -> Self {
        Self {
            delta_minutes: 5,
            insulin_model: InsulinModelKind::RapidActingAdult,
            sensitivity_mode: SensitivityMode::DoseStart,
            glucose_tolerance_minutes: 5,
            history_hours: 24,
            prediction_floor: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct EffectsCfg {
    pub insulin: bool,
    pub carbs: bool,
    pub retrospective_correction: bool,
    pub momentum: bool,
}

impl Default for EffectsCfg {
    fn default() -> Self {
        Self {
            insulin: true,
            carbs: true,
            retrospective_correction: true,
            momentum: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CarbsCfg {
    pub default_absorption_minutes: f64,
    /// Multiplier on the absorption time giving the slowest plausible absorption.
    pub absorption_overrun: f64,
    pub delay_minutes: u32,
}

impl Default for CarbsCfg {
    fn default() -> Self {
        Self {
            default_absorption_minutes: 180.0,
            absorption_overrun: 1.5,
            delay_minutes: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrospectiveCfg {
    pub grouping_minutes: u32,
    pub effect_minutes: u32,
    pub recency_minutes: u32,
}

impl Default for RetrospectiveCfg {
    fn default() -> Self {
        Self {
            grouping_minutes: 30,
            effect_minutes: 60,
            recency_minutes: 15,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MomentumCfg {
    pub window_minutes: u32,
    pub duration_minutes: u32,
    pub min_samples: usize,
}

impl Default for MomentumCfg {
    fn default() -> Self {
        Self {
            window_minutes: 15,
            duration_minutes: 30,
            min_samples: 3,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DosingCfg {
    pub strategy: DosingStrategy,
    /// Fraction of the correction delivered per automatic bolus.
    pub partial_application_factor: f64,
    pub temp_basal_minutes: u32,
    /// Recommendations are withheld when the latest glucose is older than this.
    pub max_glucose_age_minutes: u32,
}

impl Default for DosingCfg {
    fn default() -> Self {
        Self {
            strategy: DosingStrategy::TempBasalOnly,
            partial_application_factor: 0.4,
            temp_basal_minutes: 30,
            max_glucose_age_minutes: 15,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct Limits {
    pub max_bolus: f64,
    pub max_basal_rate: f64,
    pub suspend_threshold: f64,
    #[serde(default)]
    pub bolus_increment: Option<f64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub algorithm: AlgorithmCfg,
    #[serde(default)]
    pub effects: EffectsCfg,
    #[serde(default)]
    pub carbs: CarbsCfg,
    #[serde(default)]
    pub retrospective: RetrospectiveCfg,
    #[serde(default)]
    pub momentum: MomentumCfg,
    #[serde(default)]
    pub dosing: DosingCfg,
    /// Dosing limits; recommendations are disabled when absent.
    #[serde(default)]
    pub limits: Option<Limits>,
    pub schedules: Schedules,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Parse `HH:MM` into minutes past midnight.
pub fn parse_clock_offset(s: &str) -> Option<u32> {
    let (h, m) = s.trim().split_once(':')?;
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    (h < 24 && m < 60).then_some(h * 60 + m)
}

/// Load a daily schedule from a CSV with exact headers `start,value`.
pub fn load_schedule_csv(path: &std::path::Path) -> eyre::Result<Vec<ScheduleItem>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open schedule CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["start", "value"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "schedule CSV must have headers 'start,value', got: {}",
            actual.join(",")
        );
    }

    let mut items = Vec::new();
    for (idx, rec) in rdr.deserialize::<ScheduleItem>().enumerate() {
        match rec {
            Ok(item) => items.push(item),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }

    validate_offsets(
        "csv",
        items.iter().map(ScheduleItem::start_minutes).collect(),
    )?;
    Ok(items)
}

/// Offsets must parse, begin at midnight, and increase strictly.
fn validate_offsets(name: &str, offsets: Vec<Option<u32>>) -> eyre::Result<()> {
    if offsets.is_empty() {
        eyre::bail!("schedules.{name} must not be empty");
    }
    let mut prev: Option<u32> = None;
    for (i, off) in offsets.into_iter().enumerate() {
        let Some(off) = off else {
            eyre::bail!("schedules.{name}[{i}].start must be HH:MM");
        };
        match prev {
            None if off != 0 => eyre::bail!("schedules.{name} must start at 00:00"),
            Some(p) if off <= p => {
                eyre::bail!("schedules.{name} start times must be strictly increasing")
            }
            _ => {}
        }
        prev = Some(off);
    }
    Ok(())
}

fn validate_values(name: &str, values: impl Iterator<Item = f64>, allow_zero: bool) -> eyre::Result<()> {
    for (i, v) in values.enumerate() {
        let ok = v.is_finite() && (v > 0.0 || (allow_zero && v == 0.0));
        if !ok {
            if allow_zero {
                eyre::bail!("schedules.{name}[{i}].value must be >= 0");
            }
            eyre::bail!("schedules.{name}[{i}].value must be > 0");
        }
    }
    Ok(())
}

impl Schedules {
    pub fn validate(&self) -> eyre::Result<()> {
        validate_offsets(
            "basal",
            self.basal.iter().map(ScheduleItem::start_minutes).collect(),
        )?;
        validate_values("basal", self.basal.iter().map(|i| i.value), true)?;
        validate_offsets(
            "sensitivity",
            self.sensitivity.iter().map(ScheduleItem::start_minutes).collect(),
        )?;
        validate_values("sensitivity", self.sensitivity.iter().map(|i| i.value), false)?;
        validate_offsets(
            "carb_ratio",
            self.carb_ratio.iter().map(ScheduleItem::start_minutes).collect(),
        )?;
        validate_values("carb_ratio", self.carb_ratio.iter().map(|i| i.value), false)?;
        validate_offsets(
            "target",
            self.target.iter().map(TargetItem::start_minutes).collect(),
        )?;
        for (i, t) in self.target.iter().enumerate() {
            if !(t.min.is_finite() && t.max.is_finite() && t.min > 0.0 && t.min <= t.max) {
                eyre::bail!("schedules.target[{i}] must satisfy 0 < min <= max");
            }
        }
        Ok(())
    }
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Algorithm
        if self.algorithm.delta_minutes == 0 || self.algorithm.delta_minutes > 60 {
            eyre::bail!("algorithm.delta_minutes must be in [1, 60]");
        }
        if self.algorithm.glucose_tolerance_minutes == 0 {
            eyre::bail!("algorithm.glucose_tolerance_minutes must be >= 1");
        }
        if self.algorithm.history_hours == 0 || self.algorithm.history_hours > 7 * 24 {
            eyre::bail!("algorithm.history_hours must be in [1, 168]");
        }
        if let Some(floor) = self.algorithm.prediction_floor
            && !floor.is_finite()
        {
            eyre::bail!("algorithm.prediction_floor must be finite");
        }

        // Carbs
        if !(self.carbs.default_absorption_minutes.is_finite()
            && self.carbs.default_absorption_minutes > 0.0)
        {
            eyre::bail!("carbs.default_absorption_minutes must be > 0");
        }
        if !(self.carbs.absorption_overrun.is_finite() && self.carbs.absorption_overrun >= 1.0) {
            eyre::bail!("carbs.absorption_overrun must be >= 1.0");
        }
        if self.carbs.delay_minutes > 60 {
            eyre::bail!("carbs.delay_minutes is unreasonably large (>60)");
        }

        // Retrospective correction
        if self.retrospective.grouping_minutes < self.algorithm.delta_minutes {
            eyre::bail!("retrospective.grouping_minutes must be >= algorithm.delta_minutes");
        }
        if self.retrospective.effect_minutes <= self.algorithm.delta_minutes {
            eyre::bail!("retrospective.effect_minutes must be > algorithm.delta_minutes");
        }

        // Momentum
        if self.momentum.window_minutes == 0 {
            eyre::bail!("momentum.window_minutes must be >= 1");
        }
        if self.momentum.duration_minutes <= self.algorithm.delta_minutes {
            eyre::bail!("momentum.duration_minutes must be > algorithm.delta_minutes");
        }
        if self.momentum.min_samples < 2 {
            eyre::bail!("momentum.min_samples must be >= 2");
        }

        // Dosing
        let f = self.dosing.partial_application_factor;
        if !(f > 0.0 && f <= 1.0) {
            eyre::bail!("dosing.partial_application_factor must be in (0.0, 1.0]");
        }
        if self.dosing.temp_basal_minutes == 0 {
            eyre::bail!("dosing.temp_basal_minutes must be >= 1");
        }

        // Limits
        if let Some(l) = &self.limits {
            if !(l.max_bolus.is_finite() && l.max_bolus >= 0.0) {
                eyre::bail!("limits.max_bolus must be >= 0");
            }
            if !(l.max_basal_rate.is_finite() && l.max_basal_rate >= 0.0) {
                eyre::bail!("limits.max_basal_rate must be >= 0");
            }
            if !(l.suspend_threshold.is_finite() && l.suspend_threshold > 0.0) {
                eyre::bail!("limits.suspend_threshold must be > 0");
            }
            if let Some(inc) = l.bolus_increment
                && !(inc.is_finite() && inc > 0.0)
            {
                eyre::bail!("limits.bolus_increment must be > 0");
            }
            if let Some(floor) = self.algorithm.prediction_floor
                && floor >= l.suspend_threshold
            {
                eyre::bail!("algorithm.prediction_floor must be below limits.suspend_threshold");
            }
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        self.schedules.validate()
    }
}
