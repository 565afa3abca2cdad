//! Runtime configuration types for the forecasting engine.
//!
//! These are the settings a `ForecastInput` carries. They are separate from the
//! TOML-deserialized config in `glyco_config` and serialize into fixtures.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::insulin::InsulinModel;

/// How insulin sensitivity is looked up for a dose's effect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitivityMode {
    /// One lookup at the dose's start time.
    #[default]
    DoseStart,
    /// Lookup at each output time, so mid-absorption changes apply.
    EffectTime,
}

/// Which effect components are summed into the prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnabledEffects {
    pub insulin: bool,
    pub carbs: bool,
    pub retrospective_correction: bool,
    pub momentum: bool,
}

impl Default for EnabledEffects {
    fn default() -> Self {
        Self {
            insulin: true,
            carbs: true,
            retrospective_correction: true,
            momentum: true,
        }
    }
}

/// Carb absorption model parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarbModelCfg {
    /// Absorption time used when an entry has no hint.
    pub default_absorption_minutes: f64,
    /// Max absorption time = absorption time × overrun.
    pub absorption_overrun: f64,
    /// Absorption begins this long after the entry time.
    pub delay_minutes: u32,
}

impl Default for CarbModelCfg {
    fn default() -> Self {
        Self {
            default_absorption_minutes: 180.0,
            absorption_overrun: 1.5,
            delay_minutes: 10,
        }
    }
}

impl CarbModelCfg {
    pub fn delay(&self) -> Duration {
        Duration::minutes(i64::from(self.delay_minutes))
    }
}

/// Retrospective correction windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrospectiveCfg {
    /// Discrepancies within this window before the prediction start are summed.
    pub grouping_minutes: u32,
    /// The correction decays to zero over this span.
    pub effect_minutes: u32,
    /// The newest discrepancy must end within this span of the prediction start.
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

impl RetrospectiveCfg {
    pub fn grouping(&self) -> Duration {
        Duration::minutes(i64::from(self.grouping_minutes))
    }
    pub fn effect(&self) -> Duration {
        Duration::minutes(i64::from(self.effect_minutes))
    }
    pub fn recency(&self) -> Duration {
        Duration::minutes(i64::from(self.recency_minutes))
    }
}

/// Momentum (short-term trend) parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumCfg {
    /// Samples at or after `latest - window` take part in the slope fit.
    pub window_minutes: u32,
    /// The fitted slope decays to zero over this span.
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

impl MomentumCfg {
    pub fn window(&self) -> Duration {
        Duration::minutes(i64::from(self.window_minutes))
    }
    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.duration_minutes))
    }
}

/// Form the dosing recommendation takes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DosingStrategy {
    #[default]
    TempBasalOnly,
    AutomaticBolus,
    ManualBolus,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationCfg {
    pub strategy: DosingStrategy,
    /// Fraction of the correction delivered as an automatic bolus.
    pub partial_application_factor: f64,
    pub temp_basal_minutes: u32,
    /// A running temp basal at the recommended rate is left alone while it has
    /// more than this long left.
    pub continuation_minutes: u32,
    /// Recommendations are withheld when the latest glucose is older than this.
    pub max_glucose_age_minutes: u32,
}

impl Default for RecommendationCfg {
    fn default() -> Self {
        Self {
            strategy: DosingStrategy::TempBasalOnly,
            partial_application_factor: 0.4,
            temp_basal_minutes: 30,
            continuation_minutes: 11,
            max_glucose_age_minutes: 15,
        }
    }
}

impl RecommendationCfg {
    pub fn temp_basal_duration(&self) -> Duration {
        Duration::minutes(i64::from(self.temp_basal_minutes))
    }
    pub fn continuation(&self) -> Duration {
        Duration::minutes(i64::from(self.continuation_minutes))
    }
    pub fn max_glucose_age(&self) -> Duration {
        Duration::minutes(i64::from(self.max_glucose_age_minutes))
    }
}

/// Everything the engine needs besides the histories and schedules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastSettings {
    /// Grid step for every curve.
    pub delta_minutes: u32,
    /// Max distance between a grid point and the sample standing in for it.
    pub glucose_tolerance_minutes: u32,
    pub insulin_model: InsulinModel,
    pub sensitivity_mode: SensitivityMode,
    pub effects: EnabledEffects,
    pub carbs: CarbModelCfg,
    pub retrospective: RetrospectiveCfg,
    pub momentum: MomentumCfg,
    pub recommendation: RecommendationCfg,
    /// Lower bound applied to emitted prediction values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction_floor: Option<f64>,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            delta_minutes: 5,
            glucose_tolerance_minutes: 5,
            insulin_model: InsulinModel::default(),
            sensitivity_mode: SensitivityMode::DoseStart,
            effects: EnabledEffects::default(),
            carbs: CarbModelCfg::default(),
            retrospective: RetrospectiveCfg::default(),
            momentum: MomentumCfg::default(),
            recommendation: RecommendationCfg::default(),
            prediction_floor: None,
        }
    }
}

impl ForecastSettings {
    pub fn delta(&self) -> Duration {
        Duration::minutes(i64::from(self.delta_minutes))
    }

    pub fn glucose_tolerance(&self) -> Duration {
        Duration::minutes(i64::from(self.glucose_tolerance_minutes))
    }

    /// Span after the prediction start that the forecast covers.
    pub fn horizon(&self) -> Duration {
        self.insulin_model.effect_duration()
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.delta_minutes == 0 {
            return Err("delta_minutes must be >= 1");
        }
        if self.glucose_tolerance_minutes == 0 {
            return Err("glucose_tolerance_minutes must be >= 1");
        }
        if !(self.carbs.default_absorption_minutes.is_finite()
            && self.carbs.default_absorption_minutes > 0.0)
        {
            return Err("carbs.default_absorption_minutes must be > 0");
        }
        if !(self.carbs.absorption_overrun.is_finite() && self.carbs.absorption_overrun >= 1.0) {
            return Err("carbs.absorption_overrun must be >= 1.0");
        }
        if self.momentum.min_samples < 2 {
            return Err("momentum.min_samples must be >= 2");
        }
        let f = self.recommendation.partial_application_factor;
        if !(f > 0.0 && f <= 1.0) {
            return Err("recommendation.partial_application_factor must be in (0.0, 1.0]");
        }
        self.insulin_model.validate()
    }
}
