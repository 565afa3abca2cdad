//! Aggregate input and output of one forecast invocation.

use chrono::{DateTime, Utc};
use glyco_traits::{CarbRecord, DoseRecord, DosingLimits, GlucoseSample, TargetRange};
use serde::{Deserialize, Serialize};

use crate::carbs::CarbStatus;
use crate::config::ForecastSettings;
use crate::error::{ForecastError, Result, ScheduleKind};
use crate::effects::{GlucoseEffect, GlucoseEffectVelocity, PredictedGlucoseValue};
use crate::recommendation::{DoseRecommendation, GlucoseCorrection};
use crate::schedule::ScheduleTable;

/// Everything one forecast reads. Histories are sorted ascending by time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastInput {
    pub glucose: Vec<GlucoseSample>,
    #[serde(default)]
    pub doses: Vec<DoseRecord>,
    #[serde(default)]
    pub carbs: Vec<CarbRecord>,
    pub basal: ScheduleTable<f64>,
    pub sensitivity: ScheduleTable<f64>,
    pub carb_ratio: ScheduleTable<f64>,
    pub target: ScheduleTable<TargetRange>,
    /// Recommendations are only produced when limits are present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<DosingLimits>,
    #[serde(default)]
    pub settings: ForecastSettings,
}

fn check_values(
    kind: ScheduleKind,
    table: &ScheduleTable<f64>,
    ok: impl Fn(f64) -> bool,
    rule: &str,
) -> Result<()> {
    match table.entries().iter().find(|e| !(e.value.is_finite() && ok(e.value))) {
        Some(e) => Err(ForecastError::InvalidInput(format!(
            "{kind} schedule value {} at {} must be {rule}",
            e.value, e.start
        ))),
        None => Ok(()),
    }
}

impl ForecastInput {
    /// Reject settings, schedule values and limits the engine cannot use.
    ///
    /// Basal rates may be zero; sensitivities and carb ratios must be
    /// positive, and targets must satisfy `0 < min <= max`. With limits
    /// present, a prediction floor must sit below the suspend threshold.
    pub fn validate(&self) -> Result<()> {
        self.settings
            .validate()
            .map_err(|e| ForecastError::InvalidInput(e.to_string()))?;
        check_values(ScheduleKind::Basal, &self.basal, |v| v >= 0.0, ">= 0")?;
        check_values(ScheduleKind::Sensitivity, &self.sensitivity, |v| v > 0.0, "> 0")?;
        check_values(ScheduleKind::CarbRatio, &self.carb_ratio, |v| v > 0.0, "> 0")?;
        if let Some(e) = self.target.entries().iter().find(|e| {
            let t = e.value;
            !(t.min.is_finite() && t.max.is_finite() && t.min > 0.0 && t.min <= t.max)
        }) {
            return Err(ForecastError::InvalidInput(format!(
                "target range at {} must satisfy 0 < min <= max",
                e.start
            )));
        }
        if let (Some(floor), Some(limits)) = (self.settings.prediction_floor, &self.limits)
            && floor >= limits.suspend_threshold
        {
            return Err(ForecastError::InvalidInput(format!(
                "prediction_floor {floor} must be below suspend_threshold {}",
                limits.suspend_threshold
            )));
        }
        Ok(())
    }
}

/// Prediction plus every intermediate curve, for display and diagnosis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastOutput {
    /// Time of the glucose sample the prediction starts from.
    pub prediction_start: DateTime<Utc>,
    pub predicted_glucose: Vec<PredictedGlucoseValue>,
    pub insulin_effects: Vec<GlucoseEffect>,
    pub carb_effects: Vec<GlucoseEffect>,
    pub retrospective_effects: Vec<GlucoseEffect>,
    pub momentum_effects: Vec<GlucoseEffect>,
    pub insulin_counteraction: Vec<GlucoseEffectVelocity>,
    pub carb_statuses: Vec<CarbStatus>,
    pub insulin_on_board: f64,
    pub carbs_on_board: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrospective_discrepancy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correction: Option<GlucoseCorrection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<DoseRecommendation>,
}

impl ForecastOutput {
    /// Lowest predicted value, if any.
    pub fn min_predicted(&self) -> Option<PredictedGlucoseValue> {
        self.predicted_glucose
            .iter()
            .copied()
            .min_by(|a, b| a.value.total_cmp(&b.value))
    }

    pub fn eventual_glucose(&self) -> Option<PredictedGlucoseValue> {
        self.predicted_glucose.last().copied()
    }
}
