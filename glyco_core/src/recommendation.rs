//! Bounded dosing recommendations derived from a prediction.
//!
//! The prediction is first classified against the target schedule and the
//! suspend threshold, then turned into a temp basal and/or bolus according to
//! the configured strategy. Amounts never exceed the dosing limits and nothing
//! positive is recommended when any prediction reaches the suspend threshold.

use chrono::{DateTime, Duration, Utc};
use glyco_traits::{DoseRecord, DosingLimits, TargetRange};
use serde::{Deserialize, Serialize};

use crate::config::{DosingStrategy, RecommendationCfg};
use crate::effects::PredictedGlucoseValue;
use crate::error::{Result, ScheduleKind};
use crate::insulin::InsulinModel;
use crate::schedule::ScheduleTable;
use crate::util::{duration_minutes, minutes_between};

const RATE_EPSILON: f64 = 1e-6;

/// Where the prediction sits relative to target, and the insulin implied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GlucoseCorrection {
    /// Some prediction is at or below the suspend threshold.
    Suspend { min_glucose: PredictedGlucoseValue },
    /// The eventual value is within range, or nothing was above it.
    InRange,
    /// Both the minimum and the eventual value are below the range.
    EntirelyBelowRange {
        min_glucose: PredictedGlucoseValue,
        units: f64,
    },
    /// The eventual value is above range.
    AboveRange {
        min_glucose: PredictedGlucoseValue,
        correcting_glucose: PredictedGlucoseValue,
        units: f64,
    },
}

impl GlucoseCorrection {
    /// Correction units; zero unless above or entirely below range.
    pub fn units(&self) -> f64 {
        match *self {
            GlucoseCorrection::AboveRange { units, .. }
            | GlucoseCorrection::EntirelyBelowRange { units, .. } => units,
            _ => 0.0,
        }
    }
}

/// A temp basal command. Zero duration cancels any running temp basal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempBasal {
    /// Units per hour.
    pub rate: f64,
    pub duration_minutes: f64,
}

impl TempBasal {
    pub fn cancel() -> Self {
        Self {
            rate: 0.0,
            duration_minutes: 0.0,
        }
    }

    pub fn is_cancel(&self) -> bool {
        self.duration_minutes <= 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BolusNotice {
    GlucoseBelowSuspendThreshold { min_glucose: PredictedGlucoseValue },
    PredictedGlucoseBelowTarget { min_glucose: PredictedGlucoseValue },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DoseRecommendation {
    Automatic {
        /// `None` means leave the current basal delivery as it is.
        #[serde(skip_serializing_if = "Option::is_none")]
        temp_basal: Option<TempBasal>,
        bolus_units: f64,
    },
    Manual {
        amount: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        notice: Option<BolusNotice>,
    },
}

/// Pump and schedule state at the prediction start.
#[derive(Debug, Clone, Copy)]
pub struct DosingContext {
    pub prediction_start: DateTime<Utc>,
    pub scheduled_basal_rate: f64,
    pub sensitivity: f64,
    /// Temp basal running at the prediction start, if any.
    pub active_temp_basal: Option<DoseRecord>,
}

/// Insulin needed to move `from` to `to` given the sensitivity already
/// effected at that point of the action curve.
fn correction_units(from: f64, to: f64, effected_sensitivity: f64) -> Option<f64> {
    (effected_sensitivity > 0.0).then(|| (from - to) / effected_sensitivity)
}

/// Classify the prediction against the target schedule.
pub fn insulin_correction(
    prediction: &[PredictedGlucoseValue],
    targets: &ScheduleTable<TargetRange>,
    suspend_threshold: f64,
    sensitivity: f64,
    model: &InsulinModel,
    prediction_start: DateTime<Utc>,
) -> Result<GlucoseCorrection> {
    let mut min_glucose: Option<PredictedGlucoseValue> = None;
    let mut correcting: Option<(PredictedGlucoseValue, f64)> = None;
    let mut eventual: Option<PredictedGlucoseValue> = None;

    for p in prediction.iter().filter(|p| p.time >= prediction_start) {
        if p.value <= suspend_threshold {
            return Ok(GlucoseCorrection::Suspend { min_glucose: *p });
        }
        eventual = Some(*p);
        if min_glucose.is_none_or(|m| p.value < m.value) {
            min_glucose = Some(*p);
        }
        let elapsed = minutes_between(prediction_start, p.time);
        if elapsed <= 0.0 {
            continue;
        }
        let target = targets.require_at(ScheduleKind::Target, p.time)?;
        let effected = (1.0 - model.percent_effect_remaining(elapsed)) * sensitivity;
        let Some(units) = correction_units(p.value, target.midpoint(), effected) else {
            continue;
        };
        if correcting.is_none_or(|(_, u)| units < u) {
            correcting = Some((*p, units));
        }
    }

    let (Some(min_glucose), Some(eventual)) = (min_glucose, eventual) else {
        return Ok(GlucoseCorrection::InRange);
    };
    let min_target = targets.require_at(ScheduleKind::Target, min_glucose.time)?;
    let eventual_target = targets.require_at(ScheduleKind::Target, eventual.time)?;

    if min_glucose.value < min_target.min && eventual.value < eventual_target.min {
        let elapsed = minutes_between(prediction_start, min_glucose.time);
        let effected = ((1.0 - model.percent_effect_remaining(elapsed)) * sensitivity)
            .max(f64::EPSILON);
        let units = (min_glucose.value - min_target.midpoint()) / effected;
        return Ok(GlucoseCorrection::EntirelyBelowRange { min_glucose, units });
    }
    if eventual.value > eventual_target.max
        && let Some((correcting_glucose, units)) = correcting
    {
        return Ok(GlucoseCorrection::AboveRange {
            min_glucose,
            correcting_glucose,
            units,
        });
    }
    Ok(GlucoseCorrection::InRange)
}

/// Round down to the pump's delivery increment.
pub fn round_to_increment(units: f64, increment: Option<f64>) -> f64 {
    match increment {
        Some(inc) if inc > 0.0 => ((units + 1e-9) / inc).floor() * inc,
        _ => units,
    }
}

/// Temp basal delivering the correction over `duration`, bounded to
/// `[0, max_rate]`.
fn temp_basal_for(
    correction: &GlucoseCorrection,
    scheduled: f64,
    max_rate: f64,
    duration: Duration,
) -> TempBasal {
    let hours = duration_minutes(duration) / 60.0;
    let rate = match correction {
        GlucoseCorrection::Suspend { .. } => 0.0,
        GlucoseCorrection::InRange => scheduled,
        c => scheduled + c.units() / hours,
    };
    TempBasal {
        rate: rate.clamp(0.0, max_rate.max(0.0)),
        duration_minutes: duration_minutes(duration),
    }
}

/// Only issue a command when it changes delivery.
///
/// Returns `None` to leave delivery alone, a cancel when the scheduled rate is
/// wanted while a temp basal runs, and otherwise the new temp basal.
fn if_necessary(
    temp: TempBasal,
    ctx: &DosingContext,
    continuation: Duration,
) -> Option<TempBasal> {
    let running = ctx
        .active_temp_basal
        .filter(|d| d.end_time > ctx.prediction_start);
    if (temp.rate - ctx.scheduled_basal_rate).abs() < RATE_EPSILON {
        return running.map(|_| TempBasal::cancel());
    }
    if let Some(current) = running
        && let Some(rate) = current.rate()
        && (rate - temp.rate).abs() < RATE_EPSILON
        && current.end_time - ctx.prediction_start > continuation
    {
        return None;
    }
    Some(temp)
}

/// Build the recommendation for the configured strategy.
pub fn recommend(
    correction: &GlucoseCorrection,
    ctx: &DosingContext,
    limits: &DosingLimits,
    cfg: &RecommendationCfg,
) -> DoseRecommendation {
    let suspend = matches!(correction, GlucoseCorrection::Suspend { .. });
    let positive_units = match correction {
        GlucoseCorrection::AboveRange { units, .. } if !suspend => units.max(0.0),
        _ => 0.0,
    };

    match cfg.strategy {
        DosingStrategy::TempBasalOnly => {
            let temp = temp_basal_for(
                correction,
                ctx.scheduled_basal_rate,
                limits.max_basal_rate,
                cfg.temp_basal_duration(),
            );
            DoseRecommendation::Automatic {
                temp_basal: if_necessary(temp, ctx, cfg.continuation()),
                bolus_units: 0.0,
            }
        }
        DosingStrategy::AutomaticBolus => {
            // The bolus carries the correction; basal never exceeds schedule.
            let cap = ctx.scheduled_basal_rate.min(limits.max_basal_rate);
            let temp = temp_basal_for(correction, ctx.scheduled_basal_rate, cap, cfg.temp_basal_duration());
            let bolus = (positive_units * cfg.partial_application_factor).min(limits.max_bolus);
            DoseRecommendation::Automatic {
                temp_basal: if_necessary(temp, ctx, cfg.continuation()),
                bolus_units: round_to_increment(bolus.max(0.0), limits.bolus_increment),
            }
        }
        DosingStrategy::ManualBolus => {
            let notice = match *correction {
                GlucoseCorrection::Suspend { min_glucose } => {
                    Some(BolusNotice::GlucoseBelowSuspendThreshold { min_glucose })
                }
                GlucoseCorrection::EntirelyBelowRange { min_glucose, .. } => {
                    Some(BolusNotice::PredictedGlucoseBelowTarget { min_glucose })
                }
                _ => None,
            };
            DoseRecommendation::Manual {
                amount: round_to_increment(positive_units.min(limits.max_bolus), limits.bolus_increment),
                notice,
            }
        }
    }
}
