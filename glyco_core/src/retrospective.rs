//! Retrospective correction.
//!
//! Recent counteraction that carbs do not explain is treated as an unmodeled
//! effect that persists briefly: it is summed over a short window, clamped,
//! and projected forward as a linearly decaying velocity.

use chrono::{DateTime, Duration, Utc};
use glyco_traits::{GlucoseSample, TargetRange};
use serde::Serialize;
use tracing::debug;

use crate::config::RetrospectiveCfg;
use crate::effects::{GlucoseEffect, GlucoseEffectVelocity, change_between, decaying_rate_effect};
use crate::util::{duration_minutes, minutes_between};

/// Unexplained glucose change over one counteraction interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Discrepancy {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub value: f64,
}

/// Settings in force at the prediction start.
#[derive(Debug, Clone, Copy)]
pub struct CorrectionContext {
    pub latest_glucose: GlucoseSample,
    pub sensitivity: f64,
    pub basal_rate: f64,
    pub target: TargetRange,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RetrospectiveCorrection {
    pub effects: Vec<GlucoseEffect>,
    /// Summed discrepancy over the grouping window, before clamping.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_discrepancy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clamped_discrepancy: Option<f64>,
}

/// Counteraction minus the carb velocity over the same interval, as a total.
pub fn discrepancies(
    counteraction: &[GlucoseEffectVelocity],
    carb_effects: &[GlucoseEffect],
) -> Vec<Discrepancy> {
    counteraction
        .iter()
        .map(|v| {
            let carbs = change_between(carb_effects, v.start, v.end).unwrap_or(0.0);
            Discrepancy {
                start: v.start,
                end: v.end,
                value: v.effect() - carbs,
            }
        })
        .collect()
}

/// Bounds on the summed discrepancy, from the dose a zero temp could offset.
fn clamp_discrepancy(sum: f64, ctx: &CorrectionContext) -> f64 {
    let zero_temp = (ctx.sensitivity * ctx.basal_rate).abs();
    let error = ctx.latest_glucose.value - ctx.target.midpoint();
    let upper = (error + zero_temp).clamp(0.5 * zero_temp, 4.0 * zero_temp);
    let lower = -(10.0_f64.max(error));
    sum.clamp(lower.min(0.0), upper.max(0.0))
}

/// Correction effect starting at `prediction_start`.
///
/// Empty when there is no discrepancy, or when the newest one ends earlier than
/// the recency limit before the prediction start.
pub fn retrospective_correction(
    counteraction: &[GlucoseEffectVelocity],
    carb_effects: &[GlucoseEffect],
    ctx: &CorrectionContext,
    cfg: &RetrospectiveCfg,
    prediction_start: DateTime<Utc>,
    delta: Duration,
) -> RetrospectiveCorrection {
    let all = discrepancies(counteraction, carb_effects);
    let Some(latest) = all.iter().filter(|d| d.end <= prediction_start).max_by_key(|d| d.end)
    else {
        return RetrospectiveCorrection::default();
    };
    if latest.end < prediction_start - cfg.recency() {
        debug!(latest_end = %latest.end, "discrepancy too old; no retrospective correction");
        return RetrospectiveCorrection::default();
    }

    let window_start = prediction_start - cfg.grouping();
    let in_window: Vec<&Discrepancy> = all
        .iter()
        .filter(|d| d.start >= window_start && d.end <= prediction_start)
        .collect();
    let (Some(first), Some(last)) = (
        in_window.iter().map(|d| d.start).min(),
        in_window.iter().map(|d| d.end).max(),
    ) else {
        return RetrospectiveCorrection::default();
    };
    let sum: f64 = in_window.iter().map(|d| d.value).sum();
    let clamped = clamp_discrepancy(sum, ctx);
    let span = minutes_between(first, last).max(duration_minutes(cfg.grouping()));
    let velocity = clamped / span;
    debug!(sum, clamped, velocity, "retrospective discrepancy");

    RetrospectiveCorrection {
        effects: decaying_rate_effect(prediction_start, velocity, cfg.effect(), delta),
        total_discrepancy: Some(sum),
        clamped_discrepancy: Some(clamped),
    }
}
