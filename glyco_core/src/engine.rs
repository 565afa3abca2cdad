//! The forecast pipeline.
//!
//! Annotate doses, derive the insulin effect, measure counteraction, attribute
//! it to carbs, correct for what remains unexplained, add momentum, then sum
//! the enabled curves from the latest glucose sample. Every curve shares one
//! grid anchored at the prediction start.

use chrono::{DateTime, Utc};
use glyco_traits::GlucoseSample;

use crate::annotation::{active_temp_basal, annotate, trim_to};
use crate::carbs::{carb_effects, carb_statuses, carbs_on_board};
use crate::counteraction::counteraction_effects;
use crate::effects::GlucoseEffect;
use crate::error::{ForecastError, Result, ScheduleKind};
use crate::insulin::{insulin_effects, insulin_on_board};
use crate::momentum::momentum_effect;
use crate::prediction::{apply_floor, predict_glucose};
use crate::recommendation::{DosingContext, insulin_correction, recommend};
use crate::retrospective::{CorrectionContext, retrospective_correction};
use crate::types::{ForecastInput, ForecastOutput};
use crate::util::grid_points;

/// Glucose samples at or before `now`, checked for strict time order.
fn usable_glucose(glucose: &[GlucoseSample], now: DateTime<Utc>) -> Result<&[GlucoseSample]> {
    if let Some(i) = glucose.windows(2).position(|w| w[1].time <= w[0].time) {
        return Err(ForecastError::InvalidInput(format!(
            "glucose samples must be strictly increasing in time (index {})",
            i + 1
        )));
    }
    if let Some(s) = glucose.iter().find(|s| !s.value.is_finite()) {
        return Err(ForecastError::InvalidInput(format!(
            "non-finite glucose value at {}",
            s.time
        )));
    }
    let upto = glucose.partition_point(|s| s.time <= now);
    Ok(&glucose[..upto])
}

/// Produce a forecast from `input` as of `now`.
///
/// The prediction starts at the latest glucose sample at or before `now`.
/// Identical inputs always give identical outputs.
pub fn forecast(input: &ForecastInput, now: DateTime<Utc>) -> Result<ForecastOutput> {
    input.validate()?;
    let settings = &input.settings;

    let glucose = usable_glucose(&input.glucose, now)?;
    let (Some(first), Some(latest)) = (glucose.first(), glucose.last()) else {
        return Err(ForecastError::MissingGlucoseHistory);
    };
    let start = latest.time;
    let delta = settings.delta();
    let model = settings.insulin_model;

    let basal_rate = input.basal.require_at(ScheduleKind::Basal, start)?;
    let sensitivity = input.sensitivity.require_at(ScheduleKind::Sensitivity, start)?;
    let target = input.target.require_at(ScheduleKind::Target, start)?;

    let full_grid = grid_points(first.time, start + settings.horizon(), start, delta);
    let history_grid: Vec<DateTime<Utc>> =
        full_grid.iter().copied().filter(|t| *t <= start).collect();

    // Insulin
    let doses = trim_to(&input.doses, now);
    let annotated = annotate(&doses, &input.basal);
    let insulin = insulin_effects(
        &annotated,
        &model,
        &input.sensitivity,
        settings.sensitivity_mode,
        &full_grid,
        delta,
    )?;
    let iob = insulin_on_board(&annotated, &model, start, delta);

    // Counteraction and carbs
    let ice = counteraction_effects(glucose, &insulin, &history_grid, settings.glucose_tolerance());
    let statuses = carb_statuses(
        &input.carbs,
        &ice,
        &input.carb_ratio,
        &input.sensitivity,
        &settings.carbs,
        start,
    )?;
    let carbs = carb_effects(&statuses, &full_grid);
    let cob = carbs_on_board(&statuses);

    // Retrospective correction and momentum
    let rc = retrospective_correction(
        &ice,
        &carbs,
        &CorrectionContext {
            latest_glucose: *latest,
            sensitivity,
            basal_rate,
            target,
        },
        &settings.retrospective,
        start,
        delta,
    );
    let momentum = momentum_effect(glucose, &settings.momentum, delta, settings.glucose_tolerance());

    let enabled = settings.effects;
    let mut curves: Vec<&[GlucoseEffect]> = Vec::with_capacity(4);
    if enabled.insulin {
        curves.push(&insulin);
    }
    if enabled.carbs {
        curves.push(&carbs);
    }
    if enabled.retrospective_correction {
        curves.push(&rc.effects);
    }
    if enabled.momentum {
        curves.push(&momentum);
    }
    // Classification sees the raw curve; the floor only bounds what is reported.
    let raw = predict_glucose(latest, settings.horizon(), delta, &curves);
    let predicted = apply_floor(&raw, settings.prediction_floor);

    let (correction, recommendation) = match input.limits {
        None => (None, None),
        Some(_) if now - start > settings.recommendation.max_glucose_age() => {
            tracing::warn!(
                glucose_time = %start,
                now = %now,
                "latest glucose too old; recommendation withheld"
            );
            (None, None)
        }
        Some(limits) => {
            let correction = insulin_correction(
                &raw,
                &input.target,
                limits.suspend_threshold,
                sensitivity,
                &model,
                start,
            )?;
            let ctx = DosingContext {
                prediction_start: start,
                scheduled_basal_rate: basal_rate,
                sensitivity,
                active_temp_basal: active_temp_basal(&input.doses, start),
            };
            let rec = recommend(&correction, &ctx, &limits, &settings.recommendation);
            (Some(correction), Some(rec))
        }
    };

    tracing::info!(
        prediction_start = %start,
        eventual = predicted.last().map_or(f64::NAN, |p| p.value),
        points = predicted.len(),
        iob,
        cob,
        ice_intervals = ice.len(),
        "forecast complete"
    );

    Ok(ForecastOutput {
        prediction_start: start,
        predicted_glucose: predicted,
        insulin_effects: insulin,
        carb_effects: carbs,
        retrospective_effects: rc.effects,
        momentum_effects: momentum,
        insulin_counteraction: ice,
        carb_statuses: statuses,
        insulin_on_board: iob,
        carbs_on_board: cob,
        retrospective_discrepancy: rc.clamped_discrepancy,
        correction,
        recommendation,
    })
}
