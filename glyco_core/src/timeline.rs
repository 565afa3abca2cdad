//! Coarse insulin timeline over a long window, for trend display.

use chrono::{DateTime, Duration, Utc};
use glyco_traits::DoseRecord;
use serde::Serialize;

use crate::annotation::{annotate, trim_to};
use crate::config::SensitivityMode;
use crate::error::{ForecastError, Result};
use crate::insulin::{InsulinModel, insulin_effects, insulin_on_board};
use crate::schedule::ScheduleTable;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EffectsTimelinePoint {
    pub time: DateTime<Utc>,
    pub insulin_on_board: f64,
    /// Glucose change attributed to insulin over the stride ending here.
    pub net_insulin_effect: f64,
}

/// Insulin-on-board and net insulin effect every `stride` over `[start, end]`.
///
/// Each point only sees doses delivered up to its own time.
pub fn effects_timeline(
    doses: &[DoseRecord],
    basal: &ScheduleTable<f64>,
    sensitivity: &ScheduleTable<f64>,
    model: &InsulinModel,
    mode: SensitivityMode,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    stride: Duration,
) -> Result<Vec<EffectsTimelinePoint>> {
    if stride <= Duration::zero() {
        return Err(ForecastError::InvalidInput("timeline stride must be positive".into()));
    }
    if end < start {
        return Err(ForecastError::InvalidInput("timeline end precedes start".into()));
    }
    let mut out = Vec::new();
    let mut t = start;
    while t <= end {
        let annotated = annotate(&trim_to(doses, t), basal);
        let iob = insulin_on_board(&annotated, model, t, stride);
        let effect = insulin_effects(&annotated, model, sensitivity, mode, &[t - stride, t], stride)?;
        out.push(EffectsTimelinePoint {
            time: t,
            insulin_on_board: iob,
            net_insulin_effect: effect.last().map_or(0.0, |e| e.value),
        });
        t += stride;
    }
    Ok(out)
}
