//! Dynamic carb absorption.
//!
//! Observed counteraction is credited to the carb entries that could be
//! absorbing, bounded below by each entry's slowest plausible absorption.
//! After the prediction start, what is left absorbs linearly.

use chrono::{DateTime, Utc};
use glyco_traits::CarbRecord;
use serde::Serialize;
use tracing::debug;

use crate::config::CarbModelCfg;
use crate::effects::{GlucoseEffect, GlucoseEffectVelocity, zeroed};
use crate::error::{Result, ScheduleKind};
use crate::schedule::ScheduleTable;
use crate::util::{minutes, minutes_between};

/// Absorption state of one carb entry at the prediction start.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarbStatus {
    pub entry: CarbRecord,
    /// Glucose rise per gram (sensitivity / carb ratio at the entry time).
    pub carb_sensitivity: f64,
    pub absorption_minutes: f64,
    pub max_absorption_minutes: f64,
    /// Grams implied by counteraction credited to this entry.
    pub observed_grams: f64,
    pub absorbed_grams: f64,
    pub remaining_grams: f64,
    /// Minutes until the remaining grams finish absorbing.
    pub time_remaining_minutes: f64,
    /// Absorption begins here (entry time plus delay).
    pub absorption_start: DateTime<Utc>,
    #[serde(skip)]
    prediction_start: DateTime<Utc>,
    /// False for entries recorded after the prediction start.
    #[serde(skip)]
    historical: bool,
    /// Cumulative observed grams at each credited interval end.
    #[serde(skip)]
    observed_timeline: Vec<(DateTime<Utc>, f64)>,
}

impl CarbStatus {
    fn min_rate(&self) -> f64 {
        self.entry.grams / self.max_absorption_minutes
    }

    fn observed_at(&self, t: DateTime<Utc>) -> f64 {
        let idx = self.observed_timeline.partition_point(|(end, _)| *end <= t);
        idx.checked_sub(1)
            .map_or(0.0, |i| self.observed_timeline[i].1)
    }

    /// Grams absorbed by `t`. Non-decreasing in `t` and never above the entry.
    pub fn absorbed_at(&self, t: DateTime<Utc>) -> f64 {
        let grams = self.entry.grams;
        if t <= self.absorption_start {
            return 0.0;
        }
        if t <= self.prediction_start {
            if !self.historical {
                return 0.0;
            }
            let floor = self.min_rate() * minutes_between(self.absorption_start, t);
            return self.observed_at(t).min(grams).max(floor.min(grams));
        }
        if self.time_remaining_minutes <= 0.0 {
            return self.absorbed_grams;
        }
        let origin = self.prediction_start.max(self.absorption_start);
        let rate = self.remaining_grams / self.time_remaining_minutes;
        let extra = rate * minutes_between(origin, t).max(0.0);
        (self.absorbed_grams + extra).min(grams)
    }
}

struct EntryState {
    entry: CarbRecord,
    csf: f64,
    absorption: f64,
    max_absorption: f64,
    start: DateTime<Utc>,
    assignable: bool,
    observed_effect: f64,
    timeline: Vec<(DateTime<Utc>, f64)>,
}

impl EntryState {
    fn total_effect(&self) -> f64 {
        self.entry.grams * self.csf
    }

    fn remaining_effect(&self) -> f64 {
        (self.total_effect() - self.observed_effect).max(0.0)
    }

    /// Minimum absorption expressed as glucose rise per minute.
    fn min_effect_rate(&self) -> f64 {
        self.total_effect() / self.max_absorption
    }

    fn is_active(&self, interval_start: DateTime<Utc>) -> bool {
        self.assignable
            && self.start <= interval_start
            && interval_start < self.start + minutes(self.max_absorption)
            && self.remaining_effect() > 0.0
    }

    fn credit(&mut self, effect: f64, at: DateTime<Utc>) {
        self.observed_effect += effect;
        self.timeline.push((at, self.observed_effect / self.csf));
    }
}

/// Absorption status of every entry whose time is at or before
/// `prediction_start`, in input order.
///
/// Entries recorded after the prediction start have absorbed nothing by then:
/// they take no share of counteraction, and all their grams are projected
/// forward over their absorption time.
pub fn carb_statuses(
    entries: &[CarbRecord],
    counteraction: &[GlucoseEffectVelocity],
    carb_ratio: &ScheduleTable<f64>,
    sensitivity: &ScheduleTable<f64>,
    cfg: &CarbModelCfg,
    prediction_start: DateTime<Utc>,
) -> Result<Vec<CarbStatus>> {
    let mut states = Vec::new();
    for entry in entries.iter().filter(|e| e.time <= prediction_start && e.grams > 0.0) {
        let ratio = carb_ratio.require_at(ScheduleKind::CarbRatio, entry.time)?;
        let isf = sensitivity.require_at(ScheduleKind::Sensitivity, entry.time)?;
        let absorption = entry
            .absorption_minutes
            .filter(|m| *m > 0.0)
            .unwrap_or(cfg.default_absorption_minutes);
        states.push(EntryState {
            entry: *entry,
            csf: isf / ratio,
            absorption,
            max_absorption: absorption * cfg.absorption_overrun,
            start: entry.time + cfg.delay(),
            assignable: entry.entered_at.is_none_or(|at| at <= prediction_start),
            observed_effect: 0.0,
            timeline: Vec::new(),
        });
    }

    for v in counteraction.iter().filter(|v| v.end <= prediction_start) {
        let effect = v.effect().max(0.0);
        if effect <= 0.0 {
            continue;
        }
        let active: Vec<usize> = (0..states.len())
            .filter(|&i| states[i].is_active(v.start))
            .collect();
        let total_rate: f64 = active.iter().map(|&i| states[i].min_effect_rate()).sum();
        if active.is_empty() || total_rate <= 0.0 {
            continue;
        }
        let mut unassigned = effect;
        for &i in &active {
            let share = (states[i].min_effect_rate() / total_rate * effect)
                .min(states[i].remaining_effect());
            states[i].credit(share, v.end);
            unassigned -= share;
        }
        // Whatever a capped entry could not take goes to the newest active one.
        if unassigned > 1e-12
            && let Some(&last) = active.last()
        {
            let extra = unassigned.min(states[last].remaining_effect());
            if extra > 0.0 {
                states[last].credit(extra, v.end);
            }
        }
    }

    let statuses = states
        .into_iter()
        .map(|s| {
            let grams = s.entry.grams;
            let min_rate = grams / s.max_absorption;
            let elapsed = if s.assignable {
                minutes_between(s.start, prediction_start).max(0.0)
            } else {
                0.0
            };
            let observed = (s.observed_effect / s.csf).min(grams);
            let absorbed = observed.max((min_rate * elapsed).min(grams));
            let remaining = grams - absorbed;
            let nominal_left = s.absorption - elapsed;
            let time_remaining = if remaining <= 0.0 {
                0.0
            } else if nominal_left > 0.0 {
                nominal_left.min(remaining / min_rate)
            } else {
                remaining / min_rate
            };
            debug!(
                time = %s.entry.time,
                grams,
                observed,
                absorbed,
                time_remaining,
                "carb status"
            );
            CarbStatus {
                entry: s.entry,
                carb_sensitivity: s.csf,
                absorption_minutes: s.absorption,
                max_absorption_minutes: s.max_absorption,
                observed_grams: observed,
                absorbed_grams: absorbed,
                remaining_grams: remaining,
                time_remaining_minutes: time_remaining,
                absorption_start: s.start,
                prediction_start,
                historical: s.assignable,
                observed_timeline: s.timeline,
            }
        })
        .collect();
    Ok(statuses)
}

/// Grams still to absorb after the prediction start.
pub fn carbs_on_board(statuses: &[CarbStatus]) -> f64 {
    statuses.iter().map(|s| s.remaining_grams).sum()
}

/// Cumulative glucose rise from carbs at each grid time, zeroed at the first.
pub fn carb_effects(statuses: &[CarbStatus], grid: &[DateTime<Utc>]) -> Vec<GlucoseEffect> {
    let curve = grid
        .iter()
        .map(|&t| {
            let value = statuses
                .iter()
                .map(|s| s.carb_sensitivity * s.absorbed_at(t))
                .sum();
            GlucoseEffect::new(t, value)
        })
        .collect();
    zeroed(curve)
}
