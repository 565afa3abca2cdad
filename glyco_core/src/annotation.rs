//! Dose annotation against the basal schedule, and grid-aligned delivery.
//!
//! A basal-like dose only moves glucose by how far it departs from the
//! scheduled basal it replaced, so each one is split at basal schedule
//! boundaries and measured against the rate of its piece.

use chrono::{DateTime, Duration, Utc};
use glyco_traits::{DoseKind, DoseRecord};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::schedule::ScheduleTable;
use crate::util::{duration_minutes, floor_to_grid, minutes_between};

/// A dose (or piece of one) paired with the scheduled basal rate it ran against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedDose {
    pub dose: DoseRecord,
    /// Scheduled rate (U/h) for basal-like pieces; `None` for boluses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_basal_rate: Option<f64>,
}

impl AnnotatedDose {
    pub fn bolus(dose: DoseRecord) -> Self {
        Self {
            dose,
            scheduled_basal_rate: None,
        }
    }

    #[inline]
    pub fn start(&self) -> DateTime<Utc> {
        self.dose.start_time
    }

    #[inline]
    pub fn end(&self) -> DateTime<Utc> {
        self.dose.end_time
    }

    #[inline]
    pub fn kind(&self) -> DoseKind {
        self.dose.kind
    }

    /// Volume acting on glucose: the departure from scheduled basal for
    /// basal-like pieces, the whole volume otherwise.
    pub fn relative_volume(&self) -> f64 {
        let volume = self.dose.effective_volume();
        match self.scheduled_basal_rate {
            Some(rate) if self.dose.hours() > 0.0 => volume - rate * self.dose.hours(),
            _ => volume,
        }
    }
}

/// Copy of `dose` restricted to `[start, end)` with volumes prorated by time.
fn prorate(dose: &DoseRecord, start: DateTime<Utc>, end: DateTime<Utc>) -> DoseRecord {
    let total = minutes_between(dose.start_time, dose.end_time);
    let fraction = if total > 0.0 {
        minutes_between(start, end) / total
    } else {
        1.0
    };
    DoseRecord {
        start_time: start,
        end_time: end,
        programmed_volume: dose.programmed_volume * fraction,
        delivered_volume: dose.delivered_volume.map(|v| v * fraction),
        ..*dose
    }
}

/// Cut basal-like doses that run past `until` back to it; later doses are dropped.
pub fn trim_to(doses: &[DoseRecord], until: DateTime<Utc>) -> Vec<DoseRecord> {
    doses
        .iter()
        .filter(|d| d.start_time <= until)
        .map(|d| {
            if d.kind.is_basal_like() && d.end_time > until {
                prorate(d, d.start_time, until)
            } else {
                *d
            }
        })
        .collect()
}

/// Annotate doses with the scheduled basal rate, splitting basal-like doses at
/// schedule boundaries.
///
/// Basal-like pieces not covered by the schedule are dropped with a warning.
/// Output is ordered by start time.
pub fn annotate(doses: &[DoseRecord], basal: &ScheduleTable<f64>) -> Vec<AnnotatedDose> {
    let mut out = Vec::with_capacity(doses.len());
    for dose in doses {
        if !dose.kind.is_basal_like() {
            out.push(AnnotatedDose::bolus(*dose));
            continue;
        }
        if dose.end_time <= dose.start_time {
            // Instantaneous: the full volume counts regardless of the schedule.
            out.push(AnnotatedDose {
                dose: *dose,
                scheduled_basal_rate: basal.value_at(dose.start_time),
            });
            continue;
        }

        let pieces = basal.between(dose.start_time, dose.end_time);
        let covered: f64 = pieces.iter().map(|e| minutes_between(e.start, e.end)).sum();
        let length = minutes_between(dose.start_time, dose.end_time);
        if covered + 1e-9 < length {
            warn!(
                kind = dose.kind.as_str(),
                start = %dose.start_time,
                end = %dose.end_time,
                uncovered_minutes = length - covered,
                "basal schedule does not cover dose; uncovered portion ignored"
            );
        }
        for entry in pieces {
            out.push(AnnotatedDose {
                dose: prorate(dose, entry.start, entry.end),
                scheduled_basal_rate: Some(entry.value),
            });
        }
    }
    out.sort_by_key(|d| d.start());
    out
}

/// Delivery attributed to one grid interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeliverySegment {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub volume: f64,
    /// Units per hour over the whole grid interval.
    pub rate: f64,
}

/// Split a dose's effective volume over the grid intervals it touches.
///
/// Volume is assigned by overlap, so the first and last segments are partial
/// when the dose is not grid-aligned. Segment volumes sum to the dose volume.
/// An instantaneous dose lands whole in the interval containing it.
pub fn delivery_segments(
    dose: &DoseRecord,
    anchor: DateTime<Utc>,
    delta: Duration,
) -> Vec<DeliverySegment> {
    let step_hours = duration_minutes(delta) / 60.0;
    if step_hours <= 0.0 {
        return Vec::new();
    }
    let volume = dose.effective_volume();
    let mut t = floor_to_grid(dose.start_time, anchor, delta);

    if dose.end_time <= dose.start_time {
        return vec![DeliverySegment {
            start: t,
            end: t + delta,
            volume,
            rate: volume / step_hours,
        }];
    }

    let length = minutes_between(dose.start_time, dose.end_time);
    let mut out = Vec::new();
    while t < dose.end_time {
        let next = t + delta;
        let overlap = minutes_between(t.max(dose.start_time), next.min(dose.end_time));
        if overlap > 0.0 {
            let v = volume * overlap / length;
            out.push(DeliverySegment {
                start: t,
                end: next,
                volume: v,
                rate: v / step_hours,
            });
        }
        t = next;
    }
    out
}

/// Total delivery rate in each grid interval over `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRatePoint {
    pub time: DateTime<Utc>,
    /// Units per hour.
    pub rate: f64,
}

pub fn delivery_rate_timeline(
    doses: &[DoseRecord],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    delta: Duration,
) -> Vec<DeliveryRatePoint> {
    let grid = crate::util::grid_points(start, end, start, delta);
    let mut points: Vec<DeliveryRatePoint> = grid
        .iter()
        .filter(|&&t| t < end)
        .map(|&time| DeliveryRatePoint { time, rate: 0.0 })
        .collect();
    for dose in doses {
        for seg in delivery_segments(dose, start, delta) {
            if let Ok(i) = points.binary_search_by(|p| p.time.cmp(&seg.start)) {
                points[i].rate += seg.rate;
            }
        }
    }
    points
}

/// The temporary basal running at `t`, if any.
pub fn active_temp_basal(doses: &[DoseRecord], t: DateTime<Utc>) -> Option<DoseRecord> {
    doses
        .iter()
        .filter(|d| d.kind == DoseKind::TemporaryBasal && d.start_time <= t && t < d.end_time)
        .max_by_key(|d| d.start_time)
        .copied()
}
