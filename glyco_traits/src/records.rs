//! Immutable value records exchanged with the History Provider.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One continuous-glucose reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlucoseSample {
    pub time: DateTime<Utc>,
    /// Concentration (mg/dL unless the whole input uses another unit).
    pub value: f64,
    /// Sensor-reported rate of change per minute, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend_rate: Option<f64>,
}

impl GlucoseSample {
    pub fn new(time: DateTime<Utc>, value: f64) -> Self {
        Self {
            time,
            value,
            trend_rate: None,
        }
    }
}

/// Closed set of insulin delivery kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoseKind {
    Bolus,
    ScheduledBasal,
    TemporaryBasal,
    Suspend,
}

impl DoseKind {
    /// Basal-like kinds are measured against the scheduled basal baseline.
    pub fn is_basal_like(self) -> bool {
        !matches!(self, DoseKind::Bolus)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DoseKind::Bolus => "bolus",
            DoseKind::ScheduledBasal => "scheduled_basal",
            DoseKind::TemporaryBasal => "temporary_basal",
            DoseKind::Suspend => "suspend",
        }
    }
}

/// A single insulin delivery as reported by the pump history.
///
/// Invariant: `end_time >= start_time`; a bolus has `end_time == start_time`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DoseRecord {
    pub kind: DoseKind,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Units the pump was asked to deliver.
    pub programmed_volume: f64,
    /// Units actually delivered, when the pump reported it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_volume: Option<f64>,
    #[serde(default)]
    pub is_automatic: bool,
}

impl DoseRecord {
    pub fn bolus(time: DateTime<Utc>, units: f64) -> Self {
        Self {
            kind: DoseKind::Bolus,
            start_time: time,
            end_time: time,
            programmed_volume: units,
            delivered_volume: None,
            is_automatic: false,
        }
    }

    /// Temporary basal programmed at `rate` units/hour over `[start, end)`.
    pub fn temp_basal(start: DateTime<Utc>, end: DateTime<Utc>, rate: f64) -> Self {
        Self::basal_like(DoseKind::TemporaryBasal, start, end, rate)
    }

    pub fn scheduled_basal(start: DateTime<Utc>, end: DateTime<Utc>, rate: f64) -> Self {
        Self::basal_like(DoseKind::ScheduledBasal, start, end, rate)
    }

    pub fn suspend(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self::basal_like(DoseKind::Suspend, start, end, 0.0)
    }

    fn basal_like(kind: DoseKind, start: DateTime<Utc>, end: DateTime<Utc>, rate: f64) -> Self {
        let hours = hours_between(start, end);
        Self {
            kind,
            start_time: start,
            end_time: end,
            programmed_volume: rate * hours,
            delivered_volume: None,
            is_automatic: false,
        }
    }

    pub fn with_delivered(mut self, units: f64) -> Self {
        self.delivered_volume = Some(units);
        self
    }

    pub fn automatic(mut self) -> Self {
        self.is_automatic = true;
        self
    }

    /// Delivered volume when known, otherwise the programmed volume.
    pub fn effective_volume(&self) -> f64 {
        self.delivered_volume.unwrap_or(self.programmed_volume)
    }

    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    pub fn hours(&self) -> f64 {
        hours_between(self.start_time, self.end_time)
    }

    /// Average delivery rate in units/hour; `None` for instantaneous deliveries.
    pub fn rate(&self) -> Option<f64> {
        let hours = self.hours();
        (hours > 0.0).then(|| self.effective_volume() / hours)
    }
}

/// A carbohydrate entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CarbRecord {
    /// Physiological start of absorption.
    pub time: DateTime<Utc>,
    pub grams: f64,
    /// Expected absorption time in minutes, when the user supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub absorption_minutes: Option<f64>,
    /// When the entry was recorded, if different from `time`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entered_at: Option<DateTime<Utc>>,
}

impl CarbRecord {
    pub fn new(time: DateTime<Utc>, grams: f64) -> Self {
        Self {
            time,
            grams,
            absorption_minutes: None,
            entered_at: None,
        }
    }

    pub fn with_absorption_minutes(mut self, minutes: f64) -> Self {
        self.absorption_minutes = Some(minutes);
        self
    }

    pub fn with_entered_at(mut self, at: DateTime<Utc>) -> Self {
        self.entered_at = Some(at);
        self
    }
}

/// One interval of a schedule: `value` applies over `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry<V> {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub value: V,
}

impl<V> ScheduleEntry<V> {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, value: V) -> Self {
        Self { start, end, value }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }
}

/// Correction target, a closed concentration interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetRange {
    pub min: f64,
    pub max: f64,
}

impl TargetRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

/// Safety limits applied to any dosing recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DosingLimits {
    /// Largest bolus ever recommended (units).
    pub max_bolus: f64,
    /// Largest temporary basal rate ever recommended (units/hour).
    pub max_basal_rate: f64,
    /// No insulin is recommended when any prediction is at or below this.
    pub suspend_threshold: f64,
    /// Pump delivery increment; recommendations are rounded down to it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bolus_increment: Option<f64>,
}

#[inline]
fn hours_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 3_600_000.0
}
