//! In-memory `HistoryProvider` backed by vectors and daily schedules.
//!
//! Used by the CLI for file-loaded histories and by tests.

use chrono::{DateTime, Utc};
use glyco_traits::{
    CarbRecord, DoseRecord, DosingLimits, GlucoseSample, HistoryProvider, ProviderError,
    ScheduleEntry, TargetRange,
};

use crate::schedule::DailySchedule;

#[derive(Debug, Clone)]
pub struct InMemoryHistory {
    pub glucose: Vec<GlucoseSample>,
    pub doses: Vec<DoseRecord>,
    pub carbs: Vec<CarbRecord>,
    pub basal: DailySchedule<f64>,
    pub sensitivity: DailySchedule<f64>,
    pub carb_ratio: DailySchedule<f64>,
    pub target: DailySchedule<TargetRange>,
    pub limits: Option<DosingLimits>,
}

impl InMemoryHistory {
    /// Empty histories with the given schedules. Records are sorted on insert.
    pub fn new(
        basal: DailySchedule<f64>,
        sensitivity: DailySchedule<f64>,
        carb_ratio: DailySchedule<f64>,
        target: DailySchedule<TargetRange>,
    ) -> Self {
        Self {
            glucose: Vec::new(),
            doses: Vec::new(),
            carbs: Vec::new(),
            basal,
            sensitivity,
            carb_ratio,
            target,
            limits: None,
        }
    }

    pub fn with_glucose(mut self, mut glucose: Vec<GlucoseSample>) -> Self {
        glucose.sort_by_key(|s| s.time);
        self.glucose = glucose;
        self
    }

    pub fn with_doses(mut self, mut doses: Vec<DoseRecord>) -> Self {
        doses.sort_by_key(|d| d.start_time);
        self.doses = doses;
        self
    }

    pub fn with_carbs(mut self, mut carbs: Vec<CarbRecord>) -> Self {
        carbs.sort_by_key(|c| c.time);
        self.carbs = carbs;
        self
    }

    pub fn with_limits(mut self, limits: DosingLimits) -> Self {
        self.limits = Some(limits);
        self
    }
}

impl HistoryProvider for InMemoryHistory {
    fn glucose_samples(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<GlucoseSample>, ProviderError> {
        Ok(self
            .glucose
            .iter()
            .filter(|s| start <= s.time && s.time <= end)
            .copied()
            .collect())
    }

    /// Doses overlapping `[start, end]`.
    fn dose_records(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DoseRecord>, ProviderError> {
        Ok(self
            .doses
            .iter()
            .filter(|d| d.end_time >= start && d.start_time <= end)
            .copied()
            .collect())
    }

    fn carb_records(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CarbRecord>, ProviderError> {
        Ok(self
            .carbs
            .iter()
            .filter(|c| start <= c.time && c.time <= end)
            .copied()
            .collect())
    }

    fn basal_schedule(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ScheduleEntry<f64>>, ProviderError> {
        Ok(self.basal.table_between(start, end).entries().to_vec())
    }

    fn sensitivity_schedule(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ScheduleEntry<f64>>, ProviderError> {
        Ok(self.sensitivity.table_between(start, end).entries().to_vec())
    }

    fn carb_ratio_schedule(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ScheduleEntry<f64>>, ProviderError> {
        Ok(self.carb_ratio.table_between(start, end).entries().to_vec())
    }

    fn target_schedule(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ScheduleEntry<TargetRange>>, ProviderError> {
        Ok(self.target.table_between(start, end).entries().to_vec())
    }

    fn dosing_limits(&self, _at: DateTime<Utc>) -> Result<Option<DosingLimits>, ProviderError> {
        Ok(self.limits)
    }
}
