//! Records and seams shared between the forecasting core and its collaborators.
//!
//! Everything here is plain data: the History Provider hands these records to
//! the core, and the core never mutates them.

pub mod clock;
pub mod records;

pub use clock::{Clock, FixedClock, SystemClock};
pub use records::{
    CarbRecord, DoseKind, DoseRecord, DosingLimits, GlucoseSample, ScheduleEntry, TargetRange,
};

use chrono::{DateTime, Utc};

/// Error type crossing the provider seam.
pub type ProviderError = Box<dyn std::error::Error + Send + Sync>;

/// Source of historical records for a requested interval.
///
/// Every query returns records sorted ascending by start time. Implementations
/// may be backed by remote sync clients, files, or memory; the core only sees
/// the snapshot they return.
pub trait HistoryProvider {
    fn glucose_samples(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<GlucoseSample>, ProviderError>;

    fn dose_records(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DoseRecord>, ProviderError>;

    fn carb_records(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CarbRecord>, ProviderError>;

    /// Scheduled basal rate in units per hour.
    fn basal_schedule(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ScheduleEntry<f64>>, ProviderError>;

    /// Insulin sensitivity in concentration units per insulin unit.
    fn sensitivity_schedule(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ScheduleEntry<f64>>, ProviderError>;

    /// Carb ratio in grams per insulin unit.
    fn carb_ratio_schedule(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ScheduleEntry<f64>>, ProviderError>;

    fn target_schedule(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ScheduleEntry<TargetRange>>, ProviderError>;

    /// Point-in-time dosing limits; `None` when recommendations are disabled.
    fn dosing_limits(&self, at: DateTime<Utc>) -> Result<Option<DosingLimits>, ProviderError>;
}
