//! Builder for `ForecastInput`.
//!
//! Histories default to empty except glucose, which must be provided (even if
//! empty) together with all four schedules. `try_build()` reports the first
//! missing piece as a typed `BuildError` inside an `eyre::Report`; unusable
//! schedule values come back as `ForecastError::InvalidInput`.

use glyco_traits::{CarbRecord, DoseRecord, DosingLimits, GlucoseSample, TargetRange};

use crate::config::ForecastSettings;
use crate::error::{BuildError, ScheduleKind};
use crate::schedule::ScheduleTable;
use crate::types::ForecastInput;

#[derive(Debug, Default)]
pub struct ForecastInputBuilder {
    glucose: Option<Vec<GlucoseSample>>,
    doses: Vec<DoseRecord>,
    carbs: Vec<CarbRecord>,
    basal: Option<ScheduleTable<f64>>,
    sensitivity: Option<ScheduleTable<f64>>,
    carb_ratio: Option<ScheduleTable<f64>>,
    target: Option<ScheduleTable<TargetRange>>,
    limits: Option<DosingLimits>,
    settings: Option<ForecastSettings>,
}

impl ForecastInput {
    pub fn builder() -> ForecastInputBuilder {
        ForecastInputBuilder::default()
    }
}

impl ForecastInputBuilder {
    /// Glucose samples; sorted by time on build.
    pub fn with_glucose(mut self, glucose: Vec<GlucoseSample>) -> Self {
        self.glucose = Some(glucose);
        self
    }
    pub fn with_doses(mut self, doses: Vec<DoseRecord>) -> Self {
        self.doses = doses;
        self
    }
    pub fn with_carbs(mut self, carbs: Vec<CarbRecord>) -> Self {
        self.carbs = carbs;
        self
    }
    pub fn with_basal(mut self, basal: ScheduleTable<f64>) -> Self {
        self.basal = Some(basal);
        self
    }
    pub fn with_sensitivity(mut self, sensitivity: ScheduleTable<f64>) -> Self {
        self.sensitivity = Some(sensitivity);
        self
    }
    pub fn with_carb_ratio(mut self, carb_ratio: ScheduleTable<f64>) -> Self {
        self.carb_ratio = Some(carb_ratio);
        self
    }
    pub fn with_target(mut self, target: ScheduleTable<TargetRange>) -> Self {
        self.target = Some(target);
        self
    }
    pub fn with_limits(mut self, limits: DosingLimits) -> Self {
        self.limits = Some(limits);
        self
    }
    pub fn with_settings(mut self, settings: ForecastSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn try_build(self) -> eyre::Result<ForecastInput> {
        let mut glucose = self
            .glucose
            .ok_or_else(|| eyre::Report::new(BuildError::MissingGlucose))?;
        let basal = self
            .basal
            .ok_or_else(|| eyre::Report::new(BuildError::MissingSchedule(ScheduleKind::Basal)))?;
        let sensitivity = self.sensitivity.ok_or_else(|| {
            eyre::Report::new(BuildError::MissingSchedule(ScheduleKind::Sensitivity))
        })?;
        let carb_ratio = self.carb_ratio.ok_or_else(|| {
            eyre::Report::new(BuildError::MissingSchedule(ScheduleKind::CarbRatio))
        })?;
        let target = self
            .target
            .ok_or_else(|| eyre::Report::new(BuildError::MissingSchedule(ScheduleKind::Target)))?;

        let settings = self.settings.unwrap_or_default();
        settings
            .validate()
            .map_err(|msg| eyre::Report::new(BuildError::InvalidConfig(msg)))?;
        if let Some(l) = &self.limits {
            if !(l.max_bolus.is_finite() && l.max_bolus >= 0.0) {
                return Err(eyre::Report::new(BuildError::InvalidConfig(
                    "max_bolus must be >= 0",
                )));
            }
            if !(l.max_basal_rate.is_finite() && l.max_basal_rate >= 0.0) {
                return Err(eyre::Report::new(BuildError::InvalidConfig(
                    "max_basal_rate must be >= 0",
                )));
            }
            if !(l.suspend_threshold.is_finite() && l.suspend_threshold > 0.0) {
                return Err(eyre::Report::new(BuildError::InvalidConfig(
                    "suspend_threshold must be > 0",
                )));
            }
        }

        glucose.sort_by_key(|s| s.time);
        let mut doses = self.doses;
        doses.sort_by_key(|d| d.start_time);
        let mut carbs = self.carbs;
        carbs.sort_by_key(|c| c.time);

        let input = ForecastInput {
            glucose,
            doses,
            carbs,
            basal,
            sensitivity,
            carb_ratio,
            target,
            limits: self.limits,
            settings,
        };
        // Schedule values and the floor/threshold pairing.
        input.validate().map_err(eyre::Report::new)?;
        Ok(input)
    }
}
