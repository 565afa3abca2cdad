//! `From` implementations bridging `glyco_config` types to `glyco_core` types.

use glyco_traits::{DosingLimits, TargetRange};

use crate::config::{
    CarbModelCfg, DosingStrategy, EnabledEffects, ForecastSettings, MomentumCfg,
    RecommendationCfg, RetrospectiveCfg, SensitivityMode,
};
use crate::error::{ForecastError, Result};
use crate::insulin::InsulinModel;
use crate::memory::InMemoryHistory;
use crate::schedule::DailySchedule;

// ── Enums ────────────────────────────────────────────────────────────────────

impl From<glyco_config::InsulinModelKind> for InsulinModel {
    fn from(k: glyco_config::InsulinModelKind) -> Self {
        match k {
            glyco_config::InsulinModelKind::RapidActingAdult => InsulinModel::RapidActingAdult,
            glyco_config::InsulinModelKind::RapidActingChild => InsulinModel::RapidActingChild,
            glyco_config::InsulinModelKind::Fiasp => InsulinModel::Fiasp,
            glyco_config::InsulinModelKind::Lyumjev => InsulinModel::Lyumjev,
            glyco_config::InsulinModelKind::Afrezza => InsulinModel::Afrezza,
        }
    }
}

impl From<glyco_config::SensitivityMode> for SensitivityMode {
    fn from(m: glyco_config::SensitivityMode) -> Self {
        match m {
            glyco_config::SensitivityMode::DoseStart => SensitivityMode::DoseStart,
            glyco_config::SensitivityMode::EffectTime => SensitivityMode::EffectTime,
        }
    }
}

impl From<glyco_config::DosingStrategy> for DosingStrategy {
    fn from(s: glyco_config::DosingStrategy) -> Self {
        match s {
            glyco_config::DosingStrategy::TempBasalOnly => DosingStrategy::TempBasalOnly,
            glyco_config::DosingStrategy::AutomaticBolus => DosingStrategy::AutomaticBolus,
            glyco_config::DosingStrategy::ManualBolus => DosingStrategy::ManualBolus,
        }
    }
}

// ── Sections ─────────────────────────────────────────────────────────────────

impl From<&glyco_config::EffectsCfg> for EnabledEffects {
    fn from(c: &glyco_config::EffectsCfg) -> Self {
        Self {
            insulin: c.insulin,
            carbs: c.carbs,
            retrospective_correction: c.retrospective_correction,
            momentum: c.momentum,
        }
    }
}

impl From<&glyco_config::CarbsCfg> for CarbModelCfg {
    fn from(c: &glyco_config::CarbsCfg) -> Self {
        Self {
            default_absorption_minutes: c.default_absorption_minutes,
            absorption_overrun: c.absorption_overrun,
            delay_minutes: c.delay_minutes,
        }
    }
}

impl From<&glyco_config::RetrospectiveCfg> for RetrospectiveCfg {
    fn from(c: &glyco_config::RetrospectiveCfg) -> Self {
        Self {
            grouping_minutes: c.grouping_minutes,
            effect_minutes: c.effect_minutes,
            recency_minutes: c.recency_minutes,
        }
    }
}

impl From<&glyco_config::MomentumCfg> for MomentumCfg {
    fn from(c: &glyco_config::MomentumCfg) -> Self {
        Self {
            window_minutes: c.window_minutes,
            duration_minutes: c.duration_minutes,
            min_samples: c.min_samples,
        }
    }
}

impl From<&glyco_config::DosingCfg> for RecommendationCfg {
    fn from(c: &glyco_config::DosingCfg) -> Self {
        Self {
            strategy: c.strategy.into(),
            partial_application_factor: c.partial_application_factor,
            temp_basal_minutes: c.temp_basal_minutes,
            max_glucose_age_minutes: c.max_glucose_age_minutes,
            ..RecommendationCfg::default()
        }
    }
}

/// Dosing limits from the `[limits]` section.
pub fn dosing_limits(c: &glyco_config::Limits) -> DosingLimits {
    DosingLimits {
        max_bolus: c.max_bolus,
        max_basal_rate: c.max_basal_rate,
        suspend_threshold: c.suspend_threshold,
        bolus_increment: c.bolus_increment,
    }
}

impl From<&glyco_config::Config> for ForecastSettings {
    fn from(c: &glyco_config::Config) -> Self {
        Self {
            delta_minutes: c.algorithm.delta_minutes,
            glucose_tolerance_minutes: c.algorithm.glucose_tolerance_minutes,
            insulin_model: c.algorithm.insulin_model.into(),
            sensitivity_mode: c.algorithm.sensitivity_mode.into(),
            effects: (&c.effects).into(),
            carbs: (&c.carbs).into(),
            retrospective: (&c.retrospective).into(),
            momentum: (&c.momentum).into(),
            recommendation: (&c.dosing).into(),
            prediction_floor: c.algorithm.prediction_floor,
        }
    }
}

// ── Schedules ────────────────────────────────────────────────────────────────

fn offset(start: &str, minutes: Option<u32>) -> Result<u32> {
    minutes.ok_or_else(|| ForecastError::InvalidInput(format!("invalid schedule start {start:?}")))
}

impl TryFrom<&[glyco_config::ScheduleItem]> for DailySchedule<f64> {
    type Error = ForecastError;

    fn try_from(items: &[glyco_config::ScheduleItem]) -> Result<Self> {
        let items = items
            .iter()
            .map(|i| -> Result<(u32, f64)> { Ok((offset(&i.start, i.start_minutes())?, i.value)) })
            .collect::<Result<Vec<_>>>()?;
        DailySchedule::new(items)
    }
}

impl TryFrom<&[glyco_config::TargetItem]> for DailySchedule<TargetRange> {
    type Error = ForecastError;

    fn try_from(items: &[glyco_config::TargetItem]) -> Result<Self> {
        let items = items
            .iter()
            .map(|i| -> Result<(u32, TargetRange)> {
                Ok((offset(&i.start, i.start_minutes())?, TargetRange::new(i.min, i.max)))
            })
            .collect::<Result<Vec<_>>>()?;
        DailySchedule::new(items)
    }
}

impl TryFrom<&glyco_config::Schedules> for InMemoryHistory {
    type Error = ForecastError;

    /// Empty histories over the configured daily schedules.
    fn try_from(s: &glyco_config::Schedules) -> Result<Self> {
        Ok(InMemoryHistory::new(
            DailySchedule::try_from(s.basal.as_slice())?,
            DailySchedule::try_from(s.sensitivity.as_slice())?,
            DailySchedule::try_from(s.carb_ratio.as_slice())?,
            DailySchedule::try_from(s.target.as_slice())?,
        ))
    }
}
