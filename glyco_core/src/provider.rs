//! Snapshotting a `HistoryProvider` into a `ForecastInput`.
//!
//! The provider seam reports failures as `Box<dyn Error + Send + Sync>`; they
//! are mapped to `ForecastError::Provider` here.

use chrono::{DateTime, Duration, Utc};
use glyco_traits::{HistoryProvider, ProviderError, ScheduleEntry};

use crate::config::ForecastSettings;
use crate::error::{ForecastError, Result};
use crate::schedule::ScheduleTable;
use crate::types::ForecastInput;

/// Map a provider error to a typed `ForecastError`, naming the failed query.
pub fn map_provider_error(query: &str, e: &ProviderError) -> ForecastError {
    ForecastError::Provider(format!("{query}: {e}"))
}

fn table<V>(
    query: &str,
    entries: std::result::Result<Vec<ScheduleEntry<V>>, ProviderError>,
) -> Result<ScheduleTable<V>> {
    let entries = entries.map_err(|e| map_provider_error(query, &e))?;
    ScheduleTable::new(entries)
}

/// Query everything a forecast at `now` needs.
///
/// Glucose and carbs cover `history` before `now`. Doses reach one insulin
/// action duration further back, so insulin still acting at the start of the
/// history is included. Schedules run from the earliest dose to one grid step
/// past the forecast horizon, so the last prediction point is covered.
pub fn gather<P: HistoryProvider + ?Sized>(
    provider: &P,
    now: DateTime<Utc>,
    history: Duration,
    settings: ForecastSettings,
) -> Result<ForecastInput> {
    let history_start = now - history;
    let dose_start = history_start - settings.horizon();
    let horizon_end = now + settings.horizon() + settings.delta();

    let glucose = provider
        .glucose_samples(history_start, now)
        .map_err(|e| map_provider_error("glucose", &e))?;
    let doses = provider
        .dose_records(dose_start, now)
        .map_err(|e| map_provider_error("doses", &e))?;
    let carbs = provider
        .carb_records(history_start, now)
        .map_err(|e| map_provider_error("carbs", &e))?;
    let limits = provider
        .dosing_limits(now)
        .map_err(|e| map_provider_error("dosing limits", &e))?;

    let input = ForecastInput {
        glucose,
        doses,
        carbs,
        basal: table("basal", provider.basal_schedule(dose_start, horizon_end))?,
        sensitivity: table("sensitivity", provider.sensitivity_schedule(dose_start, horizon_end))?,
        carb_ratio: table("carb ratio", provider.carb_ratio_schedule(dose_start, horizon_end))?,
        target: table("target", provider.target_schedule(dose_start, horizon_end))?,
        limits,
        settings,
    };
    tracing::debug!(
        glucose = input.glucose.len(),
        doses = input.doses.len(),
        carbs = input.carbs.len(),
        %history_start,
        %horizon_end,
        "history gathered"
    );
    Ok(input)
}
