//! Human-readable error descriptions, exit codes and structured JSON errors.

use glyco_core::{BuildError, ForecastError, ScheduleKind};
use serde_json::json;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(fe) = err.downcast_ref::<ForecastError>() {
        return match fe {
            ForecastError::MissingGlucoseHistory => {
                "What happened: No glucose sample at or before the forecast time.\nLikely causes: The history file has no glucose, or --now is earlier than every sample.\nHow to fix: Check the history export and the --now timestamp.".to_string()
            }
            ForecastError::IncompleteScheduleCoverage { schedule, at } => format!(
                "What happened: The {schedule} schedule does not cover {at}.\nLikely causes: {}\nHow to fix: Make the schedule start at 00:00 with strictly increasing entries.",
                schedule_hint(*schedule)
            ),
            ForecastError::InvalidInput(msg) => format!(
                "What happened: The input was rejected ({msg}).\nLikely causes: Unordered or non-finite records, or an invalid setting.\nHow to fix: Sort and clean the history, then rerun."
            ),
            ForecastError::Provider(msg) => format!(
                "What happened: The history source failed ({msg}).\nLikely causes: The data source was unreachable or returned bad data.\nHow to fix: Retry, or export the history to a file and use it directly."
            ),
        };
    }

    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingGlucose => {
                "What happened: No glucose history was provided to the engine.\nLikely causes: The fixture omits the glucose list.\nHow to fix: Regenerate the fixture with `glyco fixture`.".to_string()
            }
            BuildError::MissingSchedule(kind) => format!(
                "What happened: The {kind} schedule is missing.\nLikely causes: The fixture or config omits it.\nHow to fix: Add [[schedules.{kind}]] entries to the config."
            ),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/glyco.toml for a sample."
            ),
        };
    }

    // String-based heuristics for errors coming from config loading
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("schedule csv must have headers") {
        return "Invalid headers in schedule CSV. Expected 'start,value'.".to_string();
    }

    if lower.contains("invalid configuration") {
        return format!(
            "What happened: Configuration is invalid or incomplete ({msg}).\nLikely causes: Missing [schedules] entries or out-of-range values.\nHow to fix: Edit the TOML config and try again."
        );
    }

    if lower.starts_with("read config") {
        return format!(
            "What happened: Could not read the config file ({msg}).\nLikely causes: Wrong --config path or missing permissions.\nHow to fix: Pass --config with a readable TOML file."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

fn schedule_hint(kind: ScheduleKind) -> &'static str {
    match kind {
        ScheduleKind::Basal => "The basal CSV or [[schedules.basal]] leaves a gap.",
        ScheduleKind::Sensitivity => "[[schedules.sensitivity]] leaves a gap.",
        ScheduleKind::CarbRatio => "[[schedules.carb_ratio]] leaves a gap.",
        ScheduleKind::Target => "[[schedules.target]] leaves a gap.",
    }
}

/// Stable exit codes: 3 for missing glucose, 4 for schedule gaps, 1 otherwise.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<ForecastError>() {
        Some(ForecastError::MissingGlucoseHistory) => 3,
        Some(ForecastError::IncompleteScheduleCoverage { .. }) => 4,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    match err.downcast_ref::<ForecastError>() {
        Some(ForecastError::MissingGlucoseHistory) => "MissingGlucoseHistory",
        Some(ForecastError::IncompleteScheduleCoverage { .. }) => "IncompleteScheduleCoverage",
        Some(ForecastError::InvalidInput(_)) => "InvalidInput",
        Some(ForecastError::Provider(_)) => "Provider",
        None if err.downcast_ref::<BuildError>().is_some() => "BuildError",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    let msg = humanize(err);
    if let Some(ForecastError::IncompleteScheduleCoverage { schedule, at }) =
        err.downcast_ref::<ForecastError>()
    {
        return json!({
            "reason": reason_name(err),
            "details": { "schedule": schedule.as_str(), "at": at },
            "message": msg,
        })
        .to_string();
    }
    json!({ "reason": reason_name(err), "message": msg }).to_string()
}
