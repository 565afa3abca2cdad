//! Subcommand implementations: history loading, forecasting and reporting.

use chrono::{DateTime, Duration, Utc};
use eyre::{Result, WrapErr};
use glyco_config::Config;
use glyco_core::analysis::{ForecastAccuracy, forecast_accuracy};
use glyco_core::conversions::dosing_limits;
use glyco_core::fixture::{read_fixture, write_fixture};
use glyco_core::provider::gather;
use glyco_core::{
    DoseRecommendation, EffectsTimelinePoint, ForecastError, ForecastInput, ForecastOutput,
    ForecastSettings, GlucoseCorrection, InMemoryHistory, effects_timeline, forecast,
};
use glyco_traits::{
    CarbRecord, Clock, DoseRecord, FixedClock, GlucoseSample, SystemClock,
};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;

/// Records exported by a data source, in the fixture record format.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryFile {
    #[serde(default)]
    pub glucose: Vec<GlucoseSample>,
    #[serde(default)]
    pub doses: Vec<DoseRecord>,
    #[serde(default)]
    pub carbs: Vec<CarbRecord>,
}

/// Everything a subcommand needs besides its own arguments.
pub struct Ctx {
    pub cfg: Config,
    pub settings: ForecastSettings,
    pub json: bool,
}

impl Ctx {
    pub fn new(cfg: Config, json: bool) -> Result<Self> {
        let settings = ForecastSettings::from(&cfg);
        settings
            .validate()
            .map_err(|msg| eyre::eyre!("invalid configuration: {msg}"))?;
        Ok(Self {
            cfg,
            settings,
            json,
        })
    }

    fn history_window(&self) -> Duration {
        Duration::hours(i64::from(self.cfg.algorithm.history_hours))
    }
}

/// History file plus configured schedules and limits as an in-memory provider.
pub fn load_history(path: &Path, cfg: &Config) -> Result<InMemoryHistory> {
    let text = std::fs::read_to_string(path).wrap_err_with(|| format!("read history {path:?}"))?;
    let file: HistoryFile =
        serde_json::from_str(&text).wrap_err_with(|| format!("parse history {path:?}"))?;
    let mut history = InMemoryHistory::try_from(&cfg.schedules)?
        .with_glucose(file.glucose)
        .with_doses(file.doses)
        .with_carbs(file.carbs);
    if let Some(limits) = &cfg.limits {
        history = history.with_limits(dosing_limits(limits));
    }
    tracing::info!(
        path = %path.display(),
        glucose = history.glucose.len(),
        doses = history.doses.len(),
        carbs = history.carbs.len(),
        "history loaded"
    );
    Ok(history)
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn cmd_forecast(ctx: &Ctx, history: &Path, now: Option<DateTime<Utc>>) -> Result<()> {
    let clock: Box<dyn Clock> = match now {
        Some(t) => Box::new(FixedClock::new(t)),
        None => Box::new(SystemClock::new()),
    };
    let now = clock.now();
    let provider = load_history(history, &ctx.cfg)?;
    let input = gather(&provider, now, ctx.history_window(), ctx.settings)?;
    let out = forecast(&input, now)?;
    report(ctx, &out)
}

pub fn cmd_replay(ctx: &Ctx, fixture: &Path, now: Option<DateTime<Utc>>) -> Result<()> {
    let input = read_fixture(fixture)?;
    let now = match now {
        Some(t) => t,
        None => latest_glucose_time(&input)?,
    };
    let out = forecast(&input, now)?;
    report(ctx, &out)
}

fn latest_glucose_time(input: &ForecastInput) -> Result<DateTime<Utc>> {
    input
        .glucose
        .last()
        .map(|s| s.time)
        .ok_or_else(|| ForecastError::MissingGlucoseHistory.into())
}

pub fn cmd_fixture(ctx: &Ctx, history: &Path, now: Option<DateTime<Utc>>, out: &Path) -> Result<()> {
    let provider = load_history(history, &ctx.cfg)?;
    let now = match now {
        Some(t) => t,
        None => provider
            .glucose
            .last()
            .map(|s| s.time)
            .ok_or(ForecastError::MissingGlucoseHistory)?,
    };
    let input = gather(&provider, now, ctx.history_window(), ctx.settings)?;
    write_fixture(out, &input)?;
    if ctx.json {
        print_json(&json!({ "fixture": out.display().to_string(), "now": now }))
    } else {
        println!("Fixture written to {} (now = {now})", out.display());
        Ok(())
    }
}

pub fn cmd_timeline(
    ctx: &Ctx,
    history: &Path,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    stride_minutes: u32,
) -> Result<()> {
    if stride_minutes == 0 {
        eyre::bail!("--stride-minutes must be >= 1");
    }
    let provider = load_history(history, &ctx.cfg)?;
    let stride = Duration::minutes(i64::from(stride_minutes));
    // Doses delivered up to one action duration before `start` still act in the window.
    let from = start - ctx.settings.horizon() - stride;
    let to = end + stride;
    let points = effects_timeline(
        &provider.doses,
        &provider.basal.table_between(from, to),
        &provider.sensitivity.table_between(from, to),
        &ctx.settings.insulin_model,
        ctx.settings.sensitivity_mode,
        start,
        end,
        stride,
    )?;
    if ctx.json {
        return print_json(&points);
    }
    print_timeline(&points);
    Ok(())
}

fn print_timeline(points: &[EffectsTimelinePoint]) {
    println!("{:<25} {:>8} {:>10}", "time", "IOB (U)", "effect");
    for p in points {
        println!(
            "{:<25} {:>8.2} {:>10.1}",
            p.time.to_rfc3339(),
            p.insulin_on_board,
            p.net_insulin_effect
        );
    }
}

pub fn cmd_evaluate(ctx: &Ctx, history: &Path, now: DateTime<Utc>) -> Result<()> {
    let provider = load_history(history, &ctx.cfg)?;
    let input = gather(&provider, now, ctx.history_window(), ctx.settings)?;
    let out = forecast(&input, now)?;
    let observed: Vec<GlucoseSample> = provider
        .glucose
        .iter()
        .filter(|s| s.time > out.prediction_start)
        .copied()
        .collect();
    let accuracy = forecast_accuracy(
        &out.predicted_glucose,
        &observed,
        ctx.settings.glucose_tolerance(),
    );
    if accuracy.paired == 0 {
        tracing::warn!(%now, "no samples recorded after the prediction start");
    }
    if ctx.json {
        return print_json(&json!({
            "prediction_start": out.prediction_start,
            "accuracy": accuracy,
        }));
    }
    print_accuracy(&accuracy);
    Ok(())
}

fn print_accuracy(a: &ForecastAccuracy) {
    let fmt = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"));
    println!("Paired points: {}", a.paired);
    println!("MAE:  {}", fmt(a.mean_absolute_error));
    println!("RMSE: {}", fmt(a.root_mean_square_error));
    println!("r:    {}", fmt(a.correlation));
}

pub fn cmd_self_check(ctx: &Ctx) -> Result<()> {
    // Schedules must also convert into the engine's daily schedules.
    InMemoryHistory::try_from(&ctx.cfg.schedules)?;
    if ctx.json {
        print_json(&json!({
            "status": "ok",
            "horizon_minutes": ctx.settings.horizon().num_minutes(),
            "recommendations": ctx.cfg.limits.is_some(),
        }))
    } else {
        println!("Config OK");
        Ok(())
    }
}

fn report(ctx: &Ctx, out: &ForecastOutput) -> Result<()> {
    if ctx.json {
        println!("{}", out.to_json()?);
        return Ok(());
    }
    println!("Prediction start: {}", out.prediction_start.to_rfc3339());
    println!("IOB: {:.2} U   COB: {:.0} g", out.insulin_on_board, out.carbs_on_board);
    if let Some(e) = out.eventual_glucose() {
        println!("Eventual glucose: {:.0} at {}", e.value, e.time.to_rfc3339());
    }
    if let Some(m) = out.min_predicted() {
        println!("Minimum predicted: {:.0} at {}", m.value, m.time.to_rfc3339());
    }
    if let Some(c) = &out.correction {
        println!("Correction: {}", describe_correction(c));
    }
    match &out.recommendation {
        Some(r) => println!("Recommendation: {}", describe_recommendation(r)),
        None if ctx.cfg.limits.is_some() => println!("Recommendation: withheld"),
        None => {}
    }
    println!("Predicted (every 30 min):");
    for p in out.predicted_glucose.iter().step_by(6) {
        println!("  {}  {:>5.0}", p.time.format("%H:%M"), p.value);
    }
    Ok(())
}

fn describe_correction(c: &GlucoseCorrection) -> String {
    match c {
        GlucoseCorrection::Suspend { min_glucose } => {
            format!("suspend (predicted {:.0})", min_glucose.value)
        }
        GlucoseCorrection::InRange => "in range".to_string(),
        GlucoseCorrection::EntirelyBelowRange { units, .. } => {
            format!("below range ({units:.2} U)")
        }
        GlucoseCorrection::AboveRange { units, .. } => format!("above range ({units:.2} U)"),
    }
}

fn describe_recommendation(r: &DoseRecommendation) -> String {
    match r {
        DoseRecommendation::Automatic {
            temp_basal,
            bolus_units,
        } => {
            let basal = match temp_basal {
                None => "keep current basal".to_string(),
                Some(t) if t.is_cancel() => "cancel temp basal".to_string(),
                Some(t) => format!("temp basal {:.2} U/h for {:.0} min", t.rate, t.duration_minutes),
            };
            if *bolus_units > 0.0 {
                format!("{basal}, bolus {bolus_units:.2} U")
            } else {
                basal
            }
        }
        DoseRecommendation::Manual { amount, notice } => match notice {
            Some(n) => format!("bolus {amount:.2} U ({n:?})"),
            None => format!("bolus {amount:.2} U"),
        },
    }
}
