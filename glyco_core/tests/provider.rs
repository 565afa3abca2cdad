use chrono::{DateTime, Duration, TimeZone, Utc};
use glyco_core::provider::gather;
use glyco_core::{DailySchedule, ForecastError, ForecastSettings, InMemoryHistory, forecast};
use glyco_traits::{
    CarbRecord, DoseRecord, DosingLimits, GlucoseSample, HistoryProvider, ProviderError,
    ScheduleEntry, TargetRange,
};

fn at(m: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(m)
}

fn history() -> InMemoryHistory {
    InMemoryHistory::new(
        DailySchedule::new(vec![(0, 0.8), (6 * 60, 1.1)]).unwrap(),
        DailySchedule::constant(50.0),
        DailySchedule::constant(10.0),
        DailySchedule::constant(TargetRange::new(100.0, 110.0)),
    )
    .with_glucose(
        (0..=72)
            .map(|k| GlucoseSample::new(at(-360 + 5 * k), 130.0))
            .collect(),
    )
    .with_doses(vec![
        DoseRecord::bolus(at(-600), 3.0),
        DoseRecord::bolus(at(-90), 1.0),
        DoseRecord::bolus(at(30), 1.0),
    ])
    .with_carbs(vec![CarbRecord::new(at(-60), 25.0)])
}

#[test]
fn gather_windows_the_history() {
    let input = gather(&history(), at(0), Duration::hours(3), ForecastSettings::default()).unwrap();
    assert_eq!(input.glucose.first().map(|s| s.time), Some(at(-180)));
    assert_eq!(input.glucose.last().map(|s| s.time), Some(at(0)));
    // Doses reach one action duration before the history start; the future bolus is excluded.
    let starts: Vec<DateTime<Utc>> = input.doses.iter().map(|d| d.start_time).collect();
    assert_eq!(starts, vec![at(-90)]);
    assert_eq!(input.carbs.len(), 1);
    assert!(input.limits.is_none());
    // Schedules cover the whole forecast horizon.
    assert!(input.basal.covers(at(-180), at(375)));
}

#[test]
fn gathered_input_forecasts() {
    let provider = history().with_limits(DosingLimits {
        max_bolus: 3.0,
        max_basal_rate: 2.0,
        suspend_threshold: 70.0,
        bolus_increment: None,
    });
    let input = gather(&provider, at(0), Duration::hours(6), ForecastSettings::default()).unwrap();
    let out = forecast(&input, at(0)).unwrap();
    assert_eq!(out.prediction_start, at(0));
    assert!(out.recommendation.is_some());
    assert!(out.carbs_on_board > 0.0);
}

struct Offline;

impl HistoryProvider for Offline {
    fn glucose_samples(
        &self,
        _: DateTime<Utc>,
        _: DateTime<Utc>,
    ) -> Result<Vec<GlucoseSample>, ProviderError> {
        Err("sync timed out".into())
    }
    fn dose_records(&self, _: DateTime<Utc>, _: DateTime<Utc>) -> Result<Vec<DoseRecord>, ProviderError> {
        Ok(Vec::new())
    }
    fn carb_records(&self, _: DateTime<Utc>, _: DateTime<Utc>) -> Result<Vec<CarbRecord>, ProviderError> {
        Ok(Vec::new())
    }
    fn basal_schedule(
        &self,
        _: DateTime<Utc>,
        _: DateTime<Utc>,
    ) -> Result<Vec<ScheduleEntry<f64>>, ProviderError> {
        Ok(Vec::new())
    }
    fn sensitivity_schedule(
        &self,
        _: DateTime<Utc>,
        _: DateTime<Utc>,
    ) -> Result<Vec<ScheduleEntry<f64>>, ProviderError> {
        Ok(Vec::new())
    }
    fn carb_ratio_schedule(
        &self,
        _: DateTime<Utc>,
        _: DateTime<Utc>,
    ) -> Result<Vec<ScheduleEntry<f64>>, ProviderError> {
        Ok(Vec::new())
    }
    fn target_schedule(
        &self,
        _: DateTime<Utc>,
        _: DateTime<Utc>,
    ) -> Result<Vec<ScheduleEntry<TargetRange>>, ProviderError> {
        Ok(Vec::new())
    }
    fn dosing_limits(&self, _: DateTime<Utc>) -> Result<Option<DosingLimits>, ProviderError> {
        Ok(None)
    }
}

#[test]
fn provider_failure_is_typed() {
    let err = gather(&Offline, at(0), Duration::hours(3), ForecastSettings::default()).unwrap_err();
    match err {
        ForecastError::Provider(msg) => {
            assert!(msg.contains("glucose"), "{msg}");
            assert!(msg.contains("sync timed out"), "{msg}");
        }
        other => panic!("expected provider error, got {other:?}"),
    }
}

#[test]
fn provider_works_behind_dyn() {
    let provider: Box<dyn HistoryProvider> = Box::new(history());
    assert!(gather(provider.as_ref(), at(0), Duration::hours(1), ForecastSettings::default()).is_ok());
}
