use chrono::{DateTime, Duration, TimeZone, Utc};
use glyco_core::{
    DailySchedule, ForecastError, InsulinModel, ScheduleTable, SensitivityMode, effects_timeline,
};
use glyco_traits::DoseRecord;

fn at(m: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(m)
}

fn constant(v: f64) -> ScheduleTable<f64> {
    DailySchedule::constant(v).table_between(at(-24 * 60), at(24 * 60))
}

#[test]
fn bolus_timeline_decays_and_sums_to_total_effect() {
    let model = InsulinModel::RapidActingAdult;
    let points = effects_timeline(
        &[DoseRecord::bolus(at(0), 1.0)],
        &constant(1.0),
        &constant(50.0),
        &model,
        SensitivityMode::DoseStart,
        at(0),
        at(360),
        Duration::minutes(30),
    )
    .unwrap();
    assert_eq!(points.len(), 13);
    assert!((points[0].insulin_on_board - 1.0).abs() < 1e-12);
    assert!(
        points
            .windows(2)
            .all(|w| w[1].insulin_on_board <= w[0].insulin_on_board + 1e-12)
    );
    let net: f64 = points.iter().map(|p| p.net_insulin_effect).sum();
    let expected = -50.0 * (1.0 - model.percent_effect_remaining(360.0));
    assert!((net - expected).abs() < 1e-9, "net {net} expected {expected}");
}

#[test]
fn later_doses_are_not_seen_early() {
    let points = effects_timeline(
        &[DoseRecord::bolus(at(45), 2.0)],
        &constant(1.0),
        &constant(50.0),
        &InsulinModel::Fiasp,
        SensitivityMode::EffectTime,
        at(0),
        at(60),
        Duration::minutes(30),
    )
    .unwrap();
    assert_eq!(points[0].insulin_on_board, 0.0);
    assert_eq!(points[1].insulin_on_board, 0.0);
    assert!(points[2].insulin_on_board > 1.9 && points[2].insulin_on_board <= 2.0);
}

#[test]
fn non_positive_stride_is_rejected() {
    let err = effects_timeline(
        &[],
        &constant(1.0),
        &constant(50.0),
        &InsulinModel::Fiasp,
        SensitivityMode::DoseStart,
        at(0),
        at(60),
        Duration::zero(),
    )
    .unwrap_err();
    assert!(matches!(err, ForecastError::InvalidInput(_)));
}
