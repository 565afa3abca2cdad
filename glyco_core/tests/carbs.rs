use chrono::{DateTime, Duration, TimeZone, Utc};
use glyco_core::carbs::{carb_effects, carb_statuses, carbs_on_board};
use glyco_core::config::CarbModelCfg;
use glyco_core::util::grid_points;
use glyco_core::{DailySchedule, GlucoseEffectVelocity, ScheduleKind, ScheduleTable};
use glyco_core::error::ForecastError;
use glyco_traits::{CarbRecord, ScheduleEntry};

fn at(m: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(m)
}

fn constant(v: f64) -> ScheduleTable<f64> {
    DailySchedule::constant(v).table_between(at(-24 * 60), at(24 * 60))
}

fn ice(from: i64, to: i64, rate: f64) -> GlucoseEffectVelocity {
    GlucoseEffectVelocity {
        start: at(from),
        end: at(to),
        rate,
    }
}

const PS: i64 = 60;

#[test]
fn minimum_absorption_without_counteraction() {
    let statuses = carb_statuses(
        &[CarbRecord::new(at(0), 30.0)],
        &[],
        &constant(10.0),
        &constant(50.0),
        &CarbModelCfg::default(),
        at(PS),
    )
    .unwrap();
    let s = &statuses[0];
    assert_eq!(s.carb_sensitivity, 5.0);
    assert_eq!(s.absorption_start, at(10));
    assert_eq!(s.observed_grams, 0.0);
    // 50 min at 30 g / 270 min
    assert!((s.absorbed_grams - 50.0 * 30.0 / 270.0).abs() < 1e-9);
    assert!((s.remaining_grams - (30.0 - 50.0 * 30.0 / 270.0)).abs() < 1e-9);
    assert!((s.time_remaining_minutes - 130.0).abs() < 1e-9);
}

#[test]
fn counteraction_is_credited_as_grams() {
    let statuses = carb_statuses(
        &[CarbRecord::new(at(0), 30.0)],
        &[ice(10, PS, 1.0)],
        &constant(10.0),
        &constant(50.0),
        &CarbModelCfg::default(),
        at(PS),
    )
    .unwrap();
    let s = &statuses[0];
    assert!((s.observed_grams - 10.0).abs() < 1e-9);
    assert!((s.absorbed_grams - 10.0).abs() < 1e-9);
    assert!((carbs_on_board(&statuses) - 20.0).abs() < 1e-9);
}

#[test]
fn counteraction_before_absorption_start_is_ignored() {
    let statuses = carb_statuses(
        &[CarbRecord::new(at(0), 30.0)],
        &[ice(0, 5, 4.0)],
        &constant(10.0),
        &constant(50.0),
        &CarbModelCfg::default(),
        at(PS),
    )
    .unwrap();
    assert_eq!(statuses[0].observed_grams, 0.0);
}

#[test]
fn late_entries_take_no_counteraction() {
    let entry = CarbRecord::new(at(0), 30.0).with_entered_at(at(PS + 5));
    let statuses = carb_statuses(
        &[entry],
        &[ice(10, PS, 1.0)],
        &constant(10.0),
        &constant(50.0),
        &CarbModelCfg::default(),
        at(PS),
    )
    .unwrap();
    let s = &statuses[0];
    assert_eq!(s.observed_grams, 0.0);
    assert_eq!(s.absorbed_grams, 0.0);
    assert_eq!(s.remaining_grams, 30.0);
}

#[test]
fn late_entry_absorbs_nothing_before_prediction_start() {
    // Eaten two hours ago, logged five minutes after the prediction start.
    let entry = CarbRecord::new(at(PS - 120), 60.0).with_entered_at(at(PS + 5));
    let statuses = carb_statuses(
        &[entry],
        &[ice(PS - 100, PS, 1.0)],
        &constant(10.0),
        &constant(50.0),
        &CarbModelCfg::default(),
        at(PS),
    )
    .unwrap();
    let s = &statuses[0];
    assert_eq!(s.absorbed_grams, 0.0);
    assert_eq!(s.remaining_grams, 60.0);
    assert!((s.time_remaining_minutes - 180.0).abs() < 1e-9);
    assert!((carbs_on_board(&statuses) - 60.0).abs() < 1e-9);

    let grid = grid_points(at(PS - 120), at(PS + 300), at(PS), Duration::minutes(5));
    let curve = carb_effects(&statuses, &grid);
    assert!(curve.iter().filter(|e| e.time <= at(PS)).all(|e| e.value == 0.0));
    let done = curve.iter().find(|e| e.time == at(PS + 180)).unwrap();
    assert!((done.value - 300.0).abs() < 1e-9);
}

#[test]
fn future_entries_are_excluded() {
    let statuses = carb_statuses(
        &[CarbRecord::new(at(0), 30.0), CarbRecord::new(at(PS + 1), 15.0)],
        &[],
        &constant(10.0),
        &constant(50.0),
        &CarbModelCfg::default(),
        at(PS),
    )
    .unwrap();
    assert_eq!(statuses.len(), 1);
}

#[test]
fn shared_counteraction_is_split_by_minimum_rate() {
    let statuses = carb_statuses(
        &[CarbRecord::new(at(0), 30.0), CarbRecord::new(at(0), 30.0)],
        &[ice(10, PS, 1.0)],
        &constant(10.0),
        &constant(50.0),
        &CarbModelCfg::default(),
        at(PS),
    )
    .unwrap();
    let observed: f64 = statuses.iter().map(|s| s.observed_grams).sum();
    assert!((observed - 10.0).abs() < 1e-9);
    assert!((statuses[0].observed_grams - statuses[1].observed_grams).abs() < 1e-9);
}

#[test]
fn observed_grams_never_exceed_entry() {
    let statuses = carb_statuses(
        &[CarbRecord::new(at(0), 10.0)],
        &[ice(10, PS, 10.0)],
        &constant(10.0),
        &constant(50.0),
        &CarbModelCfg::default(),
        at(PS),
    )
    .unwrap();
    assert!((statuses[0].observed_grams - 10.0).abs() < 1e-9);
    assert_eq!(statuses[0].remaining_grams, 0.0);
    assert_eq!(statuses[0].time_remaining_minutes, 0.0);
}

#[test]
fn effect_curve_rises_to_full_entry() {
    let statuses = carb_statuses(
        &[CarbRecord::new(at(0), 30.0)],
        &[ice(10, PS, 1.0)],
        &constant(10.0),
        &constant(50.0),
        &CarbModelCfg::default(),
        at(PS),
    )
    .unwrap();
    let grid = grid_points(at(0), at(300), at(PS), Duration::minutes(5));
    let curve = carb_effects(&statuses, &grid);
    assert_eq!(curve[0].value, 0.0);
    assert!(curve.windows(2).all(|w| w[1].value >= w[0].value - 1e-12));
    // 20 g left over 130 min: done by 190 min
    let done = curve.iter().find(|e| e.time == at(190)).unwrap();
    assert!((done.value - 150.0).abs() < 1e-9);
    assert!((curve.last().unwrap().value - 150.0).abs() < 1e-9);
}

#[test]
fn missing_carb_ratio_is_reported() {
    let ratio = ScheduleTable::new(vec![ScheduleEntry::new(at(30), at(120), 10.0)]).unwrap();
    let err = carb_statuses(
        &[CarbRecord::new(at(0), 30.0)],
        &[],
        &ratio,
        &constant(50.0),
        &CarbModelCfg::default(),
        at(PS),
    )
    .unwrap_err();
    assert_eq!(
        err,
        ForecastError::IncompleteScheduleCoverage {
            schedule: ScheduleKind::CarbRatio,
            at: at(0)
        }
    );
}
