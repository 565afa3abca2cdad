use chrono::{DateTime, Duration, TimeZone, Utc};
use glyco_core::config::MomentumCfg;
use glyco_core::momentum::momentum_effect;
use glyco_traits::GlucoseSample;

fn at(m: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(m)
}

fn samples(points: &[(i64, f64)]) -> Vec<GlucoseSample> {
    points
        .iter()
        .map(|&(m, v)| GlucoseSample::new(at(m), v))
        .collect()
}

fn effect(points: &[(i64, f64)]) -> Vec<glyco_core::GlucoseEffect> {
    momentum_effect(
        &samples(points),
        &MomentumCfg::default(),
        Duration::minutes(5),
        Duration::minutes(5),
    )
}

#[test]
fn window_boundary_sample_is_included() {
    // Three samples only reach min_samples if the one at exactly -15 counts.
    let curve = effect(&[(-15, 100.0), (-5, 120.0), (0, 130.0)]);
    assert_eq!(curve.first().map(|e| (e.time, e.value)), Some((at(0), 0.0)));
    assert_eq!(curve.last().map(|e| e.time), Some(at(30)));
    // slope 2 decaying over 30 min
    let total = curve.last().unwrap().value;
    assert!((total - 30.0).abs() < 1e-9, "total {total}");
}

#[test]
fn older_samples_are_outside_window() {
    let curve = effect(&[(-40, 300.0), (-15, 100.0), (-5, 120.0), (0, 130.0)]);
    assert!((curve.last().unwrap().value - 30.0).abs() < 1e-9);
}

#[test]
fn too_few_samples_give_no_effect() {
    assert!(effect(&[(-5, 120.0), (0, 130.0)]).is_empty());
    assert!(effect(&[]).is_empty());
}

#[test]
fn gap_beyond_tolerance_gives_no_effect() {
    assert!(effect(&[(-15, 100.0), (-4, 120.0), (0, 130.0)]).is_empty());
}

#[test]
fn duplicate_times_give_no_effect() {
    assert!(effect(&[(-10, 100.0), (-5, 110.0), (-5, 112.0), (0, 120.0)]).is_empty());
}

#[test]
fn flat_glucose_has_flat_momentum() {
    let curve = effect(&[(-15, 110.0), (-10, 110.0), (-5, 110.0), (0, 110.0)]);
    assert!(!curve.is_empty());
    assert!(curve.iter().all(|e| e.value.abs() < 1e-12));
}
