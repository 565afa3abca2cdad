use chrono::{DateTime, Duration, TimeZone, Utc};
use glyco_core::PredictedGlucoseValue;
use glyco_core::analysis::{forecast_accuracy, pearson};
use glyco_traits::GlucoseSample;
use proptest::prelude::*;
use rstest::rstest;

fn at(m: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(m)
}

#[rstest]
#[case::perfect(&[(1.0, 2.0), (2.0, 4.0), (3.0, 6.0)], Some(1.0))]
#[case::inverse(&[(1.0, 3.0), (2.0, 2.0), (3.0, 1.0)], Some(-1.0))]
#[case::constant_side(&[(1.0, 5.0), (2.0, 5.0), (3.0, 5.0)], None)]
#[case::single_pair(&[(1.0, 5.0)], None)]
#[case::empty(&[], None)]
fn pearson_cases(#[case] pairs: &[(f64, f64)], #[case] expected: Option<f64>) {
    match (pearson(pairs), expected) {
        (Some(r), Some(e)) => assert!((r - e).abs() < 1e-12, "r {r}"),
        (got, want) => assert_eq!(got, want),
    }
}

#[test]
fn accuracy_pairs_future_points_only() {
    let predicted: Vec<PredictedGlucoseValue> = (0..5)
        .map(|k| PredictedGlucoseValue {
            time: at(5 * k),
            value: 100.0 + 10.0 * k as f64,
        })
        .collect();
    let observed: Vec<GlucoseSample> = (0..4)
        .map(|k| GlucoseSample::new(at(5 * k + 1), 100.0 + 10.0 * k as f64 + 2.0))
        .collect();
    let acc = forecast_accuracy(&predicted, &observed, Duration::minutes(2));
    // Points at 5, 10 and 15 min pair with samples at 6, 11 and 16.
    assert_eq!(acc.paired, 3);
    let mae = acc.mean_absolute_error.unwrap();
    assert!((mae - 2.0).abs() < 1e-12);
    assert!((acc.root_mean_square_error.unwrap() - 2.0).abs() < 1e-12);
    assert!((acc.correlation.unwrap() - 1.0).abs() < 1e-12);
}

#[test]
fn no_observations_means_nothing_paired() {
    let predicted = vec![
        PredictedGlucoseValue {
            time: at(0),
            value: 100.0,
        },
        PredictedGlucoseValue {
            time: at(5),
            value: 100.0,
        },
    ];
    let acc = forecast_accuracy(&predicted, &[], Duration::minutes(5));
    assert_eq!(acc.paired, 0);
    assert!(acc.mean_absolute_error.is_none());
}

proptest! {
    #[test]
    fn pearson_is_bounded(pairs in proptest::collection::vec((-1e3f64..1e3, -1e3f64..1e3), 0..50)) {
        if let Some(r) = pearson(&pairs) {
            prop_assert!((-1.0..=1.0).contains(&r));
        }
    }
}
