//! Combining effect curves into a glucose prediction.

use chrono::Duration;
use glyco_traits::GlucoseSample;

use crate::effects::{GlucoseEffect, PredictedGlucoseValue, change_between};
use crate::util::grid_points;

/// Walk the grid from the starting sample to `start + horizon`, adding each
/// curve's change over every step.
///
/// A curve that does not sample both ends of a step contributes nothing to it.
/// The running sum is never clamped.
pub fn predict_glucose(
    start: &GlucoseSample,
    horizon: Duration,
    delta: Duration,
    curves: &[&[GlucoseEffect]],
) -> Vec<PredictedGlucoseValue> {
    let grid = grid_points(start.time, start.time + horizon, start.time, delta);
    let mut out = Vec::with_capacity(grid.len());
    let mut value = start.value;
    out.push(PredictedGlucoseValue {
        time: start.time,
        value,
    });
    for w in grid.windows(2) {
        value += curves
            .iter()
            .filter_map(|c| change_between(c, w[0], w[1]))
            .sum::<f64>();
        out.push(PredictedGlucoseValue { time: w[1], value });
    }
    out
}

/// Copy of `prediction` with every value raised to at least `floor`.
pub fn apply_floor(
    prediction: &[PredictedGlucoseValue],
    floor: Option<f64>,
) -> Vec<PredictedGlucoseValue> {
    prediction
        .iter()
        .map(|p| PredictedGlucoseValue {
            time: p.time,
            value: floor.map_or(p.value, |f| p.value.max(f)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(m: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + Duration::minutes(m)
    }

    #[test]
    fn no_effects_is_flat() {
        let start = GlucoseSample::new(at(0), 123.0);
        let p = predict_glucose(&start, Duration::minutes(30), Duration::minutes(5), &[]);
        assert_eq!(p.len(), 7);
        assert!(p.iter().all(|v| v.value == 123.0));
    }

    #[test]
    fn partial_curve_stops_contributing() {
        let start = GlucoseSample::new(at(0), 100.0);
        let curve = vec![GlucoseEffect::new(at(0), 0.0), GlucoseEffect::new(at(5), -50.0)];
        let p = predict_glucose(
            &start,
            Duration::minutes(15),
            Duration::minutes(5),
            &[curve.as_slice()],
        );
        let values: Vec<f64> = p.iter().map(|v| v.value).collect();
        assert_eq!(values, vec![100.0, 50.0, 50.0, 50.0]);
        let floored: Vec<f64> = apply_floor(&p, Some(70.0)).iter().map(|v| v.value).collect();
        assert_eq!(floored, vec![100.0, 70.0, 70.0, 70.0]);
    }
}
