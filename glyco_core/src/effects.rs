//! Effect-curve value types and the small operations every stage shares.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::util::{duration_minutes, minutes_between};

/// A point on a cumulative glucose-effect curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlucoseEffect {
    pub time: DateTime<Utc>,
    /// Cumulative change since the curve's first sample.
    pub value: f64,
}

impl GlucoseEffect {
    pub fn new(time: DateTime<Utc>, value: f64) -> Self {
        Self { time, value }
    }
}

/// Average rate of change between two effect-curve samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlucoseEffectVelocity {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Concentration per minute.
    pub rate: f64,
}

impl GlucoseEffectVelocity {
    pub fn minutes(&self) -> f64 {
        minutes_between(self.start, self.end)
    }

    /// Total change implied over the interval.
    pub fn effect(&self) -> f64 {
        self.rate * self.minutes()
    }
}

/// A forecast point; only produced at or after the prediction start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictedGlucoseValue {
    pub time: DateTime<Utc>,
    pub value: f64,
}

/// Shift a curve so its first sample is exactly zero.
pub fn zeroed(mut curve: Vec<GlucoseEffect>) -> Vec<GlucoseEffect> {
    if let Some(first) = curve.first().map(|e| e.value) {
        for e in &mut curve {
            e.value -= first;
        }
        // Subtraction leaves -0.0 behind for a negative origin; normalize it.
        curve[0].value = 0.0;
    }
    curve
}

/// Value of a grid-sampled curve at exactly `t`.
pub fn value_at(curve: &[GlucoseEffect], t: DateTime<Utc>) -> Option<f64> {
    curve
        .binary_search_by(|e| e.time.cmp(&t))
        .ok()
        .map(|i| curve[i].value)
}

/// Change of a curve across `[from, to]`; `None` when either end is unsampled.
pub fn change_between(curve: &[GlucoseEffect], from: DateTime<Utc>, to: DateTime<Utc>) -> Option<f64> {
    Some(value_at(curve, to)? - value_at(curve, from)?)
}

/// Interval velocities between consecutive samples of a curve.
pub fn velocities(curve: &[GlucoseEffect]) -> Vec<GlucoseEffectVelocity> {
    curve
        .windows(2)
        .filter_map(|w| {
            let mins = minutes_between(w[0].time, w[1].time);
            (mins > 0.0).then(|| GlucoseEffectVelocity {
                start: w[0].time,
                end: w[1].time,
                rate: (w[1].value - w[0].value) / mins,
            })
        })
        .collect()
}

/// Effect of a rate that starts at `rate` (per minute) and decays linearly to
/// zero over `duration`, sampled every `delta` from `start`.
///
/// The first sample is zero; the full rate applies over the first step and the
/// last step adds nothing.
pub fn decaying_rate_effect(
    start: DateTime<Utc>,
    rate: f64,
    duration: Duration,
    delta: Duration,
) -> Vec<GlucoseEffect> {
    let step = duration_minutes(delta);
    let total = duration_minutes(duration);
    if step <= 0.0 || total <= step {
        return Vec::new();
    }
    let end = start + duration;
    let decay_start = start + delta;
    let slope = -rate / (total - step);

    let mut values = vec![GlucoseEffect::new(start, 0.0)];
    let mut last = 0.0;
    let mut t = decay_start;
    while t <= end {
        let current_rate = rate + slope * minutes_between(decay_start, t);
        last += current_rate * step;
        values.push(GlucoseEffect::new(t, last));
        t += delta;
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(m: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(m)
    }

    #[test]
    fn zeroed_starts_at_zero() {
        let curve = vec![GlucoseEffect::new(at(0), -3.5), GlucoseEffect::new(at(5), -7.0)];
        let z = zeroed(curve);
        assert_eq!(z[0].value, 0.0);
        assert!(z[0].value.is_sign_positive());
        assert!((z[1].value + 3.5).abs() < 1e-12);
    }

    #[test]
    fn decay_effect_integrates_triangle() {
        // rate 1/min decaying over 60 min at 5 min steps
        let curve = decaying_rate_effect(at(0), 1.0, Duration::minutes(60), Duration::minutes(5));
        assert_eq!(curve.first().map(|e| e.value), Some(0.0));
        assert_eq!(curve.last().map(|e| e.time), Some(at(60)));
        let total = curve.last().map(|e| e.value).unwrap();
        // Rates 1.0, 10/11, ..., 0 at 5 min each: 5 * (12 * 1/2) = 30
        assert!((total - 30.0).abs() < 1e-9, "total {total}");
        let last_two: Vec<f64> = curve.iter().rev().take(2).map(|e| e.value).collect();
        assert!((last_two[0] - last_two[1]).abs() < 1e-12);
    }

    #[test]
    fn velocities_between_samples() {
        let curve = vec![
            GlucoseEffect::new(at(0), 0.0),
            GlucoseEffect::new(at(5), 10.0),
            GlucoseEffect::new(at(10), 5.0),
        ];
        let v = velocities(&curve);
        assert_eq!(v.len(), 2);
        assert!((v[0].rate - 2.0).abs() < 1e-12);
        assert!((v[1].rate + 1.0).abs() < 1e-12);
        assert!((v[1].effect() + 5.0).abs() < 1e-12);
    }
}
