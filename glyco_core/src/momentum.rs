//! Short-term glucose momentum from a least-squares fit of recent samples.

use chrono::Duration;
use glyco_traits::GlucoseSample;

use crate::config::MomentumCfg;
use crate::effects::{GlucoseEffect, decaying_rate_effect};
use crate::util::{duration_minutes, minutes_between};

/// Least-squares slope (per minute) of `(time, value)` pairs.
pub fn linear_slope(samples: &[GlucoseSample]) -> Option<f64> {
    let origin = samples.first()?.time;
    let n = samples.len() as f64;
    let xs: Vec<f64> = samples.iter().map(|s| minutes_between(origin, s.time)).collect();
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = samples.iter().map(|s| s.value).sum::<f64>() / n;
    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (x, s) in xs.iter().zip(samples) {
        sxy += (x - mean_x) * (s.value - mean_y);
        sxx += (x - mean_x) * (x - mean_x);
    }
    if sxx <= 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    slope.is_finite().then_some(slope)
}

/// Momentum effect anchored at the latest sample.
///
/// Samples at or after `latest - window` (the boundary sample included) are
/// fitted. The effect is empty when fewer than `min_samples` qualify, or when
/// consecutive samples are further apart than `delta + tolerance`.
pub fn momentum_effect(
    samples: &[GlucoseSample],
    cfg: &MomentumCfg,
    delta: Duration,
    tolerance: Duration,
) -> Vec<GlucoseEffect> {
    let Some(latest) = samples.last() else {
        return Vec::new();
    };
    let window_start = latest.time - cfg.window();
    let from = samples.partition_point(|s| s.time < window_start);
    let recent = &samples[from..];
    if recent.len() < cfg.min_samples {
        return Vec::new();
    }
    let max_gap = duration_minutes(delta + tolerance);
    let regular = recent.windows(2).all(|w| {
        let gap = minutes_between(w[0].time, w[1].time);
        gap > 0.0 && gap <= max_gap
    });
    if !regular {
        return Vec::new();
    }
    let Some(slope) = linear_slope(recent) else {
        return Vec::new();
    };
    tracing::debug!(slope, samples = recent.len(), at = %latest.time, "momentum slope");
    decaying_rate_effect(latest.time, slope, cfg.duration(), delta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(m: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap() + Duration::minutes(m)
    }

    #[test]
    fn slope_of_line() {
        let s: Vec<GlucoseSample> = (0..4)
            .map(|i| GlucoseSample::new(at(5 * i), 100.0 + 10.0 * i as f64))
            .collect();
        let slope = linear_slope(&s).unwrap();
        assert!((slope - 2.0).abs() < 1e-12);
    }

    #[test]
    fn single_time_has_no_slope() {
        let s = vec![GlucoseSample::new(at(0), 100.0), GlucoseSample::new(at(0), 110.0)];
        assert!(linear_slope(&s).is_none());
    }
}
