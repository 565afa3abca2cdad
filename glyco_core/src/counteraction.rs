//! Insulin counteraction: how fast glucose moved beyond what insulin explains.

use chrono::{DateTime, Duration, Utc};
use glyco_traits::GlucoseSample;

use crate::effects::{GlucoseEffect, GlucoseEffectVelocity, change_between};
use crate::util::minutes_between;

/// For each grid time, the sample nearest to it within `tolerance`
/// (inclusive). Equidistant samples resolve to the earlier one.
///
/// `samples` must be sorted by time.
pub fn resample_nearest(
    samples: &[GlucoseSample],
    grid: &[DateTime<Utc>],
    tolerance: Duration,
) -> Vec<Option<GlucoseSample>> {
    grid.iter()
        .map(|&t| {
            let idx = samples.partition_point(|s| s.time < t);
            let before = idx.checked_sub(1).map(|i| samples[i]);
            let after = samples.get(idx).copied();
            let nearest = match (before, after) {
                (Some(b), Some(a)) => {
                    if (a.time - t) < (t - b.time) { a } else { b }
                }
                (Some(b), None) => b,
                (None, Some(a)) => a,
                (None, None) => return None,
            };
            ((nearest.time - t).abs() <= tolerance).then_some(nearest)
        })
        .collect()
}

/// Counteraction velocity for each grid interval.
///
/// Observed velocity uses the resolved samples' own timestamps. An interval is
/// omitted when either end has no sample within tolerance or both ends resolve
/// to the same sample. Insulin velocity is zero when the insulin curve does not
/// sample both ends.
pub fn counteraction_effects(
    samples: &[GlucoseSample],
    insulin_effects: &[GlucoseEffect],
    grid: &[DateTime<Utc>],
    tolerance: Duration,
) -> Vec<GlucoseEffectVelocity> {
    let resampled = resample_nearest(samples, grid, tolerance);
    let mut out = Vec::new();
    for (k, w) in resampled.windows(2).enumerate() {
        let (Some(a), Some(b)) = (w[0], w[1]) else {
            continue;
        };
        if a.time == b.time {
            continue;
        }
        let (start, end) = (grid[k], grid[k + 1]);
        let observed = (b.value - a.value) / minutes_between(a.time, b.time);
        let insulin = change_between(insulin_effects, start, end)
            .map_or(0.0, |c| c / minutes_between(start, end));
        out.push(GlucoseEffectVelocity {
            start,
            end,
            rate: observed - insulin,
        });
    }
    out
}
