//! Time and grid helpers.
//!
//! Every curve of one forecast shares a grid anchored at the prediction start:
//! `anchor + k * delta` for integer `k`.

use chrono::{DateTime, Duration, Utc};

/// Number of milliseconds in one minute.
pub const MILLIS_PER_MINUTE: i64 = 60_000;
/// Number of milliseconds in one hour.
pub const MILLIS_PER_HOUR: i64 = 3_600_000;

/// Elapsed minutes from `from` to `to` (negative when `to` precedes `from`).
#[inline]
pub fn minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / MILLIS_PER_MINUTE as f64
}

#[inline]
pub fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / MILLIS_PER_HOUR as f64
}

#[inline]
pub fn duration_minutes(d: Duration) -> f64 {
    d.num_milliseconds() as f64 / MILLIS_PER_MINUTE as f64
}

/// Duration from fractional minutes, rounded to the millisecond.
#[inline]
pub fn minutes(m: f64) -> Duration {
    Duration::milliseconds((m * MILLIS_PER_MINUTE as f64).round() as i64)
}

/// Latest grid point at or before `t`.
pub fn floor_to_grid(t: DateTime<Utc>, anchor: DateTime<Utc>, delta: Duration) -> DateTime<Utc> {
    let step = delta.num_milliseconds().max(1);
    let offset = (t - anchor).num_milliseconds();
    anchor + Duration::milliseconds(offset.div_euclid(step) * step)
}

/// Earliest grid point at or after `t`.
pub fn ceil_to_grid(t: DateTime<Utc>, anchor: DateTime<Utc>, delta: Duration) -> DateTime<Utc> {
    let floor = floor_to_grid(t, anchor, delta);
    if floor == t { floor } else { floor + delta }
}

/// Grid points covering `[start, end]`, both ends snapped outward to the grid.
///
/// Returns an empty vector when `end < start` or `delta` is not positive.
pub fn grid_points(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    anchor: DateTime<Utc>,
    delta: Duration,
) -> Vec<DateTime<Utc>> {
    if end < start || delta <= Duration::zero() {
        return Vec::new();
    }
    let first = floor_to_grid(start, anchor, delta);
    let last = ceil_to_grid(end, anchor, delta);
    let mut out = Vec::new();
    let mut t = first;
    while t <= last {
        out.push(t);
        t += delta;
    }
    out
}
