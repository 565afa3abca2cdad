//! Forecast evaluation against later observations.

use chrono::Duration;
use glyco_traits::GlucoseSample;
use serde::Serialize;

use crate::counteraction::resample_nearest;
use crate::effects::PredictedGlucoseValue;

/// Pearson correlation of paired series; `None` with fewer than two pairs or
/// zero variance on either side. Always within `[-1, 1]`.
pub fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for &(x, y) in pairs {
        let (dx, dy) = (x - mean_x, y - mean_y);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    let r = sxy / (sxx.sqrt() * syy.sqrt());
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ForecastAccuracy {
    /// Prediction points with an observation within tolerance.
    pub paired: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_absolute_error: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_mean_square_error: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation: Option<f64>,
}

/// Compare predictions after the first point with the nearest observed samples.
pub fn forecast_accuracy(
    predicted: &[PredictedGlucoseValue],
    observed: &[GlucoseSample],
    tolerance: Duration,
) -> ForecastAccuracy {
    let future = predicted.get(1..).unwrap_or_default();
    let times: Vec<_> = future.iter().map(|p| p.time).collect();
    let pairs: Vec<(f64, f64)> = resample_nearest(observed, &times, tolerance)
        .into_iter()
        .zip(future)
        .filter_map(|(obs, p)| obs.map(|o| (p.value, o.value)))
        .collect();
    if pairs.is_empty() {
        return ForecastAccuracy::default();
    }
    let n = pairs.len() as f64;
    let mae = pairs.iter().map(|(p, o)| (p - o).abs()).sum::<f64>() / n;
    let mse = pairs.iter().map(|(p, o)| (p - o).powi(2)).sum::<f64>() / n;
    ForecastAccuracy {
        paired: pairs.len(),
        mean_absolute_error: Some(mae),
        root_mean_square_error: Some(mse.sqrt()),
        correlation: pearson(&pairs),
    }
}
