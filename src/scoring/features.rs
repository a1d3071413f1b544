//! Sliding-window feature extraction.
//!
//! Reduces each metric series over the evaluation window to (mean, min, max)
//! and assembles the fixed-length vector consumed by the scaler and the
//! reconstruction model. The ordering here must match the feature ordering
//! the scaler was fit with; reordering silently corrupts scoring.

use statrs::statistics::Statistics;

use crate::types::DerivedSample;

/// Dimensionality of the feature vector.
///
/// (mean, min, max) × {temperature, humidity, dew point, depression}
/// followed by the solar scalar replicated three times.
pub const FEATURE_DIM: usize = 15;

/// A fixed-length, fixed-order feature vector.
pub type FeatureVector = [f64; FEATURE_DIM];

/// Reduce a metric series to (mean, min, max), in that order.
pub fn summarize(series: &[f64]) -> (f64, f64, f64) {
    (series.mean(), series.min(), series.max())
}

/// Assemble the feature vector for a window of derived samples.
///
/// Feature order: temperature, humidity, dew point, dew-point depression
/// (each as mean, min, max), then solar three times.
pub fn feature_vector(window: &[DerivedSample], solar: f64) -> FeatureVector {
    let temps: Vec<f64> = window.iter().map(|s| s.temperature).collect();
    let hums: Vec<f64> = window.iter().map(|s| s.humidity).collect();
    let dews: Vec<f64> = window.iter().map(|s| s.dew_point).collect();
    let depressions: Vec<f64> = window.iter().map(|s| s.dew_point_depression).collect();

    let mut features = [0.0; FEATURE_DIM];
    let mut i = 0;
    for series in [&temps, &hums, &dews, &depressions] {
        let (mean, min, max) = summarize(series);
        features[i] = mean;
        features[i + 1] = min;
        features[i + 2] = max;
        i += 3;
    }

    features[12] = solar;
    features[13] = solar;
    features[14] = solar;

    features
}
