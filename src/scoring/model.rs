//! Anomaly scoring against the pretrained reconstruction model.
//!
//! The model and its feature scaler are trained offline and shipped as JSON
//! artifacts; this module only loads and evaluates them. The scorer consumes
//! the model behind [`ReconstructionModel`], so tests can substitute a
//! zero-error double without touching artifacts.

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use super::features::{FeatureVector, FEATURE_DIM};
use crate::config::defaults::WATCH_BAND_RATIO;
use crate::types::RiskLevel;

/// Errors raised while loading artifacts or constructing the scorer.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("failed to read artifact {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse artifact {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("artifact shape mismatch: {0}")]
    Shape(String),
    #[error("invalid threshold: {0}")]
    Threshold(String),
}

// ============================================================================
// Feature Scaler
// ============================================================================

/// Pre-fit per-feature normalization (subtract mean, divide by scale).
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl FeatureScaler {
    /// Load a scaler exported by the offline training pipeline.
    pub fn from_artifact<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let scaler: Self = read_json(path.as_ref())?;
        scaler.validate()?;
        Ok(scaler)
    }

    /// Build a scaler from in-memory parameters (used by tests).
    pub fn from_params(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, ModelError> {
        let scaler = Self { mean, scale };
        scaler.validate()?;
        Ok(scaler)
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.mean.len() != FEATURE_DIM || self.scale.len() != FEATURE_DIM {
            return Err(ModelError::Shape(format!(
                "scaler expects {} features, artifact has mean={} scale={}",
                FEATURE_DIM,
                self.mean.len(),
                self.scale.len()
            )));
        }
        if self.scale.iter().any(|s| !s.is_finite() || *s == 0.0) {
            return Err(ModelError::Shape(
                "scaler contains a zero or non-finite scale entry".to_string(),
            ));
        }
        Ok(())
    }

    /// Normalize a feature vector into model space.
    pub fn normalize(&self, features: &FeatureVector) -> FeatureVector {
        let mut out = [0.0; FEATURE_DIM];
        for i in 0..FEATURE_DIM {
            out[i] = (features[i] - self.mean[i]) / self.scale[i];
        }
        out
    }
}

// ============================================================================
// Reconstruction Model
// ============================================================================

/// Opaque scoring interface: a normalized vector in, its reconstruction out.
pub trait ReconstructionModel: Send + Sync {
    fn reconstruct(&self, input: &FeatureVector) -> FeatureVector;
}

/// Zero-error model double: reconstruction equals the input exactly.
///
/// Makes the anomaly score 0 for any window; used by tests and smoke setups.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityModel;

impl ReconstructionModel for IdentityModel {
    fn reconstruct(&self, input: &FeatureVector) -> FeatureVector {
        *input
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Activation {
    Relu,
    Linear,
}

#[derive(Debug, Clone, Deserialize)]
struct DenseLayer {
    /// Row-major weights: one row of input weights per output unit.
    weights: Vec<Vec<f64>>,
    biases: Vec<f64>,
    activation: Activation,
}

impl DenseLayer {
    fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.biases)
            .map(|(row, bias)| {
                let sum: f64 = row.iter().zip(input).map(|(w, x)| w * x).sum();
                match self.activation {
                    Activation::Relu => (sum + bias).max(0.0),
                    Activation::Linear => sum + bias,
                }
            })
            .collect()
    }
}

/// Dense autoencoder evaluated from a JSON weights export.
#[derive(Debug, Clone, Deserialize)]
pub struct DenseAutoencoder {
    layers: Vec<DenseLayer>,
}

impl DenseAutoencoder {
    /// Load and shape-check an autoencoder artifact.
    pub fn from_artifact<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let model: Self = read_json(path.as_ref())?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.layers.is_empty() {
            return Err(ModelError::Shape("autoencoder has no layers".to_string()));
        }

        let mut width = FEATURE_DIM;
        for (idx, layer) in self.layers.iter().enumerate() {
            if layer.weights.len() != layer.biases.len() {
                return Err(ModelError::Shape(format!(
                    "layer {idx}: {} weight rows but {} biases",
                    layer.weights.len(),
                    layer.biases.len()
                )));
            }
            for row in &layer.weights {
                if row.len() != width {
                    return Err(ModelError::Shape(format!(
                        "layer {idx}: expected input width {width}, weight row has {}",
                        row.len()
                    )));
                }
            }
            width = layer.weights.len();
        }

        if width != FEATURE_DIM {
            return Err(ModelError::Shape(format!(
                "autoencoder output width {width} does not match feature dim {FEATURE_DIM}"
            )));
        }
        Ok(())
    }
}

impl ReconstructionModel for DenseAutoencoder {
    fn reconstruct(&self, input: &FeatureVector) -> FeatureVector {
        let mut current = input.to_vec();
        for layer in &self.layers {
            current = layer.forward(&current);
        }

        let mut out = [0.0; FEATURE_DIM];
        out.copy_from_slice(&current);
        out
    }
}

// ============================================================================
// Anomaly Scorer
// ============================================================================

/// Result of scoring one feature window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assessment {
    /// Mean squared reconstruction error in normalized space.
    pub anomaly_score: f64,
    pub risk: RiskLevel,
    /// `anomaly_score / threshold`, rounded to two decimals.
    pub confidence: f64,
}

/// Normalizes feature vectors, obtains reconstructions, and classifies the
/// reconstruction error against the process-wide threshold.
pub struct AnomalyScorer {
    scaler: FeatureScaler,
    model: Arc<dyn ReconstructionModel>,
    threshold: f64,
}

impl AnomalyScorer {
    /// The threshold is immutable configuration loaded once at startup.
    pub fn new(
        scaler: FeatureScaler,
        model: Arc<dyn ReconstructionModel>,
        threshold: f64,
    ) -> Result<Self, ModelError> {
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(ModelError::Threshold(format!(
                "threshold must be a finite positive number, got {threshold}"
            )));
        }
        Ok(Self {
            scaler,
            model,
            threshold,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Score a feature window.
    pub fn score(&self, features: &FeatureVector) -> Assessment {
        let normalized = self.scaler.normalize(features);
        let reconstructed = self.model.reconstruct(&normalized);

        let anomaly_score = normalized
            .iter()
            .zip(&reconstructed)
            .map(|(x, r)| (x - r) * (x - r))
            .sum::<f64>()
            / FEATURE_DIM as f64;

        let confidence = (anomaly_score / self.threshold * 100.0).round() / 100.0;

        Assessment {
            anomaly_score,
            risk: self.classify(anomaly_score),
            confidence,
        }
    }

    /// Classify a reconstruction error against the threshold.
    ///
    /// Strict comparisons on both boundaries: `error > threshold` is HIGH,
    /// `error > threshold * 0.7` is WATCH, anything else is NORMAL.
    pub fn classify(&self, error: f64) -> RiskLevel {
        if error > self.threshold {
            RiskLevel::High
        } else if error > self.threshold * WATCH_BAND_RATIO {
            RiskLevel::Watch
        } else {
            RiskLevel::Normal
        }
    }
}

/// Load the scalar anomaly threshold from its one-line text artifact.
pub fn load_threshold<P: AsRef<Path>>(path: P) -> Result<f64, ModelError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let threshold: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ModelError::Threshold(format!("cannot parse {:?}", raw.trim())))?;

    if !threshold.is_finite() || threshold <= 0.0 {
        return Err(ModelError::Threshold(format!(
            "threshold must be a finite positive number, got {threshold}"
        )));
    }
    Ok(threshold)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ModelError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ModelError::Parse {
        path: path.display().to_string(),
        source,
    })
}
