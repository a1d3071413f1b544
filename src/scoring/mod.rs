//! Anomaly scoring pipeline: derived metrics, feature extraction,
//! model-backed scoring, and the soil grid combiner.
//!
//! Everything here is pure computation apart from artifact loading;
//! the evaluator wires it to live data.

pub mod dewpoint;
pub mod features;
pub mod grid;
pub mod model;

pub use features::{feature_vector, summarize, FeatureVector, FEATURE_DIM};
pub use grid::{grid_risk, soil_category};
pub use model::{
    load_threshold, AnomalyScorer, Assessment, DenseAutoencoder, FeatureScaler, IdentityModel,
    ModelError, ReconstructionModel,
};
