//! Risk levels, soil categories, and the per-field prediction record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Farm- and probe-level risk classification.
///
/// Strictly ordered severity scale; downstream alerting relies on the
/// uppercase wire strings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Normal = 0,
    Watch = 1,
    Warning = 2,
    High = 3,
}

impl RiskLevel {
    /// Fixed human-readable reason string for the farm-level record.
    pub fn reason(self) -> &'static str {
        match self {
            RiskLevel::High => "High humidity and low solar drying",
            RiskLevel::Watch => "Elevated risk parameters detected",
            _ => "Normal conditions",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Normal => write!(f, "NORMAL"),
            RiskLevel::Watch => write!(f, "WATCH"),
            RiskLevel::Warning => write!(f, "WARNING"),
            RiskLevel::High => write!(f, "HIGH"),
        }
    }
}

impl Default for RiskLevel {
    fn default() -> Self {
        RiskLevel::Normal
    }
}

/// Soil moisture category used by the grid combiner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum SoilCategory {
    Dry,
    Moderate,
    Wet,
}

/// Farm-level prediction, overwritten each evaluation cycle.
///
/// Written atomically as a single value; there is never a partially
/// updated record in the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionRecord {
    pub risk: RiskLevel,
    pub anomaly_score: f64,
    pub confidence: f64,
    pub reason: String,
    #[serde(rename = "lastUpdated")]
    pub last_updated: DateTime<Utc>,
}

impl PredictionRecord {
    pub fn new(risk: RiskLevel, anomaly_score: f64, confidence: f64) -> Self {
        Self {
            risk,
            anomaly_score,
            confidence,
            reason: risk.reason().to_string(),
            last_updated: Utc::now(),
        }
    }
}
