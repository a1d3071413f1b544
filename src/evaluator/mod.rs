//! Per-field evaluation orchestration.
//!
//! One call of [`FieldEvaluator::evaluate_field`] runs the full pipeline for
//! a single field: archive the live sample, assemble the scoring window,
//! vectorize, score, persist the farm-level prediction, then fold soil
//! moisture into per-probe risk. Skips are outcomes, not errors; only store
//! failures propagate, and the scheduler absorbs those at the field boundary.

pub mod archive;

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::defaults::{HISTORY_FETCH_LIMIT, SOLAR_NO_COORDS, WINDOW_SIZE};
use crate::scoring::{feature_vector, grid_risk, AnomalyScorer};
use crate::solar::SolarLookup;
use crate::storage::{RecordStore, StoreError};
use crate::types::{parse_numeric, DerivedSample, FieldStatus, PredictionRecord, RiskLevel};

use self::archive::archive_sample;

/// Why a field produced no prediction this cycle. Not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Live status carries no valid temperature/humidity snapshot.
    NoLiveSample,
    /// Not enough valid samples to fill the scoring window.
    ShortWindow { samples: usize },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NoLiveSample => write!(f, "no live sample"),
            SkipReason::ShortWindow { samples } => {
                write!(f, "short window ({samples}/{WINDOW_SIZE})")
            }
        }
    }
}

/// Result of evaluating one field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldOutcome {
    Scored {
        risk: RiskLevel,
        probes_written: usize,
    },
    Skipped(SkipReason),
}

/// Orchestrates the evaluation pipeline for single fields.
pub struct FieldEvaluator {
    store: Arc<dyn RecordStore>,
    solar: Arc<dyn SolarLookup>,
    scorer: Arc<AnomalyScorer>,
    /// Site-level coordinates used when a station reports none of its own.
    default_coords: Option<(f64, f64)>,
}

impl FieldEvaluator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        solar: Arc<dyn SolarLookup>,
        scorer: Arc<AnomalyScorer>,
        default_coords: Option<(f64, f64)>,
    ) -> Self {
        Self {
            store,
            solar,
            scorer,
            default_coords,
        }
    }

    /// Run the pipeline for one field.
    ///
    /// Returns the farm-level risk inside the outcome so callers never need
    /// to rescore; probe predictions are written here, in the same cycle.
    pub async fn evaluate_field(
        &self,
        user: &str,
        field: &str,
        status: &FieldStatus,
    ) -> Result<FieldOutcome, StoreError> {
        let now_ms = Utc::now().timestamp_millis().max(0) as u64;

        let Some(live) = status.live_sample(now_ms) else {
            debug!(user = %user, field = %field, "No valid live sample, skipping");
            return Ok(FieldOutcome::Skipped(SkipReason::NoLiveSample));
        };

        // Record keeping is decoupled from scoring: a throttled or failed
        // archive write never blocks the prediction below.
        match archive_sample(self.store.as_ref(), user, field, &live).await {
            Ok(archive::ArchiveOutcome::Throttled { elapsed_ms }) => {
                debug!(
                    user = %user,
                    field = %field,
                    elapsed_ms,
                    "Archive throttled, proceeding to prediction"
                );
            }
            Ok(outcome) => {
                debug!(user = %user, field = %field, ?outcome, ts = live.timestamp_ms, "Archived live sample");
            }
            Err(e) => {
                warn!(user = %user, field = %field, error = %e, "Archive write failed, proceeding to prediction");
            }
        }

        let history = self
            .store
            .historical_tail(user, field, HISTORY_FETCH_LIMIT)
            .await?;
        let samples = history.len() + 1;
        if samples < WINDOW_SIZE {
            debug!(
                user = %user,
                field = %field,
                samples,
                required = WINDOW_SIZE,
                "Insufficient window, skipping prediction"
            );
            return Ok(FieldOutcome::Skipped(SkipReason::ShortWindow { samples }));
        }

        let window: Vec<DerivedSample> = history
            .iter()
            .map(DerivedSample::from)
            .chain(std::iter::once(DerivedSample::from(&live)))
            .collect();

        let solar = match live.coordinates().or(self.default_coords) {
            Some((lat, lon)) => self.solar.resolve(lat, lon).await,
            None => SOLAR_NO_COORDS,
        };

        let features = feature_vector(&window, solar);
        let assessment = self.scorer.score(&features);

        let record = PredictionRecord::new(
            assessment.risk,
            assessment.anomaly_score,
            assessment.confidence,
        );
        self.store.write_prediction(user, field, &record).await?;
        info!(
            user = %user,
            field = %field,
            risk = %assessment.risk,
            anomaly_score = assessment.anomaly_score,
            "Prediction written"
        );

        let probes_written = self.combine_probes(user, field, status, assessment.risk).await;

        Ok(FieldOutcome::Scored {
            risk: assessment.risk,
            probes_written,
        })
    }

    /// Fold soil moisture into per-probe risk and persist it.
    ///
    /// Absorbs its own failures: an invalid reading or a failed write skips
    /// that probe and moves on.
    async fn combine_probes(
        &self,
        user: &str,
        field: &str,
        status: &FieldStatus,
        farm_risk: RiskLevel,
    ) -> usize {
        let mut written = 0;

        for (probe_id, probe) in &status.probes {
            let Some(raw) = probe.get("raw_moisture") else {
                continue;
            };

            let Some(moisture) = parse_numeric(raw) else {
                warn!(
                    user = %user,
                    field = %field,
                    probe = %probe_id,
                    raw = %raw,
                    "Invalid soil moisture value, probe prediction left unwritten"
                );
                continue;
            };

            let probe_risk = grid_risk(farm_risk, moisture);
            match self
                .store
                .write_probe_prediction(user, field, probe_id, probe_risk)
                .await
            {
                Ok(()) => {
                    info!(
                        user = %user,
                        field = %field,
                        probe = %probe_id,
                        moisture,
                        risk = %probe_risk,
                        "Probe prediction written"
                    );
                    written += 1;
                }
                Err(e) => {
                    warn!(
                        user = %user,
                        field = %field,
                        probe = %probe_id,
                        error = %e,
                        "Probe prediction write failed"
                    );
                }
            }
        }

        written
    }
}
