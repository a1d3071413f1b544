//! Fleet scheduler: the supervised periodic evaluation loop.
//!
//! One long-lived task walks every user, field, and probe on a fixed period.
//! Failures are absorbed at the narrowest boundary that can still make
//! progress: a field failure is recorded and the pass continues, a pass
//! failure is logged and the loop sleeps until the next pass. Each pass
//! produces a [`PassReport`] so outcomes are observable from the status
//! endpoint instead of only from log output.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::evaluator::{FieldEvaluator, FieldOutcome};
use crate::storage::{RecordStore, StoreError};
use crate::types::RiskLevel;

/// Outcome of one field within a pass.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldResult {
    Scored {
        risk: RiskLevel,
        probes_written: usize,
    },
    Skipped {
        reason: String,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FieldReport {
    pub user: String,
    pub field: String,
    #[serde(flatten)]
    pub result: FieldResult,
}

/// Summary of one full fleet pass.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PassReport {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub users_seen: usize,
    pub fields_scored: usize,
    pub fields_skipped: usize,
    pub fields_failed: usize,
    pub fields: Vec<FieldReport>,
}

/// Shared scheduler state exposed through the HTTP status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerState {
    pub started_at: DateTime<Utc>,
    pub passes_completed: u64,
    pub passes_failed: u64,
    pub last_pass: Option<PassReport>,
}

impl SchedulerState {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            passes_completed: 0,
            passes_failed: 0,
            last_pass: None,
        }
    }
}

/// Periodically evaluates the whole fleet, one field at a time.
pub struct FleetScheduler {
    evaluator: FieldEvaluator,
    store: Arc<dyn RecordStore>,
    interval: Duration,
    state: Arc<RwLock<SchedulerState>>,
}

impl FleetScheduler {
    pub fn new(
        evaluator: FieldEvaluator,
        store: Arc<dyn RecordStore>,
        interval: Duration,
    ) -> Self {
        Self {
            evaluator,
            store,
            interval,
            state: Arc::new(RwLock::new(SchedulerState::new())),
        }
    }

    /// Handle to the shared state, for the HTTP shell.
    pub fn state(&self) -> Arc<RwLock<SchedulerState>> {
        Arc::clone(&self.state)
    }

    /// Run passes until cancellation. Never returns on its own.
    pub async fn run(self, cancel: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Fleet scheduler starting");

        loop {
            match self.run_pass().await {
                Ok(report) => {
                    info!(
                        users = report.users_seen,
                        scored = report.fields_scored,
                        skipped = report.fields_skipped,
                        failed = report.fields_failed,
                        duration_ms = report.duration_ms,
                        "Fleet pass complete"
                    );
                    let mut state = self.state.write().await;
                    state.passes_completed += 1;
                    state.last_pass = Some(report);
                }
                Err(e) => {
                    // A pass-level failure is logged and absorbed; the loop
                    // always survives to the next scheduled pass.
                    error!(error = %e, "Fleet pass failed");
                    self.state.write().await.passes_failed += 1;
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Fleet scheduler shutting down");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    /// Evaluate every field of every user once.
    pub async fn run_pass(&self) -> Result<PassReport, StoreError> {
        let started_at = Utc::now();
        let start = std::time::Instant::now();

        let users = self.store.users().await?;
        let mut fields = Vec::new();

        for user in &users {
            let live_fields = match self.store.live_fields(user).await {
                Ok(fields) => fields,
                Err(e) => {
                    warn!(user = %user, error = %e, "Failed to list fields, skipping user");
                    continue;
                }
            };

            for (field, status) in live_fields {
                let result = match self.evaluator.evaluate_field(user, &field, &status).await {
                    Ok(FieldOutcome::Scored {
                        risk,
                        probes_written,
                    }) => FieldResult::Scored {
                        risk,
                        probes_written,
                    },
                    Ok(FieldOutcome::Skipped(reason)) => FieldResult::Skipped {
                        reason: reason.to_string(),
                    },
                    Err(e) => {
                        warn!(user = %user, field = %field, error = %e, "Field evaluation failed");
                        FieldResult::Failed {
                            error: e.to_string(),
                        }
                    }
                };

                fields.push(FieldReport {
                    user: user.clone(),
                    field,
                    result,
                });
            }
        }

        let fields_scored = fields
            .iter()
            .filter(|r| matches!(r.result, FieldResult::Scored { .. }))
            .count();
        let fields_skipped = fields
            .iter()
            .filter(|r| matches!(r.result, FieldResult::Skipped { .. }))
            .count();
        let fields_failed = fields
            .iter()
            .filter(|r| matches!(r.result, FieldResult::Failed { .. }))
            .count();

        Ok(PassReport {
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            users_seen: users.len(),
            fields_scored,
            fields_skipped,
            fields_failed,
            fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::{AnomalyScorer, FeatureScaler, IdentityModel, FEATURE_DIM};
    use crate::solar::FixedSolar;
    use crate::storage::SledStore;
    use crate::types::{FieldStatus, PredictionRecord, SensorSample};
    use async_trait::async_trait;
    use serde_json::json;

    fn scheduler_over(store: Arc<dyn RecordStore>) -> FleetScheduler {
        let scaler = FeatureScaler::from_params(vec![0.0; FEATURE_DIM], vec![1.0; FEATURE_DIM])
            .expect("valid params");
        let scorer =
            Arc::new(AnomalyScorer::new(scaler, Arc::new(IdentityModel), 0.5).expect("scorer"));
        let evaluator = FieldEvaluator::new(
            Arc::clone(&store),
            Arc::new(FixedSolar(5.0)),
            scorer,
            None,
        );
        FleetScheduler::new(evaluator, store, Duration::from_secs(1_800))
    }

    fn open_store() -> (tempfile::TempDir, SledStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SledStore::open(dir.path().join("db")).expect("open");
        (dir, store)
    }

    fn seed_field(store: &SledStore, user: &str, field: &str, history: usize) {
        store
            .put_live_status(user, field, &json!({"env": {"temp": 25.0, "hum": 50.0}}))
            .expect("seed");
        for i in 0..history {
            store
                .put_historical_entry(
                    user,
                    field,
                    1_000 + i as u64,
                    &json!({"env": {"temp": 25.0, "hum": 50.0}}),
                )
                .expect("seed");
        }
    }

    #[tokio::test]
    async fn test_pass_reports_mixed_outcomes() {
        let (_dir, store) = open_store();
        seed_field(&store, "u1", "ready", 47);
        seed_field(&store, "u1", "warming-up", 10);
        store
            .put_live_status("u1", "no-sensor", &json!({"probes": {}}))
            .expect("seed");

        let scheduler = scheduler_over(Arc::new(store));
        let report = scheduler.run_pass().await.expect("pass");

        assert_eq!(report.users_seen, 1);
        assert_eq!(report.fields_scored, 1);
        assert_eq!(report.fields_skipped, 2);
        assert_eq!(report.fields_failed, 0);
        assert_eq!(report.fields.len(), 3);
    }

    /// Store wrapper that fails `historical_tail` for one poisoned field.
    struct PoisonedStore {
        inner: SledStore,
        poisoned_field: String,
    }

    #[async_trait]
    impl RecordStore for PoisonedStore {
        async fn users(&self) -> Result<Vec<String>, StoreError> {
            self.inner.users().await
        }

        async fn live_fields(
            &self,
            user: &str,
        ) -> Result<Vec<(String, FieldStatus)>, StoreError> {
            self.inner.live_fields(user).await
        }

        async fn write_prediction(
            &self,
            user: &str,
            field: &str,
            record: &PredictionRecord,
        ) -> Result<(), StoreError> {
            self.inner.write_prediction(user, field, record).await
        }

        async fn write_probe_prediction(
            &self,
            user: &str,
            field: &str,
            probe: &str,
            risk: RiskLevel,
        ) -> Result<(), StoreError> {
            self.inner
                .write_probe_prediction(user, field, probe, risk)
                .await
        }

        async fn historical_tail(
            &self,
            user: &str,
            field: &str,
            n: usize,
        ) -> Result<Vec<SensorSample>, StoreError> {
            if field == self.poisoned_field {
                return Err(StoreError::Database(sled::Error::Unsupported(
                    "injected fault".to_string(),
                )));
            }
            self.inner.historical_tail(user, field, n).await
        }

        async fn latest_archive_timestamp(
            &self,
            user: &str,
            field: &str,
        ) -> Result<Option<u64>, StoreError> {
            self.inner.latest_archive_timestamp(user, field).await
        }

        async fn append_archive(
            &self,
            user: &str,
            field: &str,
            sample: &SensorSample,
        ) -> Result<(), StoreError> {
            self.inner.append_archive(user, field, sample).await
        }

        async fn fields_with_history(&self, user: &str) -> Result<Vec<String>, StoreError> {
            self.inner.fields_with_history(user).await
        }

        async fn delete_history(&self, user: &str, field: &str) -> Result<usize, StoreError> {
            self.inner.delete_history(user, field).await
        }
    }

    #[tokio::test]
    async fn test_field_failure_does_not_abort_pass() {
        let (_dir, store) = open_store();
        // "broken" sorts before "healthy", so the failure happens first
        seed_field(&store, "u1", "broken", 47);
        seed_field(&store, "u1", "healthy", 47);

        let poisoned = PoisonedStore {
            inner: store,
            poisoned_field: "broken".to_string(),
        };

        let scheduler = scheduler_over(Arc::new(poisoned));
        let report = scheduler.run_pass().await.expect("pass");

        assert_eq!(report.fields_failed, 1);
        assert_eq!(report.fields_scored, 1);

        let healthy = report
            .fields
            .iter()
            .find(|f| f.field == "healthy")
            .expect("present");
        assert!(matches!(healthy.result, FieldResult::Scored { .. }));
    }
}
