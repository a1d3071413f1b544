//! Sled-backed record store.
//!
//! Trees are named after the system-of-record paths; time-series trees use
//! big-endian millisecond keys so iteration order is chronological order.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{RecordStore, StoreError};
use crate::types::{FieldStatus, PredictionRecord, RiskLevel, SensorSample};

const LIVE_STATUS_SUFFIX: &str = "/live_status";

/// Record store backed by an embedded sled database.
#[derive(Clone)]
pub struct SledStore {
    db: Arc<sled::Db>,
}

impl SledStore {
    /// Open or create the store at the given directory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Self { db: Arc::new(db) })
    }

    fn live_status_tree(&self, user: &str) -> Result<sled::Tree, sled::Error> {
        self.db.open_tree(format!("users/{user}{LIVE_STATUS_SUFFIX}"))
    }

    fn historical_tree(&self, user: &str, field: &str) -> Result<sled::Tree, sled::Error> {
        self.db
            .open_tree(format!("users/{user}/historical_logs/{field}"))
    }

    fn history_tree_name(user: &str, field: &str) -> String {
        format!("users/{user}/history/{field}")
    }

    fn history_tree(&self, user: &str, field: &str) -> Result<sled::Tree, sled::Error> {
        self.db.open_tree(Self::history_tree_name(user, field))
    }

    /// Overwrite a field's full live-status document.
    ///
    /// This is the ingest-side write; the evaluation pipeline only updates
    /// the `prediction` keys within the document.
    pub fn put_live_status(
        &self,
        user: &str,
        field: &str,
        doc: &Value,
    ) -> Result<(), StoreError> {
        let tree = self.live_status_tree(user)?;
        tree.insert(field.as_bytes(), serde_json::to_vec(doc)?)?;
        Ok(())
    }

    /// Append a raw entry to a field's historical log (ingest-side write).
    pub fn put_historical_entry(
        &self,
        user: &str,
        field: &str,
        timestamp_ms: u64,
        doc: &Value,
    ) -> Result<(), StoreError> {
        let tree = self.historical_tree(user, field)?;
        tree.insert(timestamp_ms.to_be_bytes(), serde_json::to_vec(doc)?)?;
        Ok(())
    }

    /// Number of entries in a field's archive (used by tests and maintenance).
    pub fn archive_len(&self, user: &str, field: &str) -> Result<usize, StoreError> {
        Ok(self.history_tree(user, field)?.len())
    }

    /// Raw live-status document for a field, if one exists.
    pub fn live_status_doc(&self, user: &str, field: &str) -> Result<Option<Value>, StoreError> {
        let tree = self.live_status_tree(user)?;
        match tree.get(field.as_bytes())? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    fn read_live_doc(tree: &sled::Tree, field: &str) -> Result<Value, StoreError> {
        match tree.get(field.as_bytes())? {
            Some(raw) => Ok(serde_json::from_slice(&raw)?),
            None => Ok(Value::Object(serde_json::Map::new())),
        }
    }

    fn update_live_doc<F>(&self, user: &str, field: &str, mutate: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Value),
    {
        let tree = self.live_status_tree(user)?;
        let mut doc = Self::read_live_doc(&tree, field)?;
        if !doc.is_object() {
            doc = Value::Object(serde_json::Map::new());
        }
        mutate(&mut doc);
        tree.insert(field.as_bytes(), serde_json::to_vec(&doc)?)?;
        Ok(())
    }
}

fn decode_ts(key: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = key.try_into().ok()?;
    Some(u64::from_be_bytes(bytes))
}

#[async_trait]
impl RecordStore for SledStore {
    async fn users(&self) -> Result<Vec<String>, StoreError> {
        let mut users: Vec<String> = self
            .db
            .tree_names()
            .into_iter()
            .filter_map(|name| {
                let name = String::from_utf8(name.to_vec()).ok()?;
                let rest = name.strip_prefix("users/")?;
                let user = rest.strip_suffix(LIVE_STATUS_SUFFIX)?;
                // Guard against nested paths sharing the suffix
                (!user.contains('/')).then(|| user.to_string())
            })
            .collect();
        users.sort();
        users.dedup();
        Ok(users)
    }

    async fn live_fields(&self, user: &str) -> Result<Vec<(String, FieldStatus)>, StoreError> {
        let tree = self.live_status_tree(user)?;
        let mut fields = Vec::new();

        for item in tree.iter() {
            let (key, value) = item?;
            let Ok(field) = String::from_utf8(key.to_vec()) else {
                continue;
            };
            let Ok(doc) = serde_json::from_slice::<Value>(&value) else {
                tracing::warn!(user = %user, field = %field, "Malformed live-status document, skipping");
                continue;
            };
            fields.push((field, FieldStatus::from_doc(&doc)));
        }

        Ok(fields)
    }

    async fn write_prediction(
        &self,
        user: &str,
        field: &str,
        record: &PredictionRecord,
    ) -> Result<(), StoreError> {
        let value = serde_json::to_value(record)?;
        self.update_live_doc(user, field, |doc| {
            if let Some(obj) = doc.as_object_mut() {
                obj.insert("prediction".to_string(), value);
            }
        })
    }

    async fn write_probe_prediction(
        &self,
        user: &str,
        field: &str,
        probe: &str,
        risk: RiskLevel,
    ) -> Result<(), StoreError> {
        self.update_live_doc(user, field, |doc| {
            let Some(obj) = doc.as_object_mut() else { return };

            let probes = obj
                .entry("probes")
                .or_insert_with(|| Value::Object(Default::default()));
            if !probes.is_object() {
                *probes = Value::Object(Default::default());
            }
            let Some(probes) = probes.as_object_mut() else { return };

            let probe_doc = probes
                .entry(probe)
                .or_insert_with(|| Value::Object(Default::default()));
            if !probe_doc.is_object() {
                *probe_doc = Value::Object(Default::default());
            }
            if let Some(probe_doc) = probe_doc.as_object_mut() {
                probe_doc.insert("prediction".to_string(), Value::String(risk.to_string()));
            }
        })
    }

    async fn historical_tail(
        &self,
        user: &str,
        field: &str,
        n: usize,
    ) -> Result<Vec<SensorSample>, StoreError> {
        let tree = self.historical_tree(user, field)?;

        // Take the raw tail first, then validate; invalid entries inside the
        // tail shrink the window rather than reaching further back.
        let mut samples = Vec::with_capacity(n);
        for item in tree.iter().rev().take(n) {
            let (key, value) = item?;
            let Some(ts) = decode_ts(&key) else { continue };
            let Ok(doc) = serde_json::from_slice::<Value>(&value) else {
                continue;
            };
            if let Some(sample) = doc
                .get("env")
                .and_then(|env| SensorSample::from_env(env, ts))
            {
                samples.push(sample);
            }
        }

        samples.reverse();
        Ok(samples)
    }

    async fn latest_archive_timestamp(
        &self,
        user: &str,
        field: &str,
    ) -> Result<Option<u64>, StoreError> {
        let tree = self.history_tree(user, field)?;
        Ok(tree.last()?.and_then(|(key, _)| decode_ts(&key)))
    }

    async fn append_archive(
        &self,
        user: &str,
        field: &str,
        sample: &SensorSample,
    ) -> Result<(), StoreError> {
        let tree = self.history_tree(user, field)?;
        tree.insert(
            sample.timestamp_ms.to_be_bytes(),
            serde_json::to_vec(sample)?,
        )?;
        Ok(())
    }

    async fn fields_with_history(&self, user: &str) -> Result<Vec<String>, StoreError> {
        let prefix = format!("users/{user}/history/");
        let mut fields = Vec::new();

        for name in self.db.tree_names() {
            let Ok(name) = String::from_utf8(name.to_vec()) else {
                continue;
            };
            let Some(field) = name.strip_prefix(&prefix) else {
                continue;
            };
            if field.contains('/') {
                continue;
            }
            if !self.db.open_tree(&name)?.is_empty() {
                fields.push(field.to_string());
            }
        }

        fields.sort();
        Ok(fields)
    }

    async fn delete_history(&self, user: &str, field: &str) -> Result<usize, StoreError> {
        let name = Self::history_tree_name(user, field);
        let count = self.db.open_tree(&name)?.len();
        self.db.drop_tree(name.as_bytes())?;
        Ok(count)
    }
}
