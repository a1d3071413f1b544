//! Sensor samples and the live-status shape read from the record store.
//!
//! Station firmware reports loosely-typed maps; everything is validated
//! into tagged structs here, at the ingestion boundary. Malformed shapes
//! are skipped by the caller rather than propagated as missing-key lookups.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::scoring::dewpoint;

/// One environmental snapshot from a station. Immutable once archived.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SensorSample {
    /// Air temperature (°C).
    pub temperature: f64,
    /// Relative humidity (% RH).
    pub humidity: f64,
    /// Epoch milliseconds.
    #[serde(rename = "timestamp")]
    pub timestamp_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl SensorSample {
    /// Validate a raw `env` map into a sample stamped at `timestamp_ms`.
    ///
    /// Requires numeric `temp` and `hum` keys (numbers or numeric strings,
    /// as reported by station firmware). Returns None for anything else.
    pub fn from_env(env: &Value, timestamp_ms: u64) -> Option<Self> {
        let temperature = parse_numeric(env.get("temp")?)?;
        let humidity = parse_numeric(env.get("hum")?)?;

        Some(Self {
            temperature,
            humidity,
            timestamp_ms,
            latitude: env.get("lat").and_then(parse_numeric),
            longitude: env.get("lon").and_then(parse_numeric),
        })
    }

    /// Both coordinates, when the station reports them.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}

/// A sensor sample with its computed moisture metrics. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedSample {
    pub temperature: f64,
    pub humidity: f64,
    pub dew_point: f64,
    pub dew_point_depression: f64,
}

impl DerivedSample {
    /// Compute dew point and depression for a temperature/humidity pair.
    pub fn derive(temperature: f64, humidity: f64) -> Self {
        let dew_point = dewpoint::dew_point(temperature, humidity);
        Self {
            temperature,
            humidity,
            dew_point,
            dew_point_depression: temperature - dew_point,
        }
    }
}

impl From<&SensorSample> for DerivedSample {
    fn from(sample: &SensorSample) -> Self {
        Self::derive(sample.temperature, sample.humidity)
    }
}

/// Live status of one field as stored in the system of record:
/// the raw `env` snapshot plus zero or more probe maps.
#[derive(Debug, Clone, Default)]
pub struct FieldStatus {
    pub env: Option<Value>,
    pub probes: BTreeMap<String, Value>,
}

impl FieldStatus {
    /// Split a raw live-status document into env and probe maps.
    pub fn from_doc(doc: &Value) -> Self {
        let env = doc.get("env").filter(|v| v.is_object()).cloned();

        let probes = doc
            .get("probes")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter(|(_, v)| v.is_object())
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();

        Self { env, probes }
    }

    /// Validate the live env snapshot, stamped at `timestamp_ms`.
    pub fn live_sample(&self, timestamp_ms: u64) -> Option<SensorSample> {
        SensorSample::from_env(self.env.as_ref()?, timestamp_ms)
    }
}

/// Parse a JSON number or numeric string into an f64.
pub fn parse_numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
