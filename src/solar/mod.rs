//! Solar irradiance lookup.
//!
//! Point queries against the NASA POWER daily API, with the retry/fallback
//! policy the feature pipeline was trained against: walk back up to five
//! calendar days, treat the service's −999 sentinel as "no data", and fall
//! back to a fixed climatological constant when nothing resolves.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::defaults::{
    SOLAR_FALLBACK, SOLAR_HTTP_TIMEOUT_SECS, SOLAR_NO_DATA_SENTINEL, SOLAR_RETRY_DAYS,
};

const POWER_BASE_URL: &str = "https://power.larc.nasa.gov/api/temporal/daily/point";
const POWER_PARAMETER: &str = "ALLSKY_SFC_SW_DWN";

/// Resolves a daily irradiance scalar for a coordinate pair.
///
/// Implementations absorb their own failures; `resolve` always produces a
/// usable scalar so a flaky lookup can never abort a field evaluation.
#[async_trait]
pub trait SolarLookup: Send + Sync {
    async fn resolve(&self, latitude: f64, longitude: f64) -> f64;
}

/// Fixed-value lookup double for tests and offline runs.
#[derive(Debug, Clone, Copy)]
pub struct FixedSolar(pub f64);

#[async_trait]
impl SolarLookup for FixedSolar {
    async fn resolve(&self, _latitude: f64, _longitude: f64) -> f64 {
        self.0
    }
}

#[derive(Debug, thiserror::Error)]
enum LookupError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("no value for requested date")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct PowerResponse {
    properties: PowerProperties,
}

#[derive(Debug, Deserialize)]
struct PowerProperties {
    parameter: PowerParameter,
}

#[derive(Debug, Deserialize)]
struct PowerParameter {
    #[serde(rename = "ALLSKY_SFC_SW_DWN")]
    irradiance: BTreeMap<String, f64>,
}

/// NASA POWER client for all-sky surface shortwave irradiance.
#[derive(Clone)]
pub struct NasaPowerClient {
    http: reqwest::Client,
    base_url: String,
}

impl NasaPowerClient {
    pub fn new() -> Self {
        Self::with_base_url(POWER_BASE_URL)
    }

    /// Point the client at a different endpoint (integration tests).
    pub fn with_base_url(base_url: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(SOLAR_HTTP_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_date(
        &self,
        latitude: f64,
        longitude: f64,
        date: NaiveDate,
    ) -> Result<f64, LookupError> {
        let date_str = date.format("%Y%m%d").to_string();
        let lat = latitude.to_string();
        let lon = longitude.to_string();
        let resp = self
            .http
            .get(&self.base_url)
            .query(&[
                ("parameters", POWER_PARAMETER),
                ("latitude", lat.as_str()),
                ("longitude", lon.as_str()),
                ("start", date_str.as_str()),
                ("end", date_str.as_str()),
                ("format", "JSON"),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(LookupError::Status(resp.status()));
        }

        let body: PowerResponse = resp.json().await?;
        body.properties
            .parameter
            .irradiance
            .into_values()
            .next()
            .ok_or(LookupError::Empty)
    }
}

impl Default for NasaPowerClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SolarLookup for NasaPowerClient {
    /// Try today and up to four preceding days; the first real value wins.
    async fn resolve(&self, latitude: f64, longitude: f64) -> f64 {
        let today = Utc::now().date_naive();

        for days_back in 0..SOLAR_RETRY_DAYS {
            let date = today - ChronoDuration::days(days_back);

            match self.fetch_date(latitude, longitude, date).await {
                Ok(value) if value != SOLAR_NO_DATA_SENTINEL => {
                    debug!(lat = latitude, lon = longitude, %date, value, "Resolved solar irradiance");
                    return value;
                }
                Ok(_) => {
                    debug!(%date, "Irradiance not yet published for date, trying earlier day");
                }
                Err(e) => {
                    debug!(%date, error = %e, "Irradiance lookup attempt failed");
                }
            }
        }

        warn!(
            lat = latitude,
            lon = longitude,
            fallback = SOLAR_FALLBACK,
            "All irradiance lookups failed, using fallback"
        );
        SOLAR_FALLBACK
    }
}
