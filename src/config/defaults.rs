//! System-wide default constants.
//!
//! Centralises magic numbers used across the evaluation pipeline.
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Evaluation Window
// ============================================================================

/// Number of derived samples required to run a scoring cycle.
///
/// 47 retrieved from the historical log + 1 live sample.
pub const WINDOW_SIZE: usize = 48;

/// Maximum number of prior samples fetched from the historical log.
pub const HISTORY_FETCH_LIMIT: usize = WINDOW_SIZE - 1;

// ============================================================================
// Archiving
// ============================================================================

/// Minimum spacing between archive writes for a field (milliseconds).
///
/// 1 500 000 ms = 25 minutes. Predictions may run more often than this;
/// the archive cadence is deliberately decoupled from the prediction cadence.
pub const ARCHIVE_MIN_INTERVAL_MS: u64 = 1_500_000;

// ============================================================================
// Fleet Scheduler
// ============================================================================

/// Interval between fleet passes (seconds). 1 800 = 30 minutes.
pub const PASS_INTERVAL_SECS: u64 = 1_800;

// ============================================================================
// Solar Irradiance Lookup
// ============================================================================

/// Irradiance used when every lookup attempt fails (kWh/m²/day).
pub const SOLAR_FALLBACK: f64 = 5.0;

/// Irradiance used when the field has no coordinates at all.
///
/// Applied before any lookup is attempted; distinct from the lookup
/// failure fallback above.
pub const SOLAR_NO_COORDS: f64 = 0.0;

/// Sentinel the irradiance service returns for "no data available".
pub const SOLAR_NO_DATA_SENTINEL: f64 = -999.0;

/// How many preceding calendar days to try before giving up.
pub const SOLAR_RETRY_DAYS: i64 = 5;

/// HTTP timeout for a single irradiance request (seconds).
pub const SOLAR_HTTP_TIMEOUT_SECS: u64 = 5;

/// Default site coordinates used when a field reports none of its own.
pub const DEFAULT_SITE_LATITUDE: f64 = 20.5937;
pub const DEFAULT_SITE_LONGITUDE: f64 = 78.9629;

// ============================================================================
// Scoring
// ============================================================================

/// Fraction of the anomaly threshold that opens the WATCH sub-band.
///
/// `threshold * WATCH_BAND_RATIO < error <= threshold` classifies as WATCH.
pub const WATCH_BAND_RATIO: f64 = 0.7;

/// Relative humidity floor substituted before the Magnus logarithm (%).
pub const MIN_HUMIDITY_PCT: f64 = 0.1;

// ============================================================================
// Server
// ============================================================================

/// Default HTTP bind address.
pub const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:8000";

/// Default data directory for the record store.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Default model artifact paths.
pub const DEFAULT_SCALER_PATH: &str = "models/climate_scaler.json";
pub const DEFAULT_WEIGHTS_PATH: &str = "models/climate_autoencoder.json";
pub const DEFAULT_THRESHOLD_PATH: &str = "models/climate_threshold.txt";
