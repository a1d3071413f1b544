//! REST API shell using Axum.
//!
//! A thin boundary over the scheduler state: liveness at `/health`, fleet
//! pass statistics at `/api/v1/status`. No pipeline logic lives here.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::scheduler::{PassReport, SchedulerState};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ApiState {
    pub scheduler: Arc<RwLock<SchedulerState>>,
}

/// Build the application router.
///
/// CORS is permissive: the dashboard and the mobile app are served from
/// different origins than this service.
pub fn create_app(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/api/v1/status", get(get_status))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    started_at: DateTime<Utc>,
    passes_completed: u64,
    passes_failed: u64,
    last_pass: Option<PassReport>,
}

async fn get_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let scheduler = state.scheduler.read().await;

    Json(StatusResponse {
        started_at: scheduler.started_at,
        passes_completed: scheduler.passes_completed,
        passes_failed: scheduler.passes_failed,
        last_pass: scheduler.last_pass.clone(),
    })
}
