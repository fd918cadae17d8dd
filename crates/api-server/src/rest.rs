//! Shared handler state and operational endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use campaign_core::config::{AppConfig, Environment};
use campaign_engine::{NotificationInbox, ServeProcessor};
use campaign_realtime::ConnectionCounter;
use campaign_store::CampaignRepository;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;
use utoipa::ToSchema;

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<ServeProcessor>,
    pub inbox: Arc<NotificationInbox>,
    pub counter: Arc<ConnectionCounter>,
    pub environment: Environment,
    pub admin_tokens: Arc<HashSet<String>>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: &AppConfig,
        repo: Arc<dyn CampaignRepository>,
        counter: Arc<ConnectionCounter>,
    ) -> Self {
        Self {
            processor: Arc::new(ServeProcessor::new(repo.clone())),
            inbox: Arc::new(NotificationInbox::new(repo)),
            counter,
            environment: config.environment,
            admin_tokens: Arc::new(
                config
                    .admin
                    .api_tokens
                    .iter()
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect(),
            ),
            start_time: Instant::now(),
        }
    }

    pub fn repository(&self) -> &Arc<dyn CampaignRepository> {
        self.processor.repository()
    }
}

/// GET /health
#[utoipa::path(
    get,
    path = "/health",
    tag = "Operations",
    responses((status = 200, description = "Service is running", body = HealthResponse))
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        realtime: state.counter.is_available(),
    })
}

/// GET /ready: 200 only while the campaign store answers.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "Operations",
    responses(
        (status = 200, description = "Store reachable"),
        (status = 503, description = "Store unreachable"),
    )
)]
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.repository().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// GET /live
#[utoipa::path(
    get,
    path = "/live",
    tag = "Operations",
    responses((status = 200, description = "Process is alive"))
)]
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    /// Whether the live connection counter reached Redis.
    pub realtime: bool,
}
