//! Live connection streams and dashboard endpoints.

use crate::error::ApiError;
use crate::extension_rest::json_body;
use crate::rest::{AppState, ErrorResponse};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use campaign_core::types::VisitorSummary;
use campaign_realtime::{LiveEvent, LiveStream};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::Infallible;
use tokio_stream::{Stream, StreamExt};
use tracing::{error, warn};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConnectionCountResponse {
    pub count: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NotifyResponse {
    /// False when the live channel is unavailable.
    pub published: bool,
}

fn to_sse(stream: LiveStream) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = stream.map(|event| Ok(Event::default().event(event.event_name()).data(event.data())));
    Sse::new(events).keep_alive(KeepAlive::default())
}

/// GET /api/extension/live: counts this client as an open connection until
/// it disconnects.
pub async fn extension_live(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    to_sse(campaign_realtime::extension_stream(state.counter.clone()).await)
}

/// GET /api/realtime/stream
pub async fn dashboard_stream(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    to_sse(campaign_realtime::dashboard_stream(state.counter.clone()).await)
}

/// GET /api/realtime/count
#[utoipa::path(
    get,
    path = "/api/realtime/count",
    tag = "Realtime",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Open extension connections, 0 when Redis is unavailable", body = ConnectionCountResponse),
        (status = 401, description = "Missing bearer token", body = ErrorResponse),
        (status = 403, description = "Unknown bearer token", body = ErrorResponse),
    )
)]
pub async fn connection_count(State(state): State<AppState>) -> Json<ConnectionCountResponse> {
    let count = if state.counter.is_available() {
        state.counter.current().await.unwrap_or_else(|e| {
            warn!(error = %e, "Connection count read failed");
            0
        })
    } else {
        0
    };
    Json(ConnectionCountResponse { count })
}

/// POST /api/realtime/notify: forwards the JSON body to every open live
/// stream as a `notification` event.
#[utoipa::path(
    post,
    path = "/api/realtime/notify",
    tag = "Realtime",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Publish attempted", body = NotifyResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
    )
)]
pub async fn push_notification(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<NotifyResponse>, ApiError> {
    let payload: Value = json_body(&headers, &body)?;
    let published = match state.counter.publish(&LiveEvent::Notification { payload }).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Live notification not published");
            false
        }
    };
    Ok(Json(NotifyResponse { published }))
}

/// GET /api/realtime/visitors/{visitorId}
#[utoipa::path(
    get,
    path = "/api/realtime/visitors/{visitorId}",
    tag = "Realtime",
    security(("bearer" = [])),
    params(("visitorId" = String, Path, description = "Extension visitor id")),
    responses(
        (status = 200, description = "Visitor activity summary", body = VisitorSummary),
        (status = 404, description = "Visitor has no events", body = ErrorResponse),
    )
)]
pub async fn visitor_summary(
    State(state): State<AppState>,
    Path(visitor_id): Path<String>,
) -> Result<Json<VisitorSummary>, ApiError> {
    let summary = state
        .repository()
        .visitor_summary(&visitor_id)
        .await
        .map_err(|e| {
            error!(error = %e, visitor_id = %visitor_id, "Visitor summary failed");
            ApiError::internal(format!("{e:#}"), state.environment)
        })?;
    summary
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("visitor {visitor_id}")))
}
