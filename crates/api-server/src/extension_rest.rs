//! Endpoints called by the browser extension.
//!
//! Bodies are taken as raw bytes so that a wrong Content-Type and malformed
//! JSON map onto the API's own error codes instead of axum's rejections.

use crate::error::ApiError;
use crate::rest::{AppState, ErrorResponse};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::Json;
use campaign_core::types::{ServeResponse, UnreadNotification};
use campaign_delivery::country_from_headers;
use campaign_delivery::geo::{CLOUDFLARE_COUNTRY_HEADER, VERCEL_COUNTRY_HEADER};
use campaign_engine::{RequestError, ServeRequest};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdBlockRequest {
    pub visitor_id: Option<String>,
    /// Required unless `requestType` is `"notification"`.
    pub domain: Option<String>,
    /// `"ad"`, `"notification"`, or omitted for both.
    pub request_type: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotificationsRequest {
    pub visitor_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NotificationsResponse {
    pub notifications: Vec<UnreadNotification>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DomainsResponse {
    pub domains: Vec<String>,
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

/// Check the Content-Type and decode a JSON body.
pub(crate) fn json_body<T: DeserializeOwned>(headers: &HeaderMap, body: &Bytes) -> Result<T, ApiError> {
    if !is_json(headers) {
        metrics::counter!("api.validation_errors").increment(1);
        return Err(ApiError::InvalidContentType);
    }
    serde_json::from_slice(body).map_err(|e| {
        metrics::counter!("api.validation_errors").increment(1);
        ApiError::InvalidJson(e.to_string())
    })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// POST /api/extension/ad-block
#[utoipa::path(
    post,
    path = "/api/extension/ad-block",
    tag = "Extension",
    request_body = AdBlockRequest,
    responses(
        (status = 200, description = "Ads and notifications for this page view", body = ServeResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 500, description = "Store failure", body = ErrorResponse),
    )
)]
pub async fn ad_block(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ServeResponse>, ApiError> {
    let payload: AdBlockRequest = json_body(&headers, &body)?;

    let country = country_from_headers(
        header_str(&headers, VERCEL_COUNTRY_HEADER),
        header_str(&headers, CLOUDFLARE_COUNTRY_HEADER),
    );

    let request = ServeRequest::new(
        payload.visitor_id.as_deref(),
        payload.domain.as_deref(),
        payload.request_type.as_deref(),
        country,
    )
    .map_err(|e| {
        warn!(error = %e, "Ad-block request validation failed");
        metrics::counter!("api.validation_errors").increment(1);
        ApiError::from(e)
    })?;

    match state.processor.serve(&request).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            error!(error = %e, visitor_id = %request.visitor_id, "Serve request failed");
            metrics::counter!("serve.errors").increment(1);
            Err(ApiError::internal(e, state.environment))
        }
    }
}

/// GET /api/extension/domains
#[utoipa::path(
    get,
    path = "/api/extension/domains",
    tag = "Extension",
    responses(
        (status = 200, description = "Active platform domains, www-stripped and sorted", body = DomainsResponse),
        (status = 500, description = "Store failure", body = ErrorResponse),
    )
)]
pub async fn domains(State(state): State<AppState>) -> Result<Json<DomainsResponse>, ApiError> {
    let domains = state.processor.active_domains().await.map_err(|e| {
        error!(error = %e, "Domain listing failed");
        ApiError::internal(e, state.environment)
    })?;
    Ok(Json(DomainsResponse { domains }))
}

/// POST /api/extension/notifications
#[utoipa::path(
    post,
    path = "/api/extension/notifications",
    tag = "Extension",
    request_body = NotificationsRequest,
    responses(
        (status = 200, description = "Unread notifications, now marked read", body = NotificationsResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 500, description = "Store failure", body = ErrorResponse),
    )
)]
pub async fn unread_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<NotificationsResponse>, ApiError> {
    let payload: NotificationsRequest = json_body(&headers, &body)?;
    let visitor_id = payload
        .visitor_id
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ApiError::Request(RequestError::MissingVisitorId))?;

    let notifications = state.inbox.pull_unread(visitor_id).await.map_err(|e| {
        error!(error = %e, visitor_id = visitor_id, "Notification pull failed");
        ApiError::internal(e, state.environment)
    })?;
    Ok(Json(NotificationsResponse { notifications }))
}
