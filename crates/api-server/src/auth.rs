//! Bearer-token gate for dashboard endpoints.
//!
//! Tokens come from `admin.api_tokens`. With no tokens configured every
//! admin call is rejected.

use crate::error::ApiError;
use crate::rest::AppState;
use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Axum middleware: 401 without a bearer token, 403 for a token that is not
/// configured.
pub async fn require_admin(State(state): State<AppState>, req: Request, next: Next) -> Response {
    match bearer_token(&req) {
        None => ApiError::Unauthorized.into_response(),
        Some(token) if state.admin_tokens.contains(token) => next.run(req).await,
        Some(_) => {
            warn!(path = %req.uri().path(), "Rejected admin token");
            ApiError::Forbidden.into_response()
        }
    }
}
