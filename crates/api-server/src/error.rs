//! HTTP error mapping.

use crate::rest::ErrorResponse;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use campaign_core::config::Environment;
use campaign_engine::RequestError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Content-Type must be application/json")]
    InvalidContentType,

    #[error("malformed JSON body: {0}")]
    InvalidJson(String),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("Authorization header with Bearer token required")]
    Unauthorized,

    #[error("Token is not allowed to access this resource")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(String),

    /// `detail` is only populated outside production.
    #[error("Internal server error")]
    Internal { detail: Option<String> },
}

impl ApiError {
    pub fn internal(err: impl std::fmt::Display, environment: Environment) -> Self {
        ApiError::Internal {
            detail: (!environment.is_production()).then(|| err.to_string()),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidContentType | ApiError::InvalidJson(_) | ApiError::Request(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidContentType => "invalid_content_type",
            ApiError::InvalidJson(_) => "invalid_json",
            ApiError::Request(e) => e.code(),
            ApiError::Unauthorized => "unauthorized",
            ApiError::Forbidden => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Internal { .. } => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            ApiError::Internal { detail: Some(detail) } => detail.clone(),
            other => other.to_string(),
        };
        let body = ErrorResponse {
            error: self.code().to_string(),
            message,
        };
        (self.status(), Json(body)).into_response()
    }
}
