use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use assetfolio_data_sources::{DataSourceError, FailureKind};

#[allow(dead_code)]
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    RateLimited(String),
    #[error("{0}")]
    Internal(String),
    // Surface the underlying error message to help debugging during development
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    code: u16,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Rate limits get the upstream's distinguishable code, matching
        // what API clients already branch on.
        if let ApiError::RateLimited(message) = &self {
            let body = Json(json!({ "error": message, "code": "RATE_LIMIT" }));
            return (StatusCode::TOO_MANY_REQUESTS, body).into_response();
        }

        let (status, msg) = match &self {
            ApiError::BadRequest(reason) => (StatusCode::BAD_REQUEST, reason.clone()),
            ApiError::Unauthorized(reason) => (StatusCode::UNAUTHORIZED, reason.clone()),
            ApiError::NotFound(reason) => (StatusCode::NOT_FOUND, reason.clone()),
            ApiError::RateLimited(_) => unreachable!("handled above"),
            ApiError::Internal(reason) => (StatusCode::INTERNAL_SERVER_ERROR, reason.clone()),
            ApiError::Anyhow(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };
        let body = Json(ErrorBody {
            code: status.as_u16(),
            message: msg,
        });
        (status, body).into_response()
    }
}

impl From<DataSourceError> for ApiError {
    fn from(err: DataSourceError) -> Self {
        let message = err.to_string();
        match err.kind() {
            FailureKind::Classification => ApiError::BadRequest(message),
            FailureKind::NotFound => ApiError::NotFound(message),
            FailureKind::RateLimit => ApiError::RateLimited(message),
            FailureKind::Config
            | FailureKind::Transport
            | FailureKind::Upstream
            | FailureKind::Parse => ApiError::Internal(message),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
