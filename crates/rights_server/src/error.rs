//! Maps `RightsError` onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rights_core::error::RightsError;
use serde::Serialize;

/// Handler error wrapper so `?` works on `RightsError` inside axum handlers.
#[derive(Debug)]
pub struct AppError(pub RightsError);

impl From<RightsError> for AppError {
    fn from(e: RightsError) -> Self {
        Self(e)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        Self(RightsError::Internal(e.into()))
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = ErrorBody {
            code: self.0.code(),
            message: self.0.public_message(),
        };
        (status, Json(body)).into_response()
    }
}
