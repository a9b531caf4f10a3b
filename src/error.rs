use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Ways a `/scan` request can fail. Geolocation problems never show up here.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Invalid target")]
    InvalidTarget,

    #[error("{0}")]
    Execution(String),

    #[error("scan timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

impl ScanError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ScanError::InvalidTarget => StatusCode::BAD_REQUEST,
            ScanError::Execution(_) | ScanError::Timeout(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ScanError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            ScanError::InvalidTarget => json!({ "error": "Invalid target" }),
            other => json!({ "error": "Scan failed", "details": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(ScanError::InvalidTarget.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ScanError::Execution("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ScanError::Timeout(Duration::from_secs(3)).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn timeout_message_names_duration() {
        let msg = ScanError::Timeout(Duration::from_secs(42)).to_string();
        assert_eq!(msg, "scan timed out after 42s");
    }
}
