//! HTTP error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::core::OrchestratorError;

/// Wraps an `OrchestratorError` as a `{"error": ...}` response
#[derive(Debug)]
pub struct ApiError(pub OrchestratorError);

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("[Server] Internal error: {}", self.0);
            "Internal server error".to_string()
        } else {
            tracing::info!("[Server] Request rejected ({}): {}", status, self.0);
            self.0.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let response = ApiError(OrchestratorError::validation("empty")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ApiError(OrchestratorError::InsufficientCredits {
            organization_id: "org_1".into(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

        let response = ApiError(OrchestratorError::Persistence("disk".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
