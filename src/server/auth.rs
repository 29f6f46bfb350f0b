//! Identity middleware
//!
//! An upstream gateway authenticates the user and forwards the identity in
//! headers. Requests without both headers are rejected before any handler
//! runs.

use axum::extract::Request;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use super::error::ApiError;
use crate::core::{Caller, OrchestratorError};

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const ORGANIZATION_ID_HEADER: &str = "X-Organization-Id";

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Attach the `Caller` to the request, or reject with 401
pub async fn identity_layer(mut req: Request, next: Next) -> Result<Response, ApiError> {
    let headers = req.headers();
    let Some(user_id) = header_value(headers, USER_ID_HEADER) else {
        tracing::warn!("[Auth] Missing {} header on {}", USER_ID_HEADER, req.uri());
        return Err(OrchestratorError::Authentication(format!("missing {} header", USER_ID_HEADER)).into());
    };
    let Some(organization_id) = header_value(headers, ORGANIZATION_ID_HEADER) else {
        tracing::warn!("[Auth] Missing {} header on {}", ORGANIZATION_ID_HEADER, req.uri());
        return Err(OrchestratorError::Authentication(format!(
            "missing {} header",
            ORGANIZATION_ID_HEADER
        ))
        .into());
    };

    tracing::debug!("[Auth] Request from {} in {}", user_id, organization_id);
    req.extensions_mut().insert(Caller::new(user_id, organization_id));
    Ok(next.run(req).await)
}
