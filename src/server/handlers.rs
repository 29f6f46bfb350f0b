//! Route handlers

use std::collections::HashMap;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;

use super::error::ApiError;
use super::AppState;
use crate::core::{Caller, OrchestratorError};
use crate::llm::HistoryMessage;
use crate::orchestrator::{TurnOutcome, TurnRequest};

/// Body of `POST /conversation`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub conversation_history: Vec<HistoryMessage>,
    #[serde(default)]
    pub agent_mode: bool,
    #[serde(default)]
    pub approvals: HashMap<String, bool>,
}

impl From<ConversationRequest> for TurnRequest {
    fn from(body: ConversationRequest) -> Self {
        TurnRequest {
            message: body.message,
            session_id: body.session_id,
            history: body.conversation_history,
            agent_mode: body.agent_mode,
            approvals: body.approvals,
        }
    }
}

pub async fn conversation_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    body: Result<Json<ConversationRequest>, JsonRejection>,
) -> Result<Json<TurnOutcome>, ApiError> {
    let Json(body) = body.map_err(|rejection| {
        OrchestratorError::validation(format!("malformed request body: {}", rejection.body_text()))
    })?;

    let outcome = state
        .orchestrator
        .handle_message(&caller, body.into())
        .await?;
    Ok(Json(outcome))
}

pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}
