//! Question answering handler

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use fundscope_common::{
    engine::{ConversationTurn, NarrativeSource, PipelineStage},
    errors::{AppError, Result},
    models::{AnalysisResult, CoarseIntent, DataQuery},
};

/// Question request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    #[validate(length(min = 1, max = 2000))]
    pub question: String,

    /// Prior turns, used only as narrative context
    #[serde(default)]
    pub history: Vec<ConversationTurn>,

    /// Caller's session id; generated when absent
    pub session_id: Option<String>,
}

/// Question response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AskResponse {
    pub session_id: String,
    pub answer: String,
    pub narrative_source: NarrativeSource,
    pub intent: CoarseIntent,
    pub query: DataQuery,
    pub result: AnalysisResult,
    pub stages: Vec<PipelineStage>,
    pub processing_time_ms: u64,
}

/// Answer a fundraising question
pub async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>> {
    let start = Instant::now();

    request.validate().map_err(|e| AppError::Validation {
        message: format!("Invalid question: {}", e),
        field: Some("question".to_string()),
    })?;
    if request.question.trim().is_empty() {
        return Err(AppError::Validation {
            message: "Question must not be blank".to_string(),
            field: Some("question".to_string()),
        });
    }

    let session_id = request
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    tracing::info!(
        session_id = %session_id,
        question_len = request.question.len(),
        history_turns = request.history.len(),
        "Question received"
    );

    let outcome = state
        .orchestrator
        .ask(&request.question, &request.history, &session_id)
        .await?;

    Ok(Json(AskResponse {
        session_id,
        answer: outcome.answer,
        narrative_source: outcome.narrative_source,
        intent: outcome.intent,
        query: outcome.query,
        result: outcome.result,
        stages: outcome.stages,
        processing_time_ms: start.elapsed().as_millis() as u64,
    }))
}
