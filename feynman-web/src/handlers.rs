//! HTTP request handlers for the Feynman web server

use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    Json as JsonExtractor,
};
use feynman_rag::{EvaluationResult, RagError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    timestamp: chrono::DateTime<chrono::Utc>,
    version: String,
}

/// RAG question answering request
#[derive(Deserialize)]
pub struct RagQaRequest {
    pub question: Option<String>,
}

/// RAG question answering response
#[derive(Serialize)]
pub struct RagQaResponse {
    pub answer: String,
}

/// Explanation evaluation request
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest {
    pub original_content: Option<String>,
    pub transcribed_text: Option<String>,
}

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Answer a question with retrieval-augmented generation
pub async fn rag_qa(
    State(state): State<AppState>,
    JsonExtractor(request): JsonExtractor<RagQaRequest>,
) -> Result<Json<RagQaResponse>, (StatusCode, Json<Value>)> {
    // Rejected before any retrieval or model call
    let question = match request.question.as_deref().map(str::trim) {
        Some(question) if !question.is_empty() => question.to_string(),
        _ => {
            return Err(error_body(
                StatusCode::BAD_REQUEST,
                "question is required in request body",
            ))
        }
    };

    match state.rag_pipeline.answer(&question).await {
        Ok(answer) => Ok(Json(RagQaResponse { answer })),
        Err(e) => {
            tracing::error!("RAG answer failed: {}", e);
            Err(map_pipeline_error(e))
        }
    }
}

/// Evaluate a learner's transcribed explanation against original content
pub async fn evaluate(
    State(state): State<AppState>,
    JsonExtractor(request): JsonExtractor<EvaluateRequest>,
) -> Result<Json<EvaluationResult>, (StatusCode, Json<Value>)> {
    let blank = |field: &Option<String>| {
        field
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .is_none()
    };

    if blank(&request.original_content) || blank(&request.transcribed_text) {
        return Err(error_body(
            StatusCode::BAD_REQUEST,
            "Original content and transcribed text are required.",
        ));
    }

    let original = request.original_content.as_deref().unwrap_or_default();
    let transcribed = request.transcribed_text.as_deref().unwrap_or_default();

    match state
        .evaluation_pipeline
        .evaluate(original, transcribed)
        .await
    {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            tracing::error!("Evaluation failed: {}", e);
            Err(map_pipeline_error(e))
        }
    }
}

fn error_body(status: StatusCode, msg: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "code": status.as_u16(), "msg": msg })))
}

fn map_pipeline_error(e: RagError) -> (StatusCode, Json<Value>) {
    let status = match e {
        RagError::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_body(status, &e.to_string())
}
