//! Route definitions for the Feynman web server

use crate::{handlers, AppState};
use axum::{
    routing::{get, post},
    Router,
};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // AI endpoints
        .route("/ai/rag-qa", post(handlers::rag_qa))
        .route("/ai/evaluate", post(handlers::evaluate))
}
