//! Application state for the web server

use crate::{WebConfig, WebError, WebResult};
use feynman_rag::{
    ChatModelClient, EvaluationPipeline, HttpVectorStore, RagConfig, RagPipeline, Retriever,
};
use std::sync::Arc;

/// Shared application state
///
/// One chat client is shared by both pipelines so connection pooling and
/// configuration stay in one place.
#[derive(Clone)]
pub struct AppState {
    pub config: WebConfig,
    pub rag_pipeline: Arc<RagPipeline>,
    pub evaluation_pipeline: Arc<EvaluationPipeline>,
}

impl AppState {
    /// Create application state with the standard HTTP vector store
    pub fn new(config: WebConfig, rag_config: RagConfig) -> WebResult<Self> {
        let retriever = HttpVectorStore::new(rag_config.retrieval.clone())
            .map_err(|e| WebError::Config(e.to_string()))?;

        Self::with_retriever(config, rag_config, Arc::new(retriever))
    }

    /// Create application state with an injected retriever
    pub fn with_retriever(
        config: WebConfig,
        rag_config: RagConfig,
        retriever: Arc<dyn Retriever>,
    ) -> WebResult<Self> {
        let llm_client = Arc::new(
            ChatModelClient::new(rag_config.llm.clone())
                .map_err(|e| WebError::Config(e.to_string()))?,
        );

        let rag_pipeline = Arc::new(RagPipeline::new(
            retriever,
            llm_client.clone(),
            &rag_config,
        ));
        let evaluation_pipeline = Arc::new(EvaluationPipeline::new(llm_client));

        Ok(Self {
            config,
            rag_pipeline,
            evaluation_pipeline,
        })
    }
}
