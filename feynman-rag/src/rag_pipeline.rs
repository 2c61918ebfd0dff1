//! RAG pipeline - retrieval-augmented question answering
//!
//! Orchestrates the full answer workflow: retrieve relevant passages, compose
//! a grounded prompt, and generate an answer with the chat model. Stages run
//! strictly in sequence within one call.

use crate::llm_client::ChatModelClient;
use crate::prompt::PromptComposer;
use crate::retriever::Retriever;
use crate::types::{ChatOptions, EmptyRetrievalPolicy, RagConfig, RagError, RagResult};
use feynman_core::logging::performance;
use feynman_core::{log_operation_start, log_operation_success};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Answer returned when retrieval finds nothing and the policy is to
/// acknowledge rather than fail
const NO_CONTEXT_ANSWER: &str =
    "I couldn't find any relevant information in the knowledge base to answer your question.";

/// Complete RAG pipeline
///
/// All collaborators are injected at construction; the pipeline holds no
/// mutable state and can be shared across concurrent requests.
pub struct RagPipeline {
    retriever: Arc<dyn Retriever>,
    llm_client: Arc<ChatModelClient>,
    composer: PromptComposer,
    on_empty: EmptyRetrievalPolicy,
}

impl RagPipeline {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        llm_client: Arc<ChatModelClient>,
        config: &RagConfig,
    ) -> Self {
        Self {
            retriever,
            llm_client,
            composer: PromptComposer::new(config.retrieval.max_context_chars),
            on_empty: config.retrieval.on_empty,
        }
    }

    /// Answer a question grounded in retrieved context
    pub async fn answer(&self, question: &str) -> RagResult<String> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::Validation("question must not be empty".to_string()));
        }

        log_operation_start!("rag_answer");
        let start = Instant::now();

        // Step 1: Retrieve relevant documents
        let docs =
            performance::measure_async("retrieval", self.retriever.query(question)).await?;
        debug!("Retrieved {} documents", docs.len());

        if docs.is_empty() {
            warn!("No relevant documents found for question");
            match self.on_empty {
                EmptyRetrievalPolicy::Acknowledge => {
                    return Ok(NO_CONTEXT_ANSWER.to_string());
                }
                EmptyRetrievalPolicy::Fail => {
                    return Err(RagError::Retrieval(
                        "no relevant documents found".to_string(),
                    ));
                }
            }
        }

        // Step 2: Compose the grounded prompt
        let messages = self.composer.compose(question, &docs);

        // Step 3: Generate the answer
        let answer = performance::measure_async(
            "generation",
            self.llm_client.chat(&messages, &ChatOptions::default()),
        )
        .await
        .into_result()?;

        info!("Generated answer ({} chars)", answer.len());

        log_operation_success!(
            "rag_answer",
            documents = docs.len(),
            total_time_ms = start.elapsed().as_millis() as u64
        );

        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatFailureKind, LlmConfig, RetrievalConfig, RetrievedDocument};
    use async_trait::async_trait;

    /// Test double returning a fixed document set
    struct StaticRetriever {
        docs: Vec<RetrievedDocument>,
    }

    #[async_trait]
    impl Retriever for StaticRetriever {
        async fn query(&self, _question: &str) -> RagResult<Vec<RetrievedDocument>> {
            Ok(self.docs.clone())
        }
    }

    /// Test double that always fails
    struct FailingRetriever;

    #[async_trait]
    impl Retriever for FailingRetriever {
        async fn query(&self, _question: &str) -> RagResult<Vec<RetrievedDocument>> {
            Err(RagError::Retrieval("store down".to_string()))
        }
    }

    fn offline_client() -> Arc<ChatModelClient> {
        // Unroutable endpoint: construction succeeds, calls fail fast.
        Arc::new(
            ChatModelClient::new(LlmConfig {
                base_url: "http://127.0.0.1:9".to_string(),
                api_key: Some("test-key".to_string()),
                timeout_secs: 5,
                ..LlmConfig::default()
            })
            .unwrap(),
        )
    }

    fn pipeline_with(
        retriever: Arc<dyn Retriever>,
        on_empty: EmptyRetrievalPolicy,
    ) -> RagPipeline {
        let config = RagConfig {
            llm: LlmConfig::default(),
            retrieval: RetrievalConfig {
                on_empty,
                ..RetrievalConfig::default()
            },
        };
        RagPipeline::new(retriever, offline_client(), &config)
    }

    #[tokio::test]
    async fn test_empty_question_rejected_before_retrieval() {
        // FailingRetriever would error if it were reached
        let pipeline = pipeline_with(Arc::new(FailingRetriever), EmptyRetrievalPolicy::Fail);

        for question in ["", "   ", "\n\t"] {
            match pipeline.answer(question).await {
                Err(RagError::Validation(message)) => assert!(message.contains("empty")),
                other => panic!("Expected Validation error, got {:?}", other.err()),
            }
        }
    }

    #[tokio::test]
    async fn test_retrieval_failure_propagates() {
        let pipeline = pipeline_with(Arc::new(FailingRetriever), EmptyRetrievalPolicy::Fail);

        match pipeline.answer("What is a closure?").await {
            Err(RagError::Retrieval(message)) => assert_eq!(message, "store down"),
            other => panic!("Expected Retrieval error, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_empty_retrieval_acknowledge_skips_model_call() {
        let retriever = Arc::new(StaticRetriever { docs: vec![] });
        let pipeline = pipeline_with(retriever, EmptyRetrievalPolicy::Acknowledge);

        // The model endpoint is unreachable, so reaching this answer proves
        // no model call was made.
        let answer = pipeline.answer("What is a closure?").await.unwrap();
        assert_eq!(answer, NO_CONTEXT_ANSWER);
    }

    #[tokio::test]
    async fn test_empty_retrieval_fail_policy() {
        let retriever = Arc::new(StaticRetriever { docs: vec![] });
        let pipeline = pipeline_with(retriever, EmptyRetrievalPolicy::Fail);

        assert!(matches!(
            pipeline.answer("What is a closure?").await,
            Err(RagError::Retrieval(_))
        ));
    }

    #[tokio::test]
    async fn test_model_failure_surfaces_as_chat_api_error() {
        let retriever = Arc::new(StaticRetriever {
            docs: vec![RetrievedDocument {
                content: "Doc A text".to_string(),
                rank: 0,
                score: Some(0.9),
            }],
        });
        let pipeline = pipeline_with(retriever, EmptyRetrievalPolicy::Fail);

        match pipeline.answer("What is a closure?").await {
            Err(RagError::ChatApi { kind, .. }) => assert_eq!(kind, ChatFailureKind::Network),
            other => panic!("Expected ChatApi error, got {:?}", other.err()),
        }
    }
}
