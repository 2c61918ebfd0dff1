//! Feynman RAG - retrieval-augmented answering and evaluation
//!
//! Provides the question-answering pipeline (retrieve, compose, generate),
//! a uniform chat client for OpenAI-compatible model endpoints, and the
//! explanation evaluation pipeline used by the learning workflow.

pub mod evaluation;
pub mod llm_client;
pub mod prompt;
pub mod rag_pipeline;
pub mod retriever;
pub mod types;

pub use evaluation::EvaluationPipeline;
pub use llm_client::{ChatModelClient, DEFAULT_SYSTEM_PROMPT};
pub use prompt::{format_documents, PromptComposer};
pub use rag_pipeline::RagPipeline;
pub use retriever::{HttpVectorStore, Retriever};

pub use types::{
    BatchItem, BatchResult, ChatFailureKind, ChatMessage, ChatOptions, ChatOutcome, ChatRole,
    EmptyRetrievalPolicy, EvaluationResult, LlmConfig, RagConfig, RagError, RagResult,
    RetrievalConfig, RetrievedDocument, StreamChunk, TokenUsage,
};
