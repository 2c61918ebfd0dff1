//! Type definitions for the RAG system
//!
//! This module defines the core types used throughout the answer and
//! evaluation pipelines.

use serde::{Deserialize, Serialize};

/// Configuration for the RAG system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// LLM provider configuration
    pub llm: LlmConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the OpenAI-compatible chat completion endpoint
    pub base_url: String,
    /// API key (optional, can be set via environment)
    pub api_key: Option<String>,
    /// Environment variable to read the API key from
    pub api_key_env: String,
    /// Default model name
    pub model: String,
    /// Default temperature for generation, in [0, 2]
    pub temperature: f32,
    /// Default maximum tokens to generate
    pub max_tokens: u32,
    /// Timeout for a single provider round trip, in seconds
    pub timeout_secs: u64,
    /// Concurrency cap for batch dispatch
    pub batch_concurrency: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.deepseek.com".to_string(),
            api_key: None,
            api_key_env: "DEEPSEEK_API_KEY".to_string(),
            model: "deepseek-chat".to_string(),
            temperature: 0.7,
            max_tokens: 2000,
            timeout_secs: 60,
            batch_concurrency: 4,
        }
    }
}

/// Policy for a query whose retrieval returns zero documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyRetrievalPolicy {
    /// Answer with a fixed acknowledgement instead of calling the model
    Acknowledge,
    /// Fail the whole request
    Fail,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Query endpoint of the external vector store
    pub endpoint: String,
    /// Number of top documents to request
    pub top_k: usize,
    /// Maximum total context length admitted into the prompt, in characters
    pub max_context_chars: usize,
    /// What to do when retrieval returns no documents
    pub on_empty: EmptyRetrievalPolicy,
    /// Timeout for a vector store query, in seconds
    pub timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:7700/query".to_string(),
            top_k: 8,
            max_context_chars: 12000,
            on_empty: EmptyRetrievalPolicy::Acknowledge,
            timeout_secs: 30,
        }
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

impl RagConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> RagResult<Self> {
        let content =
            std::fs::read_to_string(path).map_err(feynman_core::FeynmanError::from)?;

        let config: RagConfig = toml::from_str(&content)
            .map_err(|e| RagError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(base_url) = std::env::var("FEYNMAN_LLM_BASE_URL") {
            config.llm.base_url = base_url;
        }
        if let Ok(model) = std::env::var("FEYNMAN_LLM_MODEL") {
            config.llm.model = model;
        }
        if let Ok(temperature) = std::env::var("FEYNMAN_LLM_TEMPERATURE") {
            if let Ok(value) = temperature.parse() {
                config.llm.temperature = value;
            }
        }
        if let Ok(max_tokens) = std::env::var("FEYNMAN_LLM_MAX_TOKENS") {
            if let Ok(value) = max_tokens.parse() {
                config.llm.max_tokens = value;
            }
        }
        if let Ok(endpoint) = std::env::var("FEYNMAN_VECTOR_STORE_URL") {
            config.retrieval.endpoint = endpoint;
        }

        config
    }

    /// Validate configuration invariants
    pub fn validate(&self) -> RagResult<()> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(RagError::Config(format!(
                "temperature must be in [0, 2], got {}",
                self.llm.temperature
            )));
        }
        if self.llm.max_tokens == 0 {
            return Err(RagError::Config(
                "max_tokens must be greater than 0".to_string(),
            ));
        }
        if self.llm.batch_concurrency == 0 {
            return Err(RagError::Config(
                "batch_concurrency must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A single message in a chat conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Per-call overrides for a chat invocation
///
/// Unset fields fall back to the client's configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Token usage counters reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// Classified failure kinds for provider calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatFailureKind {
    Network,
    Auth,
    RateLimit,
    InvalidResponse,
    Stream,
    Unknown,
}

impl std::fmt::Display for ChatFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ChatFailureKind::Network => "network",
            ChatFailureKind::Auth => "auth",
            ChatFailureKind::RateLimit => "rate_limit",
            ChatFailureKind::InvalidResponse => "invalid_response",
            ChatFailureKind::Stream => "stream",
            ChatFailureKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Outcome of a single chat invocation
///
/// Provider-side problems are captured here rather than raised, so call sites
/// can branch without error-handling boilerplate.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatOutcome {
    Success {
        content: String,
        usage: TokenUsage,
    },
    Failure {
        kind: ChatFailureKind,
        message: String,
    },
}

impl ChatOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ChatOutcome::Success { .. })
    }

    /// Convert into a `RagResult`, mapping failures to `RagError::ChatApi`
    pub fn into_result(self) -> RagResult<String> {
        match self {
            ChatOutcome::Success { content, .. } => Ok(content),
            ChatOutcome::Failure { kind, message } => Err(RagError::ChatApi { kind, message }),
        }
    }
}

/// One item of a concurrent batch invocation
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub messages: Vec<ChatMessage>,
    pub options: ChatOptions,
}

/// Result of one batch item, paired with its input by position
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    pub input: BatchItem,
    pub output: ChatOutcome,
}

/// An incremental fragment of a streaming response
#[derive(Debug)]
pub struct StreamChunk<'a> {
    /// Text delivered by this chunk alone
    pub delta: &'a str,
    /// All text accumulated so far, including this chunk
    pub cumulative: &'a str,
    /// The raw provider chunk payload
    pub raw: &'a serde_json::Value,
}

/// A document returned by the vector store, in retrieval rank order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    /// Text content of the passage
    pub content: String,
    /// Position in retrieval order, 0 = most relevant
    pub rank: usize,
    /// Similarity score from the underlying search, if reported
    pub score: Option<f32>,
}

/// Structured result of a recap evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    /// The recap rewritten into polished, written-register prose
    pub polished_text: String,
    /// Qualitative evaluation against the reference text
    pub evaluation: String,
    /// Strengths, in the order the model listed them
    pub strengths: Vec<String>,
    /// Weaknesses, in the order the model listed them
    pub weaknesses: Vec<String>,
    /// Integer score in [0, 100]
    pub score: u8,
}

/// Error types for the RAG system
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Chat API error ({kind}): {message}")]
    ChatApi {
        kind: ChatFailureKind,
        message: String,
    },

    #[error("Invalid model output: {0}")]
    InvalidModelOutput(String),

    #[error("Schema validation failed: {0}")]
    SchemaValidation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Core error: {0}")]
    Core(Box<feynman_core::FeynmanError>),
}

impl From<feynman_core::FeynmanError> for RagError {
    fn from(err: feynman_core::FeynmanError) -> Self {
        RagError::Core(Box::new(err))
    }
}

pub type RagResult<T> = Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_serialization() {
        let message = ChatMessage::system("You are a helpful assistant.");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "You are a helpful assistant.");

        let message = ChatMessage::user("Hello");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["role"], "user");

        let message = ChatMessage::assistant("Hi there");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["role"], "assistant");
    }

    #[test]
    fn test_default_config() {
        let config = RagConfig::default();
        assert_eq!(config.llm.temperature, 0.7);
        assert_eq!(config.llm.max_tokens, 2000);
        assert_eq!(config.retrieval.top_k, 8);
        assert_eq!(config.retrieval.on_empty, EmptyRetrievalPolicy::Acknowledge);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_rejects_bad_temperature() {
        let mut config = RagConfig::default();
        config.llm.temperature = 2.5;
        assert!(matches!(config.validate(), Err(RagError::Config(_))));

        config.llm.temperature = -0.1;
        assert!(matches!(config.validate(), Err(RagError::Config(_))));
    }

    #[test]
    fn test_config_validation_rejects_zero_limits() {
        let mut config = RagConfig::default();
        config.llm.max_tokens = 0;
        assert!(config.validate().is_err());

        let mut config = RagConfig::default();
        config.llm.batch_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_missing_file_is_core_error() {
        let err = RagConfig::from_file("/nonexistent/feynman.toml").unwrap_err();
        match err {
            RagError::Core(core) => {
                assert!(matches!(*core, feynman_core::FeynmanError::Io(_)));
            }
            other => panic!("Expected Core error, got {}", other),
        }
    }

    #[test]
    fn test_chat_outcome_into_result() {
        let success = ChatOutcome::Success {
            content: "answer".to_string(),
            usage: TokenUsage::default(),
        };
        assert_eq!(success.into_result().unwrap(), "answer");

        let failure = ChatOutcome::Failure {
            kind: ChatFailureKind::RateLimit,
            message: "slow down".to_string(),
        };
        match failure.into_result() {
            Err(RagError::ChatApi { kind, message }) => {
                assert_eq!(kind, ChatFailureKind::RateLimit);
                assert_eq!(message, "slow down");
            }
            other => panic!("Expected ChatApi error, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_evaluation_result_serializes_camel_case() {
        let result = EvaluationResult {
            polished_text: "x".to_string(),
            evaluation: "y".to_string(),
            strengths: vec!["a".to_string()],
            weaknesses: vec!["b".to_string()],
            score: 85,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["polishedText"], "x");
        assert_eq!(json["score"], 85);
        assert!(json.get("polished_text").is_none());
    }
}
