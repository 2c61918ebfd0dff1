//! Document retrieval
//!
//! The vector store is an externally-owned collaborator: this module only
//! queries it and passes its ranking through unchanged. No reranking happens
//! here.

use crate::types::{RagError, RagResult, RetrievalConfig, RetrievedDocument};
use async_trait::async_trait;
use feynman_core::config_error;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Seam between the pipeline and the external vector store
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Find passages relevant to a question, ranked best-first
    async fn query(&self, question: &str) -> RagResult<Vec<RetrievedDocument>>;
}

/// Retriever backed by an HTTP vector store query endpoint
pub struct HttpVectorStore {
    http: reqwest::Client,
    config: RetrievalConfig,
}

impl HttpVectorStore {
    pub fn new(config: RetrievalConfig) -> RagResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                RagError::from(config_error!(
                    format!("Failed to build HTTP client: {}", e),
                    "retriever"
                ))
            })?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }
}

#[async_trait]
impl Retriever for HttpVectorStore {
    async fn query(&self, question: &str) -> RagResult<Vec<RetrievedDocument>> {
        let start = Instant::now();

        debug!("Querying vector store for: {}", question);

        let response = self
            .http
            .post(&self.config.endpoint)
            .json(&json!({
                "query": question,
                "top_k": self.config.top_k,
            }))
            .send()
            .await
            .map_err(|e| RagError::Retrieval(format!("Vector store unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RagError::Retrieval(format!(
                "Vector store returned HTTP {}",
                status.as_u16()
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| RagError::Retrieval(format!("Vector store response is not JSON: {}", e)))?;

        let docs = parse_documents(&payload)?;

        info!(
            "Retrieved {} documents in {:?}",
            docs.len(),
            start.elapsed()
        );

        Ok(docs)
    }
}

/// Parse the store's payload into ranked documents
///
/// Accepts either a bare JSON array or an object with a `documents` array;
/// each element is `{ content, score? }`. Rank is assigned by position.
fn parse_documents(payload: &Value) -> RagResult<Vec<RetrievedDocument>> {
    let items = payload
        .as_array()
        .or_else(|| payload.get("documents").and_then(|d| d.as_array()))
        .ok_or_else(|| {
            RagError::Retrieval("Vector store response has no document array".to_string())
        })?;

    items
        .iter()
        .enumerate()
        .map(|(rank, item)| {
            let content = item
                .get("content")
                .and_then(|c| c.as_str())
                .ok_or_else(|| {
                    RagError::Retrieval(format!("Document {} is missing content", rank))
                })?;

            let score = item.get("score").and_then(|s| s.as_f64()).map(|s| s as f32);

            Ok(RetrievedDocument {
                content: content.to_string(),
                rank,
                score,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_documents_bare_array() {
        let payload = json!([
            { "content": "Doc A text", "score": 0.92 },
            { "content": "Doc B text" },
        ]);
        let docs = parse_documents(&payload).unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].content, "Doc A text");
        assert_eq!(docs[0].rank, 0);
        assert_eq!(docs[0].score, Some(0.92));
        assert_eq!(docs[1].rank, 1);
        assert_eq!(docs[1].score, None);
    }

    #[test]
    fn test_parse_documents_wrapped_array() {
        let payload = json!({ "documents": [{ "content": "only" }] });
        let docs = parse_documents(&payload).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "only");
    }

    #[test]
    fn test_parse_documents_empty_is_ok() {
        let docs = parse_documents(&json!([])).unwrap();
        assert!(docs.is_empty());
    }

    #[test]
    fn test_parse_documents_malformed_payload() {
        assert!(matches!(
            parse_documents(&json!({"rows": []})),
            Err(RagError::Retrieval(_))
        ));
        assert!(matches!(
            parse_documents(&json!([{ "score": 0.5 }])),
            Err(RagError::Retrieval(_))
        ));
    }

    #[tokio::test]
    async fn test_query_unreachable_store_is_retrieval_error() {
        let store = HttpVectorStore::new(RetrievalConfig {
            endpoint: "http://127.0.0.1:9/query".to_string(),
            ..RetrievalConfig::default()
        })
        .unwrap();

        match store.query("anything").await {
            Err(RagError::Retrieval(message)) => assert!(message.contains("unreachable")),
            other => panic!("Expected Retrieval error, got {:?}", other.err()),
        }
    }
}
