//! Explanation evaluation
//!
//! Scores a learner's transcribed explanation against the reference material
//! it tries to teach. The model is asked for a strict JSON verdict; anything
//! that is not valid JSON or does not match the expected shape is rejected
//! rather than repaired.

use crate::llm_client::ChatModelClient;
use crate::types::{EvaluationResult, RagError, RagResult};
use feynman_core::{log_operation_error, log_operation_start, log_operation_success};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Evaluates learner explanations with the chat model
pub struct EvaluationPipeline {
    llm_client: Arc<ChatModelClient>,
}

impl EvaluationPipeline {
    pub fn new(llm_client: Arc<ChatModelClient>) -> Self {
        Self { llm_client }
    }

    /// Evaluate a transcribed explanation against the reference content
    pub async fn evaluate(
        &self,
        reference: &str,
        candidate: &str,
    ) -> RagResult<EvaluationResult> {
        if reference.trim().is_empty() || candidate.trim().is_empty() {
            return Err(RagError::Validation(
                "Original content and transcribed text are required.".to_string(),
            ));
        }

        log_operation_start!("evaluate_explanation");
        let start = Instant::now();

        let prompt = build_rubric_prompt(reference, candidate);

        // The rubric rides in the system slot; the explanation under
        // evaluation is the user turn.
        let raw = match self.llm_client.quick_chat(candidate, Some(&prompt)).await {
            Ok(raw) => raw,
            Err(e) => {
                log_operation_error!("evaluate_explanation", e);
                return Err(e);
            }
        };

        debug!("Raw evaluation output: {} chars", raw.len());

        let value: Value = serde_json::from_str(raw.trim()).map_err(|e| {
            RagError::InvalidModelOutput(format!("Model did not return valid JSON: {}", e))
        })?;

        let result = validate_evaluation(&value)?;

        log_operation_success!(
            "evaluate_explanation",
            score = result.score,
            duration_ms = start.elapsed().as_millis() as u64
        );

        Ok(result)
    }
}

/// Build the rubric prompt embedding both texts
fn build_rubric_prompt(reference: &str, candidate: &str) -> String {
    format!(
        "A learner studied the original content below and then explained it in their own words. \
         Evaluate how well the transcribed explanation teaches the original content.\n\n\
         Original content:\n```\n{reference}\n```\n\n\
         Transcribed explanation:\n```\n{candidate}\n```\n\n\
         Respond with a single JSON object, no surrounding text, with exactly these fields:\n\
         - \"polishedText\": string, the explanation rewritten clearly and correctly\n\
         - \"evaluation\": string, an overall judgement of the explanation\n\
         - \"strengths\": array of strings, what the explanation does well\n\
         - \"weaknesses\": array of strings, what it misses or gets wrong\n\
         - \"score\": integer from 0 to 100, overall teaching quality"
    )
}

/// Check the parsed verdict against the expected shape
///
/// Rejects missing fields, wrong types, non-string array elements, and scores
/// outside 0..=100. The raw value is not coerced or clamped.
fn validate_evaluation(value: &Value) -> RagResult<EvaluationResult> {
    let obj = value.as_object().ok_or_else(|| {
        RagError::SchemaValidation("Evaluation output is not a JSON object".to_string())
    })?;

    let string_field = |name: &str| -> RagResult<String> {
        obj.get(name)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                RagError::SchemaValidation(format!("Field '{}' is missing or not a string", name))
            })
    };

    let string_array_field = |name: &str| -> RagResult<Vec<String>> {
        let items = obj.get(name).and_then(|v| v.as_array()).ok_or_else(|| {
            RagError::SchemaValidation(format!("Field '{}' is missing or not an array", name))
        })?;

        items
            .iter()
            .map(|item| {
                item.as_str().map(|s| s.to_string()).ok_or_else(|| {
                    RagError::SchemaValidation(format!(
                        "Field '{}' contains a non-string element",
                        name
                    ))
                })
            })
            .collect()
    };

    let score = obj
        .get("score")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| {
            RagError::SchemaValidation(
                "Field 'score' is missing or not a non-negative integer".to_string(),
            )
        })?;

    if score > 100 {
        return Err(RagError::SchemaValidation(format!(
            "Score {} is outside the 0-100 range",
            score
        )));
    }

    Ok(EvaluationResult {
        polished_text: string_field("polishedText")?,
        evaluation: string_field("evaluation")?,
        strengths: string_array_field("strengths")?,
        weaknesses: string_array_field("weaknesses")?,
        score: score as u8,
    })
}
