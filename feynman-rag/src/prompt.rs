//! Prompt composition
//!
//! Renders retrieved passages and the user question into a role-tagged
//! conversation. Document blocks keep retrieval rank order: the position of a
//! block is what tells the model which passage is most authoritative, and it
//! lets answers refer back to "document 2".

use crate::types::{ChatMessage, RetrievedDocument};
use tracing::debug;

/// Fixed instruction for the grounded QA conversation
///
/// Deliberately not user-configurable: the answer-only-from-context contract
/// is part of the pipeline's semantics, not a presentation choice.
const SYSTEM_INSTRUCTION: &str = "<role>You are a knowledge-base QA assistant.</role>\n\
<instruction>Answer the user's <question> using only the information in the provided <context>. \
If the context does not contain the answer, say so explicitly instead of making one up. \
Keep the answer clear and concise.</instruction>";

/// Composes prompts from a question and retrieved context passages
#[derive(Debug, Clone)]
pub struct PromptComposer {
    /// Maximum total characters of document content admitted into the prompt
    max_context_chars: usize,
}

impl PromptComposer {
    pub fn new(max_context_chars: usize) -> Self {
        Self { max_context_chars }
    }

    /// Render a question and its context into a message sequence
    ///
    /// Documents are admitted best-rank-first until the character budget
    /// would be exceeded; lower-ranked documents are dropped whole so every
    /// admitted block stays intact.
    pub fn compose(&self, question: &str, docs: &[RetrievedDocument]) -> Vec<ChatMessage> {
        let admitted = self.admit_documents(docs);
        let context = format_documents(admitted);

        let user = format!(
            "<context>\n{}\n</context>\n\n<question>\n{}\n</question>",
            context, question
        );

        vec![ChatMessage::system(SYSTEM_INSTRUCTION), ChatMessage::user(user)]
    }

    /// Select the rank-order prefix of documents that fits the budget
    fn admit_documents<'a>(&self, docs: &'a [RetrievedDocument]) -> &'a [RetrievedDocument] {
        let mut total = 0usize;
        let mut admitted = 0usize;

        for doc in docs {
            if total + doc.content.len() > self.max_context_chars {
                break;
            }
            total += doc.content.len();
            admitted += 1;
        }

        if admitted < docs.len() {
            debug!(
                admitted,
                dropped = docs.len() - admitted,
                budget = self.max_context_chars,
                "Dropped lowest-ranked documents to fit context budget"
            );
        }

        &docs[..admitted]
    }
}

/// Format documents as labeled blocks, 1-indexed in rank order
pub fn format_documents(docs: &[RetrievedDocument]) -> String {
    docs.iter()
        .enumerate()
        .map(|(i, doc)| format!("--- Document {} ---\n{}", i + 1, doc.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatRole;

    fn doc(rank: usize, content: &str) -> RetrievedDocument {
        RetrievedDocument {
            content: content.to_string(),
            rank,
            score: Some(1.0 - rank as f32 * 0.1),
        }
    }

    #[test]
    fn test_format_documents_labels_are_one_indexed() {
        let docs = vec![doc(0, "Doc A text"), doc(1, "Doc B text")];
        let formatted = format_documents(&docs);

        assert_eq!(
            formatted,
            "--- Document 1 ---\nDoc A text\n\n--- Document 2 ---\nDoc B text"
        );
    }

    #[test]
    fn test_compose_contains_question_and_docs_in_rank_order() {
        let composer = PromptComposer::new(12000);
        let docs = vec![doc(0, "Doc A text"), doc(1, "Doc B text")];
        let messages = composer.compose("What is a closure?", &docs);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::System);
        assert_eq!(messages[1].role, ChatRole::User);

        let user = &messages[1].content;
        assert!(user.contains("What is a closure?"));

        let a = user.find("--- Document 1 ---\nDoc A text").unwrap();
        let b = user.find("--- Document 2 ---\nDoc B text").unwrap();
        assert!(a < b);

        // Each document appears exactly once
        assert_eq!(user.matches("Doc A text").count(), 1);
        assert_eq!(user.matches("Doc B text").count(), 1);
    }

    #[test]
    fn test_compose_wraps_context_and_question_tags() {
        let composer = PromptComposer::new(12000);
        let messages = composer.compose("Why?", &[doc(0, "Because.")]);
        let user = &messages[1].content;

        assert!(user.contains("<context>"));
        assert!(user.contains("</context>"));
        assert!(user.contains("<question>\nWhy?\n</question>"));
        assert!(messages[0].content.contains("<instruction>"));
    }

    #[test]
    fn test_compose_with_no_documents() {
        let composer = PromptComposer::new(12000);
        let messages = composer.compose("Anything?", &[]);

        let user = &messages[1].content;
        assert!(user.contains("<context>\n\n</context>"));
        assert!(user.contains("Anything?"));
    }

    #[test]
    fn test_budget_drops_lowest_ranked_whole_documents() {
        let composer = PromptComposer::new(20);
        let docs = vec![
            doc(0, "short"),                                   // 5 chars, admitted
            doc(1, "also short"),                              // 10 chars, admitted (15 total)
            doc(2, "this one is far too long to fit at all"),  // dropped
            doc(3, "tiny"),                                    // dropped: admission is a rank prefix
        ];
        let messages = composer.compose("q", &docs);
        let user = &messages[1].content;

        assert!(user.contains("--- Document 1 ---\nshort"));
        assert!(user.contains("--- Document 2 ---\nalso short"));
        assert!(!user.contains("far too long"));
        assert!(!user.contains("tiny"));
    }

    #[test]
    fn test_labels_stay_contiguous_after_truncation() {
        let composer = PromptComposer::new(10);
        let docs = vec![doc(0, "aaaa"), doc(1, "bbbb"), doc(2, "cccc")];
        let messages = composer.compose("q", &docs);
        let user = &messages[1].content;

        assert!(user.contains("--- Document 1 ---"));
        assert!(user.contains("--- Document 2 ---"));
        assert!(!user.contains("--- Document 3 ---"));
    }
}
