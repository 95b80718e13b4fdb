//! Token counting with exact and heuristic strategies.

use lamabridge_types::llm::PromptMessage;
use tracing::warn;

use crate::model::ResolvedModel;

/// Tokens added per message for role markers and separators.
pub const PER_MESSAGE_OVERHEAD: usize = 4;

/// Characters per token assumed by the heuristic. Deliberately lower than
/// the ~4 chars/token of typical English so the estimate errs high.
const HEURISTIC_CHARS_PER_TOKEN: usize = 3;

/// Counts tokens for a resolved model.
///
/// Uses the model's tokenizer when one is loaded. When there is none, or
/// when it fails on some input, falls back to a length heuristic for that
/// call; counting never fails.
pub struct TokenCounter;

impl TokenCounter {
    /// Count the tokens of a single text (e.g. a rendered prompt).
    pub fn count_text(model: &ResolvedModel, text: &str) -> usize {
        match model.tokenizer() {
            Some(tokenizer) => match tokenizer.count(text) {
                Ok(count) => count,
                Err(e) => {
                    warn!(
                        model = %model.full_name,
                        error = %e,
                        "Tokenizer failed, using heuristic count"
                    );
                    Self::estimate(text)
                }
            },
            None => Self::estimate(text),
        }
    }

    /// Count the tokens of a role-tagged message list, including the
    /// per-message overhead.
    pub fn count_messages(model: &ResolvedModel, messages: &[PromptMessage]) -> usize {
        messages
            .iter()
            .map(|m| Self::count_text(model, &m.content) + PER_MESSAGE_OVERHEAD)
            .sum()
    }

    /// The heuristic estimate: `ceil(chars / 3)`.
    ///
    /// Monotonic in text length.
    pub fn estimate(text: &str) -> usize {
        text.chars().count().div_ceil(HEURISTIC_CHARS_PER_TOKEN)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lamabridge_types::error::TokenizerError;
    use lamabridge_types::model::ModelConfig;

    use super::*;
    use crate::tokens::{ChatTemplate, Tokenizer};

    struct WordTokenizer;

    impl Tokenizer for WordTokenizer {
        fn count(&self, text: &str) -> Result<usize, TokenizerError> {
            Ok(text.split_whitespace().count())
        }

        fn chat_template(&self) -> Option<&ChatTemplate> {
            None
        }
    }

    struct BrokenTokenizer;

    impl Tokenizer for BrokenTokenizer {
        fn count(&self, _text: &str) -> Result<usize, TokenizerError> {
            Err(TokenizerError::Encode("unknown byte sequence".to_string()))
        }

        fn chat_template(&self) -> Option<&ChatTemplate> {
            None
        }
    }

    fn model(tokenizer: Option<Arc<dyn Tokenizer>>) -> ResolvedModel {
        ResolvedModel::new("test:1b", ModelConfig::default(), tokenizer, 2048)
    }

    #[test]
    fn test_estimate_rounds_up() {
        assert_eq!(TokenCounter::estimate(""), 0);
        assert_eq!(TokenCounter::estimate("a"), 1);
        assert_eq!(TokenCounter::estimate("abc"), 1);
        assert_eq!(TokenCounter::estimate("abcd"), 2);
    }

    #[test]
    fn test_estimate_counts_chars_not_bytes() {
        assert_eq!(TokenCounter::estimate("ééé"), 1);
    }

    #[test]
    fn test_estimate_is_monotonic() {
        let mut last = 0;
        let mut text = String::new();
        for _ in 0..50 {
            text.push('x');
            let count = TokenCounter::estimate(&text);
            assert!(count >= last);
            last = count;
        }
    }

    #[test]
    fn test_exact_count_uses_tokenizer() {
        let model = model(Some(Arc::new(WordTokenizer)));
        assert_eq!(TokenCounter::count_text(&model, "one two three"), 3);
    }

    #[test]
    fn test_tokenizer_failure_falls_back_to_heuristic() {
        let model = model(Some(Arc::new(BrokenTokenizer)));
        assert_eq!(TokenCounter::count_text(&model, "abcdef"), 2);
    }

    #[test]
    fn test_count_messages_adds_overhead() {
        let model = model(None);
        let messages = vec![
            PromptMessage::system("abc"),
            PromptMessage::system("abcdef"),
        ];
        assert_eq!(TokenCounter::count_messages(&model, &messages), 1 + 4 + 2 + 4);
    }
}
