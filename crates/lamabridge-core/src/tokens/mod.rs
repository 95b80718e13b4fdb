//! Token counting for context fitting.
//!
//! - `Tokenizer`: object-safe port for exact tokenizers (HuggingFace in infra)
//! - `ChatTemplate`: a model's Jinja chat template plus its special tokens
//! - `TokenCounter`: exact counting with a heuristic fallback

pub mod counter;

use lamabridge_types::error::TokenizerError;

pub use counter::TokenCounter;

/// An exact tokenizer for one model family.
///
/// Object-safe so loaded tokenizers can be shared as `Arc<dyn Tokenizer>`
/// across requests.
pub trait Tokenizer: Send + Sync {
    /// Number of tokens `text` encodes to. Special-token markup already
    /// present in `text` (from a rendered chat template) is counted as the
    /// special tokens it stands for.
    fn count(&self, text: &str) -> Result<usize, TokenizerError>;

    /// The chat template shipped with the tokenizer, if any.
    fn chat_template(&self) -> Option<&ChatTemplate>;
}

/// A HuggingFace-style chat template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTemplate {
    pub source: String,
    pub bos_token: Option<String>,
    pub eos_token: Option<String>,
}
