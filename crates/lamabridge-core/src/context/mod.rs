//! Prompt construction: turning history into something that fits.
//!
//! - `PromptBuilder`: sender-name convention, mention resolution, chat templates
//! - `ContextAssembler`: budget-aware selection and trimming of history

pub mod assembler;
pub mod prompt;

pub use assembler::{AssembledPrompt, Assembly, ContextAssembler};
pub use prompt::PromptBuilder;
