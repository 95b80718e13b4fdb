//! Context assembly: fit system prompt, history and the new message into
//! a model's token budget.
//!
//! The candidate prompt is `[system] + history + [new message]`. When it does
//! not fit, history is dropped oldest-first until it does. The system prompt
//! and the new message are never evicted; when they alone exceed the budget
//! the request fails with `ContextOverflow` and nothing is generated.
//!
//! Two output shapes exist. If the model's tokenizer carries a chat template,
//! the prompt is rendered to a single string and counted exactly. Otherwise
//! the message list is kept as-is and counted per message.

use lamabridge_types::error::ChatError;
use lamabridge_types::llm::{GenerationInput, PromptMessage};
use tracing::{debug, warn};

use crate::context::prompt::PromptBuilder;
use crate::llm::token_budget::TokenBudget;
use crate::model::ResolvedModel;
use crate::tokens::{ChatTemplate, TokenCounter};

/// The prompt in the shape the backend will receive it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssembledPrompt {
    /// Fully rendered with the model's chat template.
    Rendered(String),
    /// Role-tagged list; the server applies its own template.
    Messages(Vec<PromptMessage>),
}

impl AssembledPrompt {
    pub fn into_input(self) -> GenerationInput {
        match self {
            AssembledPrompt::Rendered(prompt) => GenerationInput::Prompt { prompt },
            AssembledPrompt::Messages(messages) => GenerationInput::Messages { messages },
        }
    }
}

/// Result of a successful assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembly {
    pub prompt: AssembledPrompt,
    pub token_count: usize,
    /// History messages included (a contiguous, most recent suffix).
    pub kept: usize,
    /// History messages dropped from the front.
    pub dropped: usize,
}

/// Fits conversations into a model's context window.
#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler {
    reply_margin: u32,
}

impl ContextAssembler {
    pub fn new(reply_margin: u32) -> Self {
        Self { reply_margin }
    }

    /// Assemble the prompt for a new user message.
    ///
    /// `history` is chronological (oldest first). The result depends only on
    /// its inputs: assembling twice yields the same value.
    pub fn assemble(
        &self,
        model: &ResolvedModel,
        system_prompt: &str,
        history: &[PromptMessage],
        new_message: &PromptMessage,
    ) -> Result<Assembly, ChatError> {
        let budget = TokenBudget::new(model.context_limit, self.reply_margin);

        if let Some(template) = model.chat_template() {
            match self.assemble_rendered(model, template, &budget, system_prompt, history, new_message) {
                Ok(result) => return result,
                Err(e) => {
                    warn!(
                        model = %model.full_name,
                        error = %e,
                        "Chat template failed to render, sending raw messages"
                    );
                }
            }
        }

        self.assemble_messages(model, &budget, system_prompt, history, new_message)
    }

    /// Template path. The outer `Err` is a template failure, the inner
    /// result is the assembly outcome.
    fn assemble_rendered(
        &self,
        model: &ResolvedModel,
        template: &ChatTemplate,
        budget: &TokenBudget,
        system_prompt: &str,
        history: &[PromptMessage],
        new_message: &PromptMessage,
    ) -> Result<Result<Assembly, ChatError>, minijinja::Error> {
        let mut start = 0;
        loop {
            let candidate = candidate(system_prompt, &history[start..], new_message);
            let rendered = PromptBuilder::render(&candidate, template)?;
            let count = TokenCounter::count_text(model, &rendered);

            if budget.fits(count) {
                return Ok(Ok(accepted(
                    model,
                    AssembledPrompt::Rendered(rendered),
                    count,
                    history.len(),
                    start,
                )));
            }
            if start == history.len() {
                return Ok(Err(overflow(model, count, budget)));
            }
            start += 1;
        }
    }

    fn assemble_messages(
        &self,
        model: &ResolvedModel,
        budget: &TokenBudget,
        system_prompt: &str,
        history: &[PromptMessage],
        new_message: &PromptMessage,
    ) -> Result<Assembly, ChatError> {
        let mut start = 0;
        loop {
            let candidate = candidate(system_prompt, &history[start..], new_message);
            let count = TokenCounter::count_messages(model, &candidate);

            if budget.fits(count) {
                return Ok(accepted(
                    model,
                    AssembledPrompt::Messages(candidate),
                    count,
                    history.len(),
                    start,
                ));
            }
            if start == history.len() {
                return Err(overflow(model, count, budget));
            }
            start += 1;
        }
    }
}

fn candidate(
    system_prompt: &str,
    history: &[PromptMessage],
    new_message: &PromptMessage,
) -> Vec<PromptMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(PromptMessage::system(system_prompt));
    messages.extend_from_slice(history);
    messages.push(new_message.clone());
    messages
}

fn accepted(
    model: &ResolvedModel,
    prompt: AssembledPrompt,
    token_count: usize,
    history_len: usize,
    dropped: usize,
) -> Assembly {
    if dropped > 0 {
        debug!(
            model = %model.full_name,
            dropped,
            kept = history_len - dropped,
            token_count,
            "History trimmed to fit context"
        );
    }
    Assembly {
        prompt,
        token_count,
        kept: history_len - dropped,
        dropped,
    }
}

fn overflow(model: &ResolvedModel, required: usize, budget: &TokenBudget) -> ChatError {
    warn!(
        model = %model.full_name,
        required,
        budget = budget.prompt_budget,
        "Prompt does not fit even without history"
    );
    ChatError::ContextOverflow {
        required,
        budget: budget.prompt_budget as usize,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lamabridge_types::error::TokenizerError;
    use lamabridge_types::model::ModelConfig;

    use super::*;
    use crate::tokens::Tokenizer;

    /// One token per whitespace-separated word.
    struct WordTokenizer {
        template: Option<ChatTemplate>,
    }

    impl Tokenizer for WordTokenizer {
        fn count(&self, text: &str) -> Result<usize, TokenizerError> {
            Ok(text.split_whitespace().count())
        }

        fn chat_template(&self) -> Option<&ChatTemplate> {
            self.template.as_ref()
        }
    }

    fn words_model(limit: u32, template: Option<&str>) -> ResolvedModel {
        let tokenizer = WordTokenizer {
            template: template.map(|source| ChatTemplate {
                source: source.to_string(),
                bos_token: None,
                eos_token: None,
            }),
        };
        ResolvedModel::new("words:1b", ModelConfig::default(), Some(Arc::new(tokenizer)), limit)
    }

    fn heuristic_model(limit: u32) -> ResolvedModel {
        ResolvedModel::new("plain:1b", ModelConfig::default(), None, limit)
    }

    fn history(n: usize) -> Vec<PromptMessage> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    PromptBuilder::user_message("Alice", &format!("message {i}"))
                } else {
                    PromptBuilder::assistant_message(&format!("reply {i}"))
                }
            })
            .collect()
    }

    fn contents(prompt: &AssembledPrompt) -> Vec<String> {
        match prompt {
            AssembledPrompt::Messages(messages) => messages.iter().map(|m| m.content.clone()).collect(),
            AssembledPrompt::Rendered(_) => panic!("expected message list"),
        }
    }

    #[test]
    fn test_fitting_history_is_untrimmed_and_ordered() {
        let model = words_model(10_000, None);
        let history = history(6);
        let new = PromptBuilder::user_message("Bob", "hi");

        let assembly = ContextAssembler::new(256)
            .assemble(&model, "Be nice.", &history, &new)
            .unwrap();

        assert_eq!(assembly.kept, 6);
        assert_eq!(assembly.dropped, 0);
        let got = contents(&assembly.prompt);
        assert_eq!(got.len(), 8);
        assert_eq!(got[0], "Be nice.");
        for (i, message) in history.iter().enumerate() {
            assert_eq!(got[i + 1], message.content);
        }
        assert_eq!(got[7], "@Bob:\nhi");
    }

    #[test]
    fn test_long_history_is_trimmed_to_a_suffix() {
        // 40 messages of ~3 words each plus 4 overhead: far more than 90.
        let model = words_model(100, None);
        let history = history(40);
        let new = PromptBuilder::user_message("Bob", "what now");

        let assembly = ContextAssembler::new(10)
            .assemble(&model, "sys", &history, &new)
            .unwrap();

        assert!(assembly.token_count <= 90);
        assert!(assembly.dropped > 0);
        assert_eq!(assembly.kept + assembly.dropped, 40);

        let got = contents(&assembly.prompt);
        assert_eq!(got.first().map(String::as_str), Some("sys"));
        assert_eq!(got.last().map(String::as_str), Some("@Bob:\nwhat now"));
        let kept: Vec<_> = history[assembly.dropped..].iter().map(|m| m.content.clone()).collect();
        assert_eq!(&got[1..got.len() - 1], kept.as_slice());
    }

    #[test]
    fn test_trim_keeps_maximal_suffix() {
        let model = words_model(100, None);
        let history = history(40);
        let new = PromptBuilder::user_message("Bob", "what now");
        let assembler = ContextAssembler::new(10);

        let assembly = assembler.assemble(&model, "sys", &history, &new).unwrap();

        // Keeping one more message would not have fit.
        let mut longer = vec![PromptMessage::system("sys")];
        longer.extend_from_slice(&history[assembly.dropped - 1..]);
        longer.push(new.clone());
        assert!(TokenCounter::count_messages(&model, &longer) > 90);
    }

    #[test]
    fn test_oversized_new_message_overflows() {
        let model = words_model(100, None);
        let huge = vec!["word"; 150].join(" ");
        let new = PromptBuilder::user_message("Bob", &huge);

        let err = ContextAssembler::new(0)
            .assemble(&model, "sys", &history(4), &new)
            .unwrap_err();

        match err {
            ChatError::ContextOverflow { required, budget } => {
                assert!(required > 100);
                assert_eq!(budget, 100);
            }
            other => panic!("expected ContextOverflow, got {other:?}"),
        }
    }

    #[test]
    fn test_assembly_is_idempotent() {
        let model = heuristic_model(120);
        let history = history(30);
        let new = PromptBuilder::user_message("Bob", "again");
        let assembler = ContextAssembler::new(20);

        let first = assembler.assemble(&model, "sys", &history, &new).unwrap();
        let second = assembler.assemble(&model, "sys", &history, &new).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_template_path_renders_single_prompt() {
        let source = "{% for m in messages %}[{{ m.role }}] {{ m.content }}\n{% endfor %}[assistant]";
        let model = words_model(10_000, Some(source));
        let new = PromptBuilder::user_message("Bob", "hi there");

        let assembly = ContextAssembler::new(0)
            .assemble(&model, "sys", &[], &new)
            .unwrap();

        match assembly.prompt {
            AssembledPrompt::Rendered(text) => {
                assert_eq!(text, "[system] sys\n[user] @Bob:\nhi there\n[assistant]");
                assert_eq!(assembly.token_count, 7);
            }
            other => panic!("expected rendered prompt, got {other:?}"),
        }
    }

    #[test]
    fn test_template_path_trims_history() {
        let source = "{% for m in messages %}{{ m.content }} {% endfor %}";
        let model = words_model(20, Some(source));
        let history = history(10);
        let new = PromptBuilder::user_message("Bob", "hi");

        let assembly = ContextAssembler::new(0)
            .assemble(&model, "sys", &history, &new)
            .unwrap();

        assert!(assembly.token_count <= 20);
        assert!(assembly.dropped > 0);
        assert!(matches!(assembly.prompt, AssembledPrompt::Rendered(_)));
    }

    #[test]
    fn test_broken_template_falls_back_to_messages() {
        let model = words_model(10_000, Some("{{ raise_exception('no system role') }}"));
        let new = PromptBuilder::user_message("Bob", "hi");

        let assembly = ContextAssembler::new(0)
            .assemble(&model, "sys", &history(2), &new)
            .unwrap();

        assert!(matches!(assembly.prompt, AssembledPrompt::Messages(_)));
        assert_eq!(assembly.kept, 2);
    }

    #[test]
    fn test_heuristic_path_without_tokenizer() {
        let model = heuristic_model(2048);
        let new = PromptBuilder::user_message("Bob", "hello");

        let assembly = ContextAssembler::new(256)
            .assemble(&model, "abc", &[], &new)
            .unwrap();

        // "abc" -> 1 + 4, "@Bob:\nhello" (11 chars) -> 4 + 4
        assert_eq!(assembly.token_count, 13);
    }
}
