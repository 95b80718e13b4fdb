//! Token budget for fitting a prompt into a model's context window.

/// The part of a context window a prompt may use.
///
/// The reply margin is reserved for the model's answer; the prompt budget
/// is whatever remains, saturating at zero for tiny windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBudget {
    pub context_limit: u32,
    pub reply_margin: u32,
    pub prompt_budget: u32,
}

impl TokenBudget {
    pub fn new(context_limit: u32, reply_margin: u32) -> Self {
        Self {
            context_limit,
            reply_margin,
            prompt_budget: context_limit.saturating_sub(reply_margin),
        }
    }

    /// Whether a prompt of `tokens` tokens fits.
    pub fn fits(&self, tokens: usize) -> bool {
        tokens <= self.prompt_budget as usize
    }
}
