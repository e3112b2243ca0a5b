use clawstack_core::AppError;
use dialoguer::{Confirm, Input};

/// Source of operator answers. The installer has no flags; every choice
/// comes through here.
pub trait Prompter: Send + Sync {
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool, AppError>;

    /// Free text. An empty answer comes back as the empty string.
    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String, AppError>;
}

/// Prompts on the controlling terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TermPrompter;

impl Prompter for TermPrompter {
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool, AppError> {
        Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()
            .map_err(|e| AppError::Prompt(e.to_string()))
    }

    fn input(&self, prompt: &str, default: Option<&str>) -> Result<String, AppError> {
        let mut input = Input::<String>::new().with_prompt(prompt).allow_empty(true);
        if let Some(default) = default {
            input = input.default(default.to_string()).show_default(true);
        }
        input
            .interact_text()
            .map_err(|e| AppError::Prompt(e.to_string()))
    }
}
