//! Message formatting boundary.
//!
//! The session broadcasts whatever the formatter returns; richer hosts
//! (colors, placeholder substitution) plug in their own implementation.

use dialogues_domain::{Dialogue, DialoguePrompt, InputChoice};

/// Turns dialogue content into the lines a session broadcasts.
pub trait SessionFormatter: Send + Sync {
    /// Line sent when a prompt's message is delivered. `None` suppresses it.
    fn prompt_message(&self, dialogue: &Dialogue, prompt: &DialoguePrompt) -> Option<String>;

    /// Line broadcast when a choice is taken. `None` suppresses it.
    fn chat_message(&self, dialogue: &Dialogue, choice: &InputChoice) -> Option<String>;

    /// Selectable option line for one choice. `None` hides the option.
    fn display_line(&self, dialogue: &Dialogue, choice: &InputChoice) -> Option<String>;
}

/// Default formatter: applies the dialogue's first-character prefix
/// substitution to messages and numbers the choice lines.
pub struct PrefixFormatter;

impl PrefixFormatter {
    fn apply_prefix(dialogue: &Dialogue, message: &str) -> String {
        let mut chars = message.chars();
        if let Some(first) = chars.next() {
            if let Some(prefix) = dialogue.message_prefix(first) {
                return format!("{prefix}{}", chars.as_str());
            }
        }
        message.to_string()
    }
}

impl SessionFormatter for PrefixFormatter {
    fn prompt_message(&self, dialogue: &Dialogue, prompt: &DialoguePrompt) -> Option<String> {
        prompt
            .message()
            .map(|message| Self::apply_prefix(dialogue, message))
    }

    fn chat_message(&self, dialogue: &Dialogue, choice: &InputChoice) -> Option<String> {
        choice
            .chat_message()
            .map(|message| Self::apply_prefix(dialogue, message))
    }

    fn display_line(&self, _dialogue: &Dialogue, choice: &InputChoice) -> Option<String> {
        choice
            .display_message()
            .map(|message| format!(" {}. {message}", choice.choice_id()))
    }
}
