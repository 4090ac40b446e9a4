//! Input choice entity
//!
//! A selectable branch out of a prompt. Choices are identified by their
//! 1-based position within the owning prompt; that position is the value a
//! participant submits to select the choice.

use serde::{Deserialize, Serialize};

use super::normalize_text;

/// One selectable branch of a dialogue prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputChoice {
    choice_id: i32,
    next_prompt_id: i32,
    display_message: Option<String>,
    chat_message: Option<String>,
}

impl InputChoice {
    pub fn new(
        choice_id: i32,
        next_prompt_id: i32,
        display_message: Option<String>,
        chat_message: Option<String>,
    ) -> Self {
        Self {
            choice_id,
            next_prompt_id,
            display_message: normalize_text(display_message),
            chat_message: normalize_text(chat_message),
        }
    }

    /// 1-based position of this choice within its prompt.
    pub fn choice_id(&self) -> i32 {
        self.choice_id
    }

    /// Prompt to advance to when this choice is taken.
    pub fn next_prompt_id(&self) -> i32 {
        self.next_prompt_id
    }

    /// Text shown to participants as the selectable option.
    pub fn display_message(&self) -> Option<&str> {
        self.display_message.as_deref()
    }

    /// Text broadcast to all participants when the choice is taken.
    pub fn chat_message(&self) -> Option<&str> {
        self.chat_message.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_messages_become_none() {
        let choice = InputChoice::new(1, 4, Some("  ".to_string()), Some(String::new()));
        assert_eq!(choice.display_message(), None);
        assert_eq!(choice.chat_message(), None);
    }

    #[test]
    fn accessors_return_given_values() {
        let choice = InputChoice::new(
            2,
            7,
            Some("Ask about the ruins".to_string()),
            Some("You ask about the ruins.".to_string()),
        );
        assert_eq!(choice.choice_id(), 2);
        assert_eq!(choice.next_prompt_id(), 7);
        assert_eq!(choice.display_message(), Some("Ask about the ruins"));
        assert_eq!(choice.chat_message(), Some("You ask about the ruins."));
    }
}
