//! Dialogue prompt entity
//!
//! One node of a dialogue tree: an optional message, delays measured in host
//! ticks, and either a single successor (`next_prompt_id`) or an ordered set
//! of input choices. Negative delay/timeout inputs are clamped to zero at
//! construction so the stored value is never out of range; `next_prompt_id`
//! keeps `-1` as the "end of dialogue" sentinel.

use serde::{Deserialize, Serialize};

use super::{normalize_text, InputChoice};

/// Sentinel successor ID meaning "no next prompt, the dialogue ends here".
pub const END_OF_DIALOGUE: i32 = -1;

/// One node of a dialogue tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialoguePrompt {
    prompt_id: i32,
    message: Option<String>,
    next_prompt_id: i32,
    initial_delay: u32,
    final_delay: u32,
    choice_timeout: u32,
    choices: Vec<InputChoice>,
}

impl DialoguePrompt {
    /// Builds a prompt, clamping out-of-range numeric inputs rather than
    /// rejecting them (matches the persisted format, which stores raw i32s).
    pub fn new(
        prompt_id: i32,
        message: Option<String>,
        next_prompt_id: i32,
        initial_delay: i32,
        final_delay: i32,
        choice_timeout: i32,
        choices: Vec<InputChoice>,
    ) -> Self {
        Self {
            prompt_id,
            message: normalize_text(message),
            next_prompt_id: next_prompt_id.max(END_OF_DIALOGUE),
            initial_delay: initial_delay.max(0) as u32,
            final_delay: final_delay.max(0) as u32,
            choice_timeout: choice_timeout.max(0) as u32,
            choices,
        }
    }

    pub fn prompt_id(&self) -> i32 {
        self.prompt_id
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn has_message(&self) -> bool {
        self.message.is_some()
    }

    /// Successor prompt ID used when this prompt has no choices, or when a
    /// choice timeout elapses. `END_OF_DIALOGUE` if the dialogue ends here.
    pub fn next_prompt_id(&self) -> i32 {
        self.next_prompt_id
    }

    /// Ticks to wait before sending the message.
    pub fn initial_delay(&self) -> u32 {
        self.initial_delay
    }

    pub fn has_initial_delay(&self) -> bool {
        self.initial_delay > 0
    }

    /// Ticks to wait after sending the message before advancing.
    pub fn final_delay(&self) -> u32 {
        self.final_delay
    }

    pub fn has_final_delay(&self) -> bool {
        self.final_delay > 0
    }

    /// Ticks participants have to answer; zero means wait forever.
    pub fn choice_timeout(&self) -> u32 {
        self.choice_timeout
    }

    pub fn has_choice_timeout(&self) -> bool {
        self.choice_timeout > 0
    }

    pub fn requires_choices(&self) -> bool {
        !self.choices.is_empty()
    }

    /// Choices in broadcast order.
    pub fn input_choices(&self) -> &[InputChoice] {
        &self.choices
    }

    /// Looks up a choice by its 1-based ID as submitted by a participant.
    /// Out-of-range IDs (including zero and negatives) resolve to `None`.
    pub fn input_choice(&self, choice_id: i32) -> Option<&InputChoice> {
        if choice_id <= 0 {
            return None;
        }
        self.choices.get(choice_id as usize - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt_with_choices(count: i32) -> DialoguePrompt {
        let choices = (1..=count)
            .map(|i| InputChoice::new(i, i + 10, Some(format!("option {i}")), None))
            .collect();
        DialoguePrompt::new(0, Some("pick one".to_string()), END_OF_DIALOGUE, 0, 0, 0, choices)
    }

    #[test]
    fn negative_numbers_are_clamped() {
        let prompt = DialoguePrompt::new(1, None, -7, -5, -3, -1, Vec::new());
        assert_eq!(prompt.next_prompt_id(), END_OF_DIALOGUE);
        assert_eq!(prompt.initial_delay(), 0);
        assert_eq!(prompt.final_delay(), 0);
        assert_eq!(prompt.choice_timeout(), 0);
        assert!(!prompt.has_initial_delay());
        assert!(!prompt.has_final_delay());
        assert!(!prompt.has_choice_timeout());
    }

    #[test]
    fn blank_message_is_normalized() {
        let prompt = DialoguePrompt::new(1, Some("  ".to_string()), 2, 0, 0, 0, Vec::new());
        assert!(!prompt.has_message());
        assert_eq!(prompt.message(), None);
    }

    #[test]
    fn input_choice_is_one_indexed() {
        let prompt = prompt_with_choices(3);
        for k in 1..=3 {
            let choice = prompt.input_choice(k).expect("choice in range");
            assert_eq!(choice.choice_id(), k);
        }
    }

    #[test]
    fn input_choice_rejects_out_of_range() {
        let prompt = prompt_with_choices(3);
        assert!(prompt.input_choice(0).is_none());
        assert!(prompt.input_choice(-1).is_none());
        assert!(prompt.input_choice(4).is_none());
    }

    #[test]
    fn prompt_without_choices_does_not_require_input() {
        let prompt = DialoguePrompt::new(1, Some("hi".to_string()), 2, 0, 0, 0, Vec::new());
        assert!(!prompt.requires_choices());
        assert!(prompt.input_choice(1).is_none());
    }
}
