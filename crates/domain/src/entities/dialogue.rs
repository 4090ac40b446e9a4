//! Dialogue entity
//!
//! A named, immutable tree of prompts with a designated entry prompt.
//! Prompt IDs may reference each other freely (cycles are legal), but the
//! structure itself is frozen once constructed: the codec or importer builds
//! the full prompt map first, then `Dialogue::new` validates the entry point.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

use super::DialoguePrompt;

/// An immutable named tree of prompts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dialogue {
    name: String,
    first_prompt_id: i32,
    prompts: BTreeMap<i32, DialoguePrompt>,
    prefixes: BTreeMap<char, String>,
}

impl Dialogue {
    /// Builds a dialogue. Fails if the prompt map does not contain the entry
    /// prompt; a dialogue that cannot start is a defect in whatever produced
    /// it, not recoverable input.
    pub fn new(
        name: impl Into<String>,
        first_prompt_id: i32,
        prompts: BTreeMap<i32, DialoguePrompt>,
        prefixes: BTreeMap<char, String>,
    ) -> Result<Self, DomainError> {
        if !prompts.contains_key(&first_prompt_id) {
            return Err(DomainError::validation(format!(
                "first prompt {first_prompt_id} does not exist in prompts"
            )));
        }
        Ok(Self {
            name: name.into(),
            first_prompt_id,
            prompts,
            prefixes,
        })
    }

    /// Unique dialogue name; doubles as its storage location.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn first_prompt_id(&self) -> i32 {
        self.first_prompt_id
    }

    /// Entry prompt. Guaranteed to exist by construction.
    pub fn first_prompt(&self) -> &DialoguePrompt {
        // Invariant: validated in `new`.
        self.prompts
            .get(&self.first_prompt_id)
            .unwrap_or_else(|| unreachable!("first prompt validated at construction"))
    }

    /// Looks up a prompt by ID. A missing ID is the normal "end of dialogue"
    /// condition for session advancement, not an error.
    pub fn prompt(&self, prompt_id: i32) -> Option<&DialoguePrompt> {
        self.prompts.get(&prompt_id)
    }

    pub fn prompts(&self) -> &BTreeMap<i32, DialoguePrompt> {
        &self.prompts
    }

    /// Message-prefix substitutions, keyed by the first character of a
    /// message.
    pub fn message_prefixes(&self) -> &BTreeMap<char, String> {
        &self.prefixes
    }

    pub fn message_prefix(&self, key: char) -> Option<&str> {
        self.prefixes.get(&key).map(String::as_str)
    }
}
