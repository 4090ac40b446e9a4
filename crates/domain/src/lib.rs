//! Dialogues domain library.
//!
//! Immutable data model for scripted branching conversations: a [`Dialogue`]
//! is a named tree of [`DialoguePrompt`]s, each prompt optionally branching
//! through ordered [`InputChoice`]s. Everything here is constructed once
//! (by the binary codec or an importer) and never mutated afterwards; the
//! runtime state lives in the engine crate.

pub mod entities;
pub mod error;
pub mod ids;

pub use entities::{Dialogue, DialoguePrompt, InputChoice, END_OF_DIALOGUE};
pub use error::DomainError;
pub use ids::ParticipantId;
