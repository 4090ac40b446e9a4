//! Engine-side storage wrappers.

mod dialogues;

pub use dialogues::{DialogueStore, StoreError};
