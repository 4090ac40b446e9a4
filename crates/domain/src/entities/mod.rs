//! Dialogue data model entities.

mod choice;
mod dialogue;
mod prompt;

pub use choice::InputChoice;
pub use dialogue::Dialogue;
pub use prompt::{DialoguePrompt, END_OF_DIALOGUE};

/// Blank display text carries no meaning anywhere in the model; collapse it
/// to `None` so every consumer has a single "no message" representation.
pub(crate) fn normalize_text(text: Option<String>) -> Option<String> {
    text.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_normalizes_to_none() {
        assert_eq!(normalize_text(None), None);
        assert_eq!(normalize_text(Some(String::new())), None);
        assert_eq!(normalize_text(Some("   \t".to_string())), None);
        assert_eq!(
            normalize_text(Some("hello".to_string())),
            Some("hello".to_string())
        );
    }
}
