//! Small text helpers shared by ingestion and the API layer.

use studia_core::defaults::CONTENT_PREVIEW_LENGTH;

/// Whitespace-delimited word count of a text.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// First characters of the extracted text, for document listings.
///
/// Truncates at a char boundary and appends an ellipsis when cut.
pub fn content_preview(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= CONTENT_PREVIEW_LENGTH {
        return trimmed.to_string();
    }
    let preview: String = trimmed.chars().take(CONTENT_PREVIEW_LENGTH).collect();
    format!("{}...", preview)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_count_basic() {
        assert_eq!(word_count("the quick brown fox"), 4);
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("  spaced   out  "), 2);
    }

    #[test]
    fn test_preview_short_text_unchanged() {
        assert_eq!(content_preview("short text"), "short text");
    }

    #[test]
    fn test_preview_trims_whitespace() {
        assert_eq!(content_preview("  padded  "), "padded");
    }

    #[test]
    fn test_preview_truncates_long_text() {
        let long = "word ".repeat(500);
        let preview = content_preview(&long);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), CONTENT_PREVIEW_LENGTH + 3);
    }

    #[test]
    fn test_preview_multibyte_safe() {
        let long = "ü".repeat(CONTENT_PREVIEW_LENGTH + 50);
        let preview = content_preview(&long);
        assert!(preview.ends_with("..."));
    }
}
