//! Centralized default constants for the studia system.
//!
//! **This module is the single source of truth** for all shared default values.
//! All crates should reference these constants instead of defining their own
//! magic numbers.
//!
//! Organized by domain area. When adding new constants, place them in the
//! appropriate section and document the rationale for the chosen value.

// =============================================================================
// CHUNKING
// =============================================================================

/// Maximum characters per chunk for text splitting.
pub const CHUNK_SIZE: usize = 1000;

/// Minimum characters per chunk (smaller chunks may be merged).
pub const CHUNK_MIN_SIZE: usize = 100;

/// Overlap characters between adjacent chunks for context preservation.
pub const CHUNK_OVERLAP: usize = 100;

// =============================================================================
// EMBEDDING
// =============================================================================

/// Default embedding model name (Ollama).
pub const EMBED_MODEL: &str = "nomic-embed-text";

/// Default embedding vector dimension for nomic-embed-text.
pub const EMBED_DIMENSION: usize = 768;

/// Timeout for embedding requests (seconds).
pub const EMBED_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// GENERATION
// =============================================================================

/// Default generation model name (Ollama).
pub const GEN_MODEL: &str = "llama3.1:8b";

/// Timeout for generation requests (seconds).
pub const GEN_TIMEOUT_SECS: u64 = 120;

/// Default inference endpoint.
pub const INFERENCE_URL: &str = "http://127.0.0.1:11434";

// =============================================================================
// RETRIEVAL
// =============================================================================

/// Default number of chunks retrieved per question.
pub const RETRIEVE_TOP_K: usize = 4;

/// Character budget for the assembled answer context.
///
/// The original QA model truncated context at 2000 characters; kept as the
/// default ceiling so prompts stay within small-model context windows.
pub const CONTEXT_CHAR_BUDGET: usize = 2000;

/// Answers below this confidence carry a low-confidence warning.
pub const LOW_CONFIDENCE_THRESHOLD: f32 = 0.3;

// =============================================================================
// SUMMARIZATION
// =============================================================================

/// Maximum number of chunks fed to the summarizer per request.
pub const SUMMARY_MAX_CHUNKS: usize = 3;

/// Minimum words a chunk must have to be worth summarizing.
pub const SUMMARY_MIN_CHUNK_WORDS: usize = 50;

// =============================================================================
// QUIZ
// =============================================================================

/// Default number of questions per generated quiz.
pub const QUIZ_NUM_QUESTIONS: usize = 5;

/// Maximum number of questions per generated quiz.
pub const QUIZ_MAX_QUESTIONS: usize = 10;

// =============================================================================
// INGESTION
// =============================================================================

/// Length of the stored document content preview in characters.
pub const CONTENT_PREVIEW_LENGTH: usize = 500;

/// Timeout for external extraction commands (pdftotext, pandoc) in seconds.
pub const EXTRACTION_CMD_TIMEOUT_SECS: u64 = 60;

/// Maximum accepted upload size in bytes (25 MB).
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size for list endpoints.
pub const PAGE_LIMIT: i64 = 50;

/// Default page offset.
pub const PAGE_OFFSET: i64 = 0;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 3000;

/// Default CORS max-age in seconds (1 hour).
pub const CORS_MAX_AGE_SECS: u64 = 3600;

// =============================================================================
// PROGRESS
// =============================================================================

/// Default number of days shown on the progress dashboard.
pub const PROGRESS_WINDOW_DAYS: i64 = 7;

/// Default daily goal (questions answered) for new preferences rows.
pub const DAILY_GOAL_QUESTIONS: i32 = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_constants_are_consistent() {
        assert!(CHUNK_MIN_SIZE < CHUNK_SIZE);
        assert!(CHUNK_OVERLAP < CHUNK_SIZE);
    }

    #[test]
    fn test_context_budget_fits_small_models() {
        assert!(CONTEXT_CHAR_BUDGET <= 4000);
    }

    #[test]
    fn test_quiz_defaults_within_bounds() {
        assert!(QUIZ_NUM_QUESTIONS <= QUIZ_MAX_QUESTIONS);
    }
}
