//! Core data models for studia.
//!
//! These mirror the relational schema one-to-one: a row type per table,
//! plus the enums persisted as text columns.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Shared vector type (same representation as the pgvector column type).
pub use pgvector::Vector;

// =============================================================================
// ENUMS
// =============================================================================

/// Supported upload file types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Docx,
    Txt,
}

impl FileType {
    /// Resolve a file type from MIME type and/or filename extension.
    ///
    /// MIME wins when it is specific; generic MIME types (octet-stream)
    /// fall back to the extension.
    pub fn from_mime_and_extension(mime: &str, extension: Option<&str>) -> Option<Self> {
        let mime_lower = mime.to_lowercase();

        if mime_lower == "application/pdf" {
            return Some(Self::Pdf);
        }
        if mime_lower == "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            || mime_lower.contains("msword")
        {
            return Some(Self::Docx);
        }
        if mime_lower.starts_with("text/") {
            return Some(Self::Txt);
        }

        match extension.map(|e| e.to_lowercase()).as_deref() {
            Some("pdf") => Some(Self::Pdf),
            Some("docx") => Some(Self::Docx),
            Some("txt") | Some("md") => Some(Self::Txt),
            _ => None,
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Txt => "txt",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for FileType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            "txt" => Ok(Self::Txt),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown file type: {}",
                other
            ))),
        }
    }
}

/// Kind of generated quiz question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    #[default]
    Mcq,
    TrueFalse,
    ShortAnswer,
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Mcq => "mcq",
            Self::TrueFalse => "true_false",
            Self::ShortAnswer => "short_answer",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for QuestionType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mcq" => Ok(Self::Mcq),
            "true_false" => Ok(Self::TrueFalse),
            "short_answer" => Ok(Self::ShortAnswer),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown question type: {}",
                other
            ))),
        }
    }
}

/// Question difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyLevel {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl std::fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for DifficultyLevel {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown difficulty level: {}",
                other
            ))),
        }
    }
}

/// Origin of a summary: generated from document chunks, or from
/// caller-supplied text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SummaryType {
    #[default]
    Auto,
    Custom,
}

impl std::fmt::Display for SummaryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Auto => "auto",
            Self::Custom => "custom",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for SummaryType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "custom" => Ok(Self::Custom),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown summary type: {}",
                other
            ))),
        }
    }
}

/// Target length for a generated summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SummaryLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl SummaryLength {
    /// Approximate word budget for the generated summary.
    pub fn word_budget(&self) -> usize {
        match self {
            Self::Short => 60,
            Self::Medium => 130,
            Self::Long => 250,
        }
    }
}

impl std::fmt::Display for SummaryLength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Long => "long",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for SummaryLength {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "short" => Ok(Self::Short),
            "medium" => Ok(Self::Medium),
            "long" => Ok(Self::Long),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown summary length: {}",
                other
            ))),
        }
    }
}

// =============================================================================
// ENTITIES
// =============================================================================

/// A registered user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    /// Consecutive days of study activity (derived, maintained on activity).
    pub study_streak: i32,
    /// Lifetime study time in minutes.
    pub total_study_time: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An uploaded study document.
///
/// Immutable after upload except for preview/word-count backfill once
/// extraction completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub file_path: String,
    pub file_type: FileType,
    /// First characters of the extracted text, for listing UIs.
    pub content_preview: Option<String>,
    pub word_count: Option<i32>,
    pub uploaded_at: DateTime<Utc>,
}

/// A bounded study interval for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudySession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub session_start: DateTime<Utc>,
    pub session_end: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i32>,
    pub activities_count: i32,
    /// Free-text list of document titles touched during the session.
    pub documents_accessed: Option<String>,
}

/// A generated quiz question, immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub document_id: Uuid,
    pub question_text: String,
    pub question_type: QuestionType,
    /// MCQ options; empty for true/false and short-answer questions.
    pub options: Vec<String>,
    pub correct_answer: String,
    pub difficulty_level: DifficultyLevel,
    /// The chunk text the question was generated from (provenance).
    pub source_chunk: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One answer submission; append-only log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub question_id: Uuid,
    pub session_id: Option<Uuid>,
    pub user_answer: String,
    pub correct_answer: String,
    /// Always equals exact equality of `user_answer` and `correct_answer`;
    /// computed server-side at insert.
    pub is_correct: bool,
    pub response_time_ms: Option<i32>,
    pub answered_at: DateTime<Utc>,
}

/// A generated document summary, immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub id: Uuid,
    pub document_id: Uuid,
    pub summary_text: String,
    pub summary_type: SummaryType,
    pub length_setting: SummaryLength,
    pub key_points: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Per-day activity aggregate; one row per (user, date).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub questions_answered: i32,
    pub correct_answers: i32,
    pub study_time_minutes: i32,
    pub documents_read: i32,
    pub summaries_generated: i32,
    /// Running mean over the day's graded responses, in milliseconds.
    pub avg_response_time_ms: Option<f64>,
}

/// Per-user configuration defaults; one row per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPreferences {
    pub user_id: Uuid,
    pub quiz_difficulty: DifficultyLevel,
    pub summary_length: SummaryLength,
    pub daily_goal: i32,
    pub reminder_enabled: bool,
    pub theme: String,
    pub updated_at: DateTime<Utc>,
}

impl UserPreferences {
    /// Defaults applied when a user has no stored preferences yet.
    pub fn default_for(user_id: Uuid) -> Self {
        Self {
            user_id,
            quiz_difficulty: DifficultyLevel::Medium,
            summary_length: SummaryLength::Medium,
            daily_goal: crate::defaults::DAILY_GOAL_QUESTIONS,
            reminder_enabled: false,
            theme: "light".to_string(),
            updated_at: Utc::now(),
        }
    }
}

// =============================================================================
// RETRIEVAL
// =============================================================================

/// A stored embedded chunk of a document.
#[derive(Debug, Clone)]
pub struct DocumentChunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub chunk_index: i32,
    pub text: String,
    pub vector: Vector,
    pub model: String,
}

/// A nearest-neighbor hit from the chunk index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkHit {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    pub chunk_index: i32,
    pub text: String,
    /// `1.0 - cosine_distance`; higher is closer.
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_file_type_from_mime() {
        assert_eq!(
            FileType::from_mime_and_extension("application/pdf", None),
            Some(FileType::Pdf)
        );
        assert_eq!(
            FileType::from_mime_and_extension(
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                None
            ),
            Some(FileType::Docx)
        );
        assert_eq!(
            FileType::from_mime_and_extension("text/plain", None),
            Some(FileType::Txt)
        );
    }

    #[test]
    fn test_file_type_extension_fallback() {
        assert_eq!(
            FileType::from_mime_and_extension("application/octet-stream", Some("pdf")),
            Some(FileType::Pdf)
        );
        assert_eq!(
            FileType::from_mime_and_extension("application/octet-stream", Some("DOCX")),
            Some(FileType::Docx)
        );
        assert_eq!(
            FileType::from_mime_and_extension("application/octet-stream", Some("exe")),
            None
        );
    }

    #[test]
    fn test_file_type_roundtrip() {
        for ft in [FileType::Pdf, FileType::Docx, FileType::Txt] {
            assert_eq!(FileType::from_str(&ft.to_string()).unwrap(), ft);
        }
    }

    #[test]
    fn test_question_type_roundtrip() {
        for qt in [
            QuestionType::Mcq,
            QuestionType::TrueFalse,
            QuestionType::ShortAnswer,
        ] {
            assert_eq!(QuestionType::from_str(&qt.to_string()).unwrap(), qt);
        }
    }

    #[test]
    fn test_question_type_serde_matches_display() {
        let json = serde_json::to_string(&QuestionType::TrueFalse).unwrap();
        assert_eq!(json, "\"true_false\"");
    }

    #[test]
    fn test_difficulty_roundtrip() {
        for d in [
            DifficultyLevel::Easy,
            DifficultyLevel::Medium,
            DifficultyLevel::Hard,
        ] {
            assert_eq!(DifficultyLevel::from_str(&d.to_string()).unwrap(), d);
        }
    }

    #[test]
    fn test_difficulty_rejects_unknown() {
        assert!(DifficultyLevel::from_str("impossible").is_err());
    }

    #[test]
    fn test_summary_length_word_budgets_are_ordered() {
        assert!(SummaryLength::Short.word_budget() < SummaryLength::Medium.word_budget());
        assert!(SummaryLength::Medium.word_budget() < SummaryLength::Long.word_budget());
    }

    #[test]
    fn test_summary_type_roundtrip() {
        for s in [SummaryType::Auto, SummaryType::Custom] {
            assert_eq!(SummaryType::from_str(&s.to_string()).unwrap(), s);
        }
    }

    #[test]
    fn test_default_preferences() {
        let user_id = Uuid::new_v4();
        let prefs = UserPreferences::default_for(user_id);
        assert_eq!(prefs.user_id, user_id);
        assert_eq!(prefs.quiz_difficulty, DifficultyLevel::Medium);
        assert_eq!(prefs.summary_length, SummaryLength::Medium);
        assert!(!prefs.reminder_enabled);
        assert_eq!(prefs.theme, "light");
    }

    #[test]
    fn test_chunk_hit_serializes() {
        let hit = ChunkHit {
            chunk_id: Uuid::nil(),
            document_id: Uuid::nil(),
            chunk_index: 0,
            text: "photosynthesis converts light".to_string(),
            score: 0.91,
        };
        let json = serde_json::to_string(&hit).unwrap();
        assert!(json.contains("photosynthesis"));
    }
}
