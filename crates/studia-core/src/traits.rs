//! Core traits for studia abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// USER REPOSITORY
// =============================================================================

/// Request for creating a new user.
#[derive(Debug, Clone)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
}

/// Repository for user accounts and derived stats.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user. Fails with `Error::Conflict` on duplicate
    /// username or email.
    async fn insert(&self, req: CreateUserRequest) -> Result<Uuid>;

    /// Fetch a user by ID.
    async fn fetch(&self, id: Uuid) -> Result<User>;

    /// Check if a user exists.
    async fn exists(&self, id: Uuid) -> Result<bool>;

    /// Set the derived streak counter.
    async fn set_streak(&self, id: Uuid, streak: i32) -> Result<()>;

    /// Add minutes to the lifetime study-time counter.
    async fn add_study_time(&self, id: Uuid, minutes: i32) -> Result<()>;
}

// =============================================================================
// DOCUMENT REPOSITORY
// =============================================================================

/// Request for registering an uploaded document.
#[derive(Debug, Clone)]
pub struct CreateDocumentRequest {
    pub user_id: Uuid,
    pub title: String,
    pub file_path: String,
    pub file_type: FileType,
}

/// Response for listing documents.
#[derive(Debug, Clone)]
pub struct ListDocumentsResponse {
    pub documents: Vec<Document>,
    pub total: i64,
}

/// Repository for uploaded documents.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Insert a new document row (before extraction completes).
    async fn insert(&self, req: CreateDocumentRequest) -> Result<Uuid>;

    /// Fetch a document by ID.
    async fn fetch(&self, id: Uuid) -> Result<Document>;

    /// List a user's documents, newest first.
    async fn list(&self, user_id: Uuid, limit: i64, offset: i64) -> Result<ListDocumentsResponse>;

    /// Backfill the extracted content preview and word count.
    async fn set_extracted(&self, id: Uuid, preview: &str, word_count: i32) -> Result<()>;

    /// Delete a document; chunks, questions, and summaries cascade.
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// Check if a document exists.
    async fn exists(&self, id: Uuid) -> Result<bool>;
}

// =============================================================================
// CHUNK (EMBEDDING INDEX) REPOSITORY
// =============================================================================

/// Repository for the per-chunk embedding index.
#[async_trait]
pub trait ChunkRepository: Send + Sync {
    /// Store chunk embeddings for a document, replacing any existing ones.
    async fn store(
        &self,
        document_id: Uuid,
        chunks: Vec<(String, Vector)>,
        model: &str,
    ) -> Result<()>;

    /// Get all chunks for a document, in order.
    async fn get_for_document(&self, document_id: Uuid) -> Result<Vec<DocumentChunk>>;

    /// Delete all chunks for a document.
    async fn delete_for_document(&self, document_id: Uuid) -> Result<()>;

    /// Find the nearest chunks to a query vector.
    ///
    /// When `document_id` is set the search is scoped to that document.
    /// Ties resolve by chunk ID ordering.
    async fn find_similar(
        &self,
        query_vec: &Vector,
        limit: i64,
        document_id: Option<Uuid>,
    ) -> Result<Vec<ChunkHit>>;
}

// =============================================================================
// STUDY SESSION REPOSITORY
// =============================================================================

/// Repository for study sessions.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Open a new session for a user.
    async fn start(&self, user_id: Uuid) -> Result<Uuid>;

    /// Fetch a session by ID.
    async fn fetch(&self, id: Uuid) -> Result<StudySession>;

    /// Close a session: sets `session_end`, computes `duration_minutes`.
    ///
    /// Fails with `Error::Conflict` if the session is already closed.
    async fn close(&self, id: Uuid) -> Result<StudySession>;

    /// Increment the session's activity counter, optionally appending a
    /// document title to the accessed list.
    async fn record_activity(&self, id: Uuid, document_title: Option<&str>) -> Result<()>;
}

// =============================================================================
// QUESTION REPOSITORY
// =============================================================================

/// A question accepted from the quiz generator, pending persistence.
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub document_id: Uuid,
    pub question_text: String,
    pub question_type: QuestionType,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub difficulty_level: DifficultyLevel,
    pub source_chunk: Option<String>,
}

/// Repository for generated quiz questions.
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    /// Insert a batch of questions in one transaction.
    async fn insert_batch(&self, questions: Vec<NewQuestion>) -> Result<Vec<Question>>;

    /// Fetch a question by ID.
    async fn fetch(&self, id: Uuid) -> Result<Question>;

    /// List all questions generated for a document.
    async fn list_for_document(&self, document_id: Uuid) -> Result<Vec<Question>>;
}

// =============================================================================
// QUIZ RESPONSE REPOSITORY
// =============================================================================

/// An answer submission, before grading.
#[derive(Debug, Clone)]
pub struct NewQuizResponse {
    pub user_id: Uuid,
    pub question_id: Uuid,
    pub session_id: Option<Uuid>,
    pub user_answer: String,
    pub response_time_ms: Option<i32>,
}

/// Repository for the append-only answer log.
///
/// Grading happens at insert: `is_correct` is computed from exact string
/// equality against the stored correct answer, never accepted from callers.
#[async_trait]
pub trait QuizResponseRepository: Send + Sync {
    /// Grade and record an answer submission.
    async fn insert(&self, req: NewQuizResponse) -> Result<QuizResponse>;

    /// List a user's responses, newest first.
    async fn list_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<QuizResponse>>;
}

// =============================================================================
// SUMMARY REPOSITORY
// =============================================================================

/// A generated summary pending persistence.
#[derive(Debug, Clone)]
pub struct NewSummary {
    pub document_id: Uuid,
    pub summary_text: String,
    pub summary_type: SummaryType,
    pub length_setting: SummaryLength,
    pub key_points: Vec<String>,
}

/// Repository for generated summaries.
#[async_trait]
pub trait SummaryRepository: Send + Sync {
    /// Insert a summary.
    async fn insert(&self, req: NewSummary) -> Result<Summary>;

    /// Fetch a summary by ID.
    async fn fetch(&self, id: Uuid) -> Result<Summary>;

    /// List all summaries for a document, newest first.
    async fn list_for_document(&self, document_id: Uuid) -> Result<Vec<Summary>>;
}

// =============================================================================
// PROGRESS REPOSITORY
// =============================================================================

/// Incremental activity to fold into a user's daily aggregate row.
#[derive(Debug, Clone, Default)]
pub struct ProgressDelta {
    pub questions_answered: i32,
    pub correct_answers: i32,
    pub study_time_minutes: i32,
    pub documents_read: i32,
    pub summaries_generated: i32,
    /// Response latency of a graded answer, folded into the running mean.
    pub response_time_ms: Option<i32>,
}

/// Repository for per-day progress aggregates.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Upsert the (user, date) row, accumulating the delta.
    async fn record(&self, user_id: Uuid, date: NaiveDate, delta: ProgressDelta) -> Result<()>;

    /// Fetch rows in `[from, to]`, ascending by date.
    async fn range(&self, user_id: Uuid, from: NaiveDate, to: NaiveDate)
        -> Result<Vec<ProgressEntry>>;

    /// All dates with recorded activity, descending. Used for streaks.
    async fn activity_dates(&self, user_id: Uuid) -> Result<Vec<NaiveDate>>;
}

// =============================================================================
// PREFERENCES REPOSITORY
// =============================================================================

/// Repository for per-user preference rows.
#[async_trait]
pub trait PreferencesRepository: Send + Sync {
    /// Fetch preferences, falling back to defaults when no row exists.
    async fn get(&self, user_id: Uuid) -> Result<UserPreferences>;

    /// Insert or update the preferences row.
    async fn upsert(&self, prefs: &UserPreferences) -> Result<()>;
}

// =============================================================================
// INFERENCE BACKENDS
// =============================================================================

/// Backend for text embedding.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for the given texts.
    ///
    /// Returns a vector of embedding vectors, one per input text.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>>;

    /// Get the expected dimension of embedding vectors.
    fn dimension(&self) -> usize;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Backend for text generation (LLM).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text given a prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate text with system context.
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Generate with JSON output enforcement (for quiz/key-point parsing).
    async fn generate_json(&self, system: &str, prompt: &str) -> Result<String>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// Combined inference backend supporting both embedding and generation.
#[async_trait]
pub trait InferenceBackend: EmbeddingBackend + GenerationBackend {
    /// Check if the backend is available and responding.
    async fn health_check(&self) -> Result<bool>;
}
