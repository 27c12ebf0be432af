//! # studia-api
//!
//! HTTP API server for studia: document upload and ingestion, grounded
//! question answering, quiz generation and grading, summarization, study
//! sessions, and the progress dashboard.
//!
//! All responses are JSON. Errors use a uniform `{"error": "..."}`
//! envelope; list endpoints carry a `pagination` block.

use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::{HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use studia_core::defaults::{
    CORS_MAX_AGE_SECS, MAX_UPLOAD_BYTES, PAGE_LIMIT, PROGRESS_WINDOW_DAYS, QUIZ_NUM_QUESTIONS,
    SERVER_PORT,
};
use studia_core::progress::compute_streak;
use studia_core::{
    ChunkHit, ChunkRepository, CreateDocumentRequest, CreateUserRequest, DifficultyLevel, Document,
    DocumentRepository, EmbeddingBackend, Error, InferenceBackend, NewQuizResponse, NewSummary,
    PreferencesRepository, ProgressDelta, ProgressEntry, ProgressRepository, Question,
    QuestionRepository, QuestionType, QuizResponse, QuizResponseRepository, SessionRepository,
    StudySession, Summary, SummaryLength, SummaryRepository, User, UserPreferences, UserRepository,
};
use studia_db::{log_pool_metrics, Database};
use studia_inference::OllamaBackend;
use studia_ingest::{
    content_preview, word_count, Chunker, ChunkerConfig, ExtractionRegistry, SentenceChunker,
};
use studia_search::{
    AnswerGenerator, QuizGenerator, QuizRequest, Retriever, SummarizeRequest, Summarizer,
};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Server configuration resolved from the environment.
#[derive(Debug, Clone)]
struct ApiConfig {
    database_url: String,
    bind_addr: String,
    upload_dir: PathBuf,
}

impl ApiConfig {
    fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let bind_addr = std::env::var("STUDIA_BIND_ADDR")
            .unwrap_or_else(|_| format!("0.0.0.0:{}", SERVER_PORT));
        let upload_dir: PathBuf = std::env::var("STUDIA_UPLOAD_DIR")
            .unwrap_or_else(|_| "uploads".to_string())
            .into();
        Ok(Self {
            database_url,
            bind_addr,
            upload_dir,
        })
    }
}

/// Initialize tracing from `RUST_LOG` / `LOG_FORMAT`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,tower_http=info"));
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

// =============================================================================
// REQUEST IDS
// =============================================================================

/// Stamps every request with a UUIDv7 `x-request-id`.
///
/// v7 IDs are time-ordered, so request IDs sort by arrival in logs.
#[derive(Clone, Copy, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// API-level error with an HTTP status mapping.
#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    PayloadTooLarge(String),
    /// Inference backend or model-output failure.
    Upstream(String),
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::BadRequest(m)
            | Self::NotFound(m)
            | Self::Conflict(m)
            | Self::PayloadTooLarge(m)
            | Self::Upstream(m)
            | Self::Internal(m) => m,
        }
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::NotFound(_)
            | Error::UserNotFound(_)
            | Error::DocumentNotFound(_)
            | Error::QuestionNotFound(_)
            | Error::SessionNotFound(_) => Self::NotFound(e.to_string()),
            Error::InvalidInput(m) => Self::BadRequest(m),
            Error::Conflict(m) => Self::Conflict(m),
            Error::Extraction(m) => Self::BadRequest(format!("Extraction failed: {}", m)),
            Error::Embedding(_) | Error::Inference(_) | Error::Request(_) | Error::Serialization(_) => {
                Self::Upstream(e.to_string())
            }
            Error::Database(_) | Error::Io(_) | Error::Internal(_) | Error::Config(_)
            | Error::Retrieval(_) => {
                warn!(error = %e, "Internal error surfaced to client");
                Self::Internal("Internal server error".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

// =============================================================================
// PAGINATION
// =============================================================================

#[derive(Debug, Serialize)]
struct PaginationMeta {
    total: usize,
    limit: usize,
    offset: usize,
    has_more: bool,
}

/// List payload with pagination metadata.
#[derive(Debug, Serialize)]
struct ListResponse<T> {
    data: Vec<T>,
    pagination: PaginationMeta,
}

impl<T> ListResponse<T> {
    fn new(data: Vec<T>, total: usize, limit: usize, offset: usize) -> Self {
        let has_more = offset + data.len() < total;
        Self {
            data,
            pagination: PaginationMeta {
                total,
                limit,
                offset,
                has_more,
            },
        }
    }
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

#[derive(Clone)]
struct AppState {
    db: Arc<Database>,
    backend: Arc<OllamaBackend>,
    registry: Arc<ExtractionRegistry>,
    answerer: Arc<AnswerGenerator>,
    quizzer: Arc<QuizGenerator>,
    summarizer: Arc<Summarizer>,
    upload_dir: PathBuf,
}

impl AppState {
    fn new(db: Arc<Database>, backend: Arc<OllamaBackend>, upload_dir: PathBuf) -> Self {
        let chunks: Arc<dyn ChunkRepository> = Arc::new(db.chunks.clone());
        let embedder: Arc<dyn EmbeddingBackend> = backend.clone();
        let generator: Arc<dyn studia_core::GenerationBackend> = backend.clone();

        let retriever = Retriever::new(chunks, embedder);
        Self {
            answerer: Arc::new(AnswerGenerator::new(retriever, generator.clone())),
            quizzer: Arc::new(QuizGenerator::new(generator.clone())),
            summarizer: Arc::new(Summarizer::new(generator)),
            registry: Arc::new(ExtractionRegistry::new()),
            db,
            backend,
            upload_dir,
        }
    }
}

// =============================================================================
// USERS
// =============================================================================

#[derive(Debug, Deserialize)]
struct CreateUserBody {
    username: String,
    email: String,
    full_name: Option<String>,
}

async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<CreateUserBody>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let username = body.username.trim().to_string();
    let email = body.email.trim().to_string();
    if username.is_empty() || username.len() > 64 {
        return Err(ApiError::BadRequest(
            "Username must be between 1 and 64 characters".to_string(),
        ));
    }
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::BadRequest("A valid email is required".to_string()));
    }

    let id = state
        .db
        .users
        .insert(CreateUserRequest {
            username,
            email,
            full_name: body.full_name.filter(|n| !n.trim().is_empty()),
        })
        .await?;
    let user = state.db.users.fetch(id).await?;
    info!(user_id = %id, "Created user");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.db.users.fetch(id).await?))
}

#[derive(Debug, Deserialize)]
struct UpdatePreferencesBody {
    quiz_difficulty: Option<DifficultyLevel>,
    summary_length: Option<SummaryLength>,
    daily_goal: Option<i32>,
    reminder_enabled: Option<bool>,
    theme: Option<String>,
}

async fn get_preferences(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserPreferences>> {
    ensure_user(&state, id).await?;
    Ok(Json(state.db.preferences.get(id).await?))
}

async fn update_preferences(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdatePreferencesBody>,
) -> ApiResult<Json<UserPreferences>> {
    ensure_user(&state, id).await?;

    let mut prefs = state.db.preferences.get(id).await?;
    if let Some(difficulty) = body.quiz_difficulty {
        prefs.quiz_difficulty = difficulty;
    }
    if let Some(length) = body.summary_length {
        prefs.summary_length = length;
    }
    if let Some(goal) = body.daily_goal {
        if goal < 1 {
            return Err(ApiError::BadRequest(
                "Daily goal must be at least 1".to_string(),
            ));
        }
        prefs.daily_goal = goal;
    }
    if let Some(enabled) = body.reminder_enabled {
        prefs.reminder_enabled = enabled;
    }
    if let Some(theme) = body.theme {
        let theme = theme.trim().to_lowercase();
        if theme.is_empty() {
            return Err(ApiError::BadRequest("Theme must not be empty".to_string()));
        }
        prefs.theme = theme;
    }

    state.db.preferences.upsert(&prefs).await?;
    Ok(Json(state.db.preferences.get(id).await?))
}

// =============================================================================
// DOCUMENTS
// =============================================================================

#[derive(Debug, Serialize)]
struct UploadResponse {
    document: Document,
    chunk_count: usize,
}

/// Multipart upload: `file` (required), `user_id` (required), `title`
/// (optional, defaults to the filename stem).
///
/// Extraction, chunking, and embedding run synchronously; the document
/// is searchable once the response returns.
async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut user_id: Option<Uuid> = None;
    let mut title: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|f| !f.is_empty())
                    .ok_or_else(|| {
                        ApiError::BadRequest("File field must carry a filename".to_string())
                    })?;
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {}", e)))?;
                file = Some((filename, data.to_vec()));
            }
            "user_id" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                user_id = Some(text.trim().parse().map_err(|_| {
                    ApiError::BadRequest("user_id must be a UUID".to_string())
                })?);
            }
            "title" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                if !text.trim().is_empty() {
                    title = Some(text.trim().to_string());
                }
            }
            _ => {}
        }
    }

    let (filename, data) =
        file.ok_or_else(|| ApiError::BadRequest("Missing file field".to_string()))?;
    let user_id =
        user_id.ok_or_else(|| ApiError::BadRequest("Missing user_id field".to_string()))?;
    if data.is_empty() {
        return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
    }
    if data.len() > MAX_UPLOAD_BYTES {
        return Err(ApiError::PayloadTooLarge(format!(
            "Upload exceeds the {} MB limit",
            MAX_UPLOAD_BYTES / (1024 * 1024)
        )));
    }
    ensure_user(&state, user_id).await?;

    let (file_type, extraction) = state.registry.extract(&data, &filename).await?;

    // Persist the original upload before registering the document row.
    let stored_name = format!("{}_{}", Uuid::now_v7(), sanitize_filename(&filename));
    let stored_path = state.upload_dir.join(&stored_name);
    tokio::fs::create_dir_all(&state.upload_dir)
        .await
        .map_err(Error::Io)?;
    tokio::fs::write(&stored_path, &data).await.map_err(Error::Io)?;

    let title = title.unwrap_or_else(|| title_from_filename(&filename));
    let document_id = state
        .db
        .documents
        .insert(CreateDocumentRequest {
            user_id,
            title,
            file_path: stored_path.to_string_lossy().into_owned(),
            file_type,
        })
        .await?;

    // Roll back the document row and the stored file if indexing fails,
    // so a client retry does not leave duplicates behind.
    let chunk_count = match index_document(&state, document_id, &extraction.text).await {
        Ok(count) => count,
        Err(err) => {
            if let Err(cleanup_err) = state.db.documents.delete(document_id).await {
                warn!(
                    document_id = %document_id,
                    error = %cleanup_err,
                    "Failed to remove document row after ingest failure"
                );
            }
            if let Err(io_err) = tokio::fs::remove_file(&stored_path).await {
                warn!(
                    path = %stored_path.display(),
                    error = %io_err,
                    "Failed to remove stored upload after ingest failure"
                );
            }
            return Err(err.into());
        }
    };

    state
        .db
        .progress
        .record(
            user_id,
            today(),
            ProgressDelta {
                documents_read: 1,
                ..Default::default()
            },
        )
        .await?;

    let document = state.db.documents.fetch(document_id).await?;
    info!(
        document_id = %document_id,
        user_id = %user_id,
        file_type = %file_type,
        chunk_count,
        "Ingested document"
    );
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            document,
            chunk_count,
        }),
    ))
}

/// Chunk, embed, and index extracted text, then backfill the preview.
async fn index_document(
    state: &AppState,
    document_id: Uuid,
    text: &str,
) -> studia_core::Result<usize> {
    let chunker = SentenceChunker::new(ChunkerConfig::default());
    let chunk_texts: Vec<String> = chunker.chunk(text).into_iter().map(|c| c.text).collect();
    let chunk_count = chunk_texts.len();

    if !chunk_texts.is_empty() {
        let vectors = state.backend.embed_texts(&chunk_texts).await?;
        let pairs: Vec<_> = chunk_texts.into_iter().zip(vectors).collect();
        let model = EmbeddingBackend::model_name(state.backend.as_ref());
        state.db.chunks.store(document_id, pairs, model).await?;
    }

    state
        .db
        .documents
        .set_extracted(document_id, &content_preview(text), word_count(text) as i32)
        .await?;

    Ok(chunk_count)
}

async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Document>> {
    Ok(Json(state.db.documents.fetch(id).await?))
}

#[derive(Debug, Deserialize)]
struct ListDocumentsQuery {
    user_id: Uuid,
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn list_documents(
    State(state): State<AppState>,
    Query(query): Query<ListDocumentsQuery>,
) -> ApiResult<Json<ListResponse<Document>>> {
    ensure_user(&state, query.user_id).await?;
    let limit = query.limit.unwrap_or(PAGE_LIMIT).clamp(1, 200);
    let offset = query.offset.unwrap_or(0).max(0);

    let page = state.db.documents.list(query.user_id, limit, offset).await?;
    Ok(Json(ListResponse::new(
        page.documents,
        page.total as usize,
        limit as usize,
        offset as usize,
    )))
}

// =============================================================================
// ASK / QUIZ / SUMMARIES
// =============================================================================

#[derive(Debug, Deserialize)]
struct AskBody {
    question: String,
    top_k: Option<usize>,
    session_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
struct AskResponse {
    document_id: Uuid,
    answer: String,
    confidence: f32,
    low_confidence: bool,
    sources: Vec<ChunkHit>,
}

async fn ask_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<AskBody>,
) -> ApiResult<Json<AskResponse>> {
    let document = state.db.documents.fetch(id).await?;
    let answer = state
        .answerer
        .ask(&body.question, body.top_k.unwrap_or(0), Some(id))
        .await?;

    touch_session(&state, body.session_id, Some(&document.title)).await?;

    Ok(Json(AskResponse {
        document_id: id,
        answer: answer.answer,
        confidence: answer.confidence,
        low_confidence: answer.low_confidence,
        sources: answer.sources,
    }))
}

#[derive(Debug, Deserialize, Default)]
struct GenerateQuizBody {
    num_questions: Option<usize>,
    difficulty: Option<DifficultyLevel>,
    question_type: Option<QuestionType>,
    session_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
struct QuizResponseBody {
    document_id: Uuid,
    questions: Vec<Question>,
}

async fn generate_quiz(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<GenerateQuizBody>,
) -> ApiResult<(StatusCode, Json<QuizResponseBody>)> {
    let document = state.db.documents.fetch(id).await?;
    let prefs = state.db.preferences.get(document.user_id).await?;

    let request = QuizRequest {
        num_questions: body.num_questions.unwrap_or(QUIZ_NUM_QUESTIONS),
        difficulty: body.difficulty.unwrap_or(prefs.quiz_difficulty),
        question_type: body.question_type.unwrap_or_default(),
    };

    let chunks = state.db.chunks.get_for_document(id).await?;
    let generated = state.quizzer.generate(id, &chunks, &request).await?;
    if generated.is_empty() {
        return Err(ApiError::Upstream(
            "The model produced no usable questions; try again".to_string(),
        ));
    }

    let questions = state.db.questions.insert_batch(generated).await?;
    touch_session(&state, body.session_id, Some(&document.title)).await?;

    info!(
        document_id = %id,
        count = questions.len(),
        difficulty = %request.difficulty,
        "Generated quiz"
    );
    Ok((
        StatusCode::CREATED,
        Json(QuizResponseBody {
            document_id: id,
            questions,
        }),
    ))
}

#[derive(Debug, Deserialize)]
struct SubmitAnswerBody {
    user_id: Uuid,
    question_id: Uuid,
    session_id: Option<Uuid>,
    user_answer: String,
    response_time_ms: Option<i32>,
}

async fn submit_answer(
    State(state): State<AppState>,
    Json(body): Json<SubmitAnswerBody>,
) -> ApiResult<(StatusCode, Json<QuizResponse>)> {
    if body.user_answer.trim().is_empty() {
        return Err(ApiError::BadRequest("Answer must not be empty".to_string()));
    }
    if body.response_time_ms.is_some_and(|ms| ms < 0) {
        return Err(ApiError::BadRequest(
            "Response time must not be negative".to_string(),
        ));
    }
    ensure_user(&state, body.user_id).await?;

    let graded = state
        .db
        .quiz_responses
        .insert(NewQuizResponse {
            user_id: body.user_id,
            question_id: body.question_id,
            session_id: body.session_id,
            user_answer: body.user_answer,
            response_time_ms: body.response_time_ms,
        })
        .await?;

    let day = today();
    state
        .db
        .progress
        .record(
            body.user_id,
            day,
            ProgressDelta {
                questions_answered: 1,
                correct_answers: graded.is_correct as i32,
                response_time_ms: graded.response_time_ms,
                ..Default::default()
            },
        )
        .await?;
    refresh_streak(&state, body.user_id, day).await?;
    touch_session(&state, body.session_id, None).await?;

    Ok((StatusCode::CREATED, Json(graded)))
}

#[derive(Debug, Deserialize, Default)]
struct SummarizeBody {
    length: Option<SummaryLength>,
    custom_text: Option<String>,
    session_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
struct SummaryResponseBody {
    summary: Summary,
    original_words: usize,
    summary_words: usize,
    compression_ratio: f64,
}

async fn summarize_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<SummarizeBody>,
) -> ApiResult<(StatusCode, Json<SummaryResponseBody>)> {
    let document = state.db.documents.fetch(id).await?;
    let prefs = state.db.preferences.get(document.user_id).await?;

    let request = SummarizeRequest {
        length: body.length.unwrap_or(prefs.summary_length),
        custom_text: body.custom_text,
    };
    let chunks = state.db.chunks.get_for_document(id).await?;
    let output = state.summarizer.summarize(&chunks, &request).await?;

    let summary = state
        .db
        .summaries
        .insert(NewSummary {
            document_id: id,
            summary_text: output.summary_text,
            summary_type: output.summary_type,
            length_setting: output.length_setting,
            key_points: output.key_points,
        })
        .await?;

    state
        .db
        .progress
        .record(
            document.user_id,
            today(),
            ProgressDelta {
                summaries_generated: 1,
                ..Default::default()
            },
        )
        .await?;
    touch_session(&state, body.session_id, Some(&document.title)).await?;

    Ok((
        StatusCode::CREATED,
        Json(SummaryResponseBody {
            summary,
            original_words: output.stats.original_words,
            summary_words: output.stats.summary_words,
            compression_ratio: output.stats.compression_ratio,
        }),
    ))
}

// =============================================================================
// STUDY SESSIONS
// =============================================================================

#[derive(Debug, Deserialize)]
struct StartSessionBody {
    user_id: Uuid,
}

async fn start_session(
    State(state): State<AppState>,
    Json(body): Json<StartSessionBody>,
) -> ApiResult<(StatusCode, Json<StudySession>)> {
    ensure_user(&state, body.user_id).await?;
    let id = state.db.sessions.start(body.user_id).await?;
    let session = state.db.sessions.fetch(id).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// Close a session and fold its duration into the daily aggregates.
async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<StudySession>> {
    let closed = state.db.sessions.close(id).await?;
    let minutes = closed.duration_minutes.unwrap_or(0);

    let day = today();
    if minutes > 0 {
        state.db.users.add_study_time(closed.user_id, minutes).await?;
    }
    state
        .db
        .progress
        .record(
            closed.user_id,
            day,
            ProgressDelta {
                study_time_minutes: minutes,
                ..Default::default()
            },
        )
        .await?;
    refresh_streak(&state, closed.user_id, day).await?;

    info!(
        session_id = %id,
        user_id = %closed.user_id,
        duration_minutes = minutes,
        activities = closed.activities_count,
        "Closed study session"
    );
    Ok(Json(closed))
}

// =============================================================================
// PROGRESS DASHBOARD
// =============================================================================

#[derive(Debug, Deserialize)]
struct ProgressQuery {
    days: Option<i64>,
}

#[derive(Debug, Serialize)]
struct ProgressTotals {
    questions_answered: i64,
    correct_answers: i64,
    study_time_minutes: i64,
    documents_read: i64,
    summaries_generated: i64,
}

#[derive(Debug, Serialize)]
struct ProgressReport {
    user_id: Uuid,
    from: NaiveDate,
    to: NaiveDate,
    streak: i32,
    /// Fraction of answered questions that were correct, 0.0 when none.
    accuracy: f64,
    totals: ProgressTotals,
    daily: Vec<ProgressEntry>,
}

async fn get_progress(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ProgressQuery>,
) -> ApiResult<Json<ProgressReport>> {
    ensure_user(&state, id).await?;

    let days = query.days.unwrap_or(PROGRESS_WINDOW_DAYS).clamp(1, 365);
    let to = today();
    let from = to - ChronoDuration::days(days - 1);

    let daily = state.db.progress.range(id, from, to).await?;
    let totals = ProgressTotals {
        questions_answered: daily.iter().map(|d| d.questions_answered as i64).sum(),
        correct_answers: daily.iter().map(|d| d.correct_answers as i64).sum(),
        study_time_minutes: daily.iter().map(|d| d.study_time_minutes as i64).sum(),
        documents_read: daily.iter().map(|d| d.documents_read as i64).sum(),
        summaries_generated: daily.iter().map(|d| d.summaries_generated as i64).sum(),
    };
    let accuracy = if totals.questions_answered > 0 {
        totals.correct_answers as f64 / totals.questions_answered as f64
    } else {
        0.0
    };

    let dates = state.db.progress.activity_dates(id).await?;
    let streak = compute_streak(&dates, to);

    Ok(Json(ProgressReport {
        user_id: id,
        from,
        to,
        streak,
        accuracy,
        totals,
        daily,
    }))
}

// =============================================================================
// HEALTH
// =============================================================================

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let database = state.db.health_check().await.unwrap_or(false);
    let inference = state.backend.health_check().await.unwrap_or(false);

    let status = if database && inference { "ok" } else { "degraded" };
    let code = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(json!({
            "status": status,
            "database": database,
            "inference": inference,
        })),
    )
}

// =============================================================================
// HELPERS
// =============================================================================

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

async fn ensure_user(state: &AppState, id: Uuid) -> ApiResult<()> {
    if !state.db.users.exists(id).await? {
        return Err(ApiError::NotFound(format!("User not found: {}", id)));
    }
    Ok(())
}

/// Recompute and persist the user's streak from the activity calendar.
async fn refresh_streak(state: &AppState, user_id: Uuid, day: NaiveDate) -> ApiResult<i32> {
    let dates = state.db.progress.activity_dates(user_id).await?;
    let streak = compute_streak(&dates, day);
    state.db.users.set_streak(user_id, streak).await?;
    Ok(streak)
}

/// Count an activity against an optional study session.
async fn touch_session(
    state: &AppState,
    session_id: Option<Uuid>,
    document_title: Option<&str>,
) -> ApiResult<()> {
    if let Some(id) = session_id {
        state.db.sessions.record_activity(id, document_title).await?;
    }
    Ok(())
}

/// Keep filenames filesystem-safe: alphanumerics, dot, dash, underscore.
fn sanitize_filename(name: &str) -> String {
    let base = FsPath::new(name)
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    base.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Default document title: the filename without its extension.
fn title_from_filename(filename: &str) -> String {
    FsPath::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Untitled document".to_string())
}

// =============================================================================
// ROUTER AND STARTUP
// =============================================================================

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(CORS_MAX_AGE_SECS));

    Router::new()
        .route("/health", get(health))
        .route("/users", post(create_user))
        .route("/users/:id", get(get_user))
        .route(
            "/users/:id/preferences",
            get(get_preferences).put(update_preferences),
        )
        .route("/users/:id/progress", get(get_progress))
        .route("/documents", post(upload_document).get(list_documents))
        .route("/documents/:id", get(get_document))
        .route("/documents/:id/ask", post(ask_document))
        .route("/documents/:id/quiz", post(generate_quiz))
        .route("/documents/:id/summaries", post(summarize_document))
        .route("/quiz/responses", post(submit_answer))
        .route("/sessions", post(start_session))
        .route("/sessions/:id/end", post(end_session))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install ctrl-c handler");
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::from_env()?;
    let db = Arc::new(Database::connect(&config.database_url).await?);
    db.migrate().await?;
    log_pool_metrics(&db.pool);

    let backend = Arc::new(OllamaBackend::from_env());
    if !backend.health_check().await.unwrap_or(false) {
        warn!("Inference backend is not reachable; ingestion and study features will fail");
    }

    let state = AppState::new(db, backend, config.upload_dir.clone());
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "studia-api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_response_has_more() {
        let page: ListResponse<i32> = ListResponse::new(vec![1, 2, 3], 10, 3, 0);
        assert!(page.pagination.has_more);

        let last: ListResponse<i32> = ListResponse::new(vec![1], 10, 3, 9);
        assert!(!last.pagination.has_more);

        let empty: ListResponse<i32> = ListResponse::new(vec![], 0, 3, 0);
        assert!(!empty.pagination.has_more);
    }

    #[test]
    fn test_api_error_status_mapping() {
        assert_eq!(
            ApiError::from(Error::UserNotFound(Uuid::nil())).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(Error::InvalidInput("bad".into())).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(Error::Conflict("dup".into())).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(Error::Inference("down".into())).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::from(Error::Internal("oops".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_errors_do_not_leak_details() {
        let err = ApiError::from(Error::Internal("pool exhausted at 10.0.0.5".into()));
        assert_eq!(err.message(), "Internal server error");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("notes.pdf"), "notes.pdf");
        assert_eq!(sanitize_filename("my exam notes!.pdf"), "my_exam_notes_.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
    }

    #[test]
    fn test_title_from_filename() {
        assert_eq!(title_from_filename("biology-101.pdf"), "biology-101");
        assert_eq!(title_from_filename("notes"), "notes");
        assert_eq!(title_from_filename(""), "Untitled document");
    }

    #[test]
    fn test_make_request_id_is_valid_header() {
        let mut maker = MakeRequestUuidV7;
        let request = Request::builder().body(()).unwrap();
        let id = maker.make_request_id(&request);
        assert!(id.is_some());
    }
}
