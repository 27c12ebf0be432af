//! # studia-db
//!
//! PostgreSQL persistence layer for studia.
//!
//! Provides connection pool management, repository implementations for
//! every core entity, and vector search over the embedding index with
//! pgvector.

pub mod chunks;
pub mod documents;
pub mod pool;
pub mod preferences;
pub mod progress;
pub mod questions;
pub mod quiz_responses;
pub mod sessions;
pub mod summaries;
pub mod users;

// Re-export core types
pub use studia_core::*;

pub use chunks::PgChunkRepository;
pub use documents::PgDocumentRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use preferences::PgPreferencesRepository;
pub use progress::PgProgressRepository;
pub use questions::PgQuestionRepository;
pub use quiz_responses::PgQuizResponseRepository;
pub use sessions::PgSessionRepository;
pub use summaries::PgSummaryRepository;
pub use users::PgUserRepository;

/// Map a unique-constraint violation to `Error::Conflict`, passing
/// other database errors through.
pub(crate) fn map_unique_violation(e: sqlx::Error, message: &str) -> Error {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.code().as_deref() == Some("23505") {
            return Error::Conflict(message.to_string());
        }
    }
    Error::Database(e)
}

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// User accounts and derived stats.
    pub users: PgUserRepository,
    /// Uploaded documents.
    pub documents: PgDocumentRepository,
    /// Per-chunk embedding index.
    pub chunks: PgChunkRepository,
    /// Study sessions.
    pub sessions: PgSessionRepository,
    /// Generated quiz questions.
    pub questions: PgQuestionRepository,
    /// Graded answer log.
    pub quiz_responses: PgQuizResponseRepository,
    /// Generated summaries.
    pub summaries: PgSummaryRepository,
    /// Daily progress aggregates.
    pub progress: PgProgressRepository,
    /// Per-user preferences.
    pub preferences: PgPreferencesRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            users: PgUserRepository::new(pool.clone()),
            documents: PgDocumentRepository::new(pool.clone()),
            chunks: PgChunkRepository::new(pool.clone()),
            sessions: PgSessionRepository::new(pool.clone()),
            questions: PgQuestionRepository::new(pool.clone()),
            quiz_responses: PgQuizResponseRepository::new(pool.clone()),
            summaries: PgSummaryRepository::new(pool.clone()),
            progress: PgProgressRepository::new(pool.clone()),
            preferences: PgPreferencesRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations from the workspace `migrations/` directory.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Internal(format!("Migration failed: {}", e)))?;
        Ok(())
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<bool> {
        let ok: i32 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(ok == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_unique_violation_passthrough() {
        let err = map_unique_violation(sqlx::Error::RowNotFound, "duplicate");
        assert!(matches!(err, Error::Database(_)));
    }
}
