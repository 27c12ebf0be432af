//! Study session repository implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use studia_core::{Error, Result, SessionRepository, StudySession};

/// PostgreSQL implementation of SessionRepository.
#[derive(Clone)]
pub struct PgSessionRepository {
    pool: Pool<Postgres>,
}

impl PgSessionRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn session_from_row(row: &sqlx::postgres::PgRow) -> StudySession {
    StudySession {
        id: row.get("id"),
        user_id: row.get("user_id"),
        session_start: row.get("session_start"),
        session_end: row.get("session_end"),
        duration_minutes: row.get("duration_minutes"),
        activities_count: row.get("activities_count"),
        documents_accessed: row.get("documents_accessed"),
    }
}

const SESSION_COLUMNS: &str = "id, user_id, session_start, session_end, duration_minutes,
                               activities_count, documents_accessed";

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn start(&self, user_id: Uuid) -> Result<Uuid> {
        let id = Uuid::now_v7();

        sqlx::query("INSERT INTO study_sessions (id, user_id) VALUES ($1, $2)")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(id)
    }

    async fn fetch(&self, id: Uuid) -> Result<StudySession> {
        let query = format!("SELECT {} FROM study_sessions WHERE id = $1", SESSION_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::SessionNotFound(id))?;

        Ok(session_from_row(&row))
    }

    async fn close(&self, id: Uuid) -> Result<StudySession> {
        let query = format!(
            "UPDATE study_sessions
             SET session_end = now(),
                 duration_minutes = GREATEST(
                     0, ROUND(EXTRACT(EPOCH FROM (now() - session_start)) / 60.0)
                 )::int
             WHERE id = $1 AND session_end IS NULL
             RETURNING {}",
            SESSION_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        match row {
            Some(row) => Ok(session_from_row(&row)),
            None => {
                // Either unknown or already closed; distinguish for the caller.
                let session = self.fetch(id).await?;
                if session.session_end.is_some() {
                    Err(Error::Conflict(format!("Session {} is already closed", id)))
                } else {
                    Err(Error::SessionNotFound(id))
                }
            }
        }
    }

    async fn record_activity(&self, id: Uuid, document_title: Option<&str>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE study_sessions
             SET activities_count = activities_count + 1,
                 documents_accessed = CASE
                     WHEN $2::text IS NULL THEN documents_accessed
                     WHEN documents_accessed IS NULL OR documents_accessed = '' THEN $2
                     WHEN $2 = ANY(string_to_array(documents_accessed, ', '))
                         THEN documents_accessed
                     ELSE documents_accessed || ', ' || $2
                 END
             WHERE id = $1",
        )
        .bind(id)
        .bind(document_title)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::SessionNotFound(id));
        }
        Ok(())
    }
}
