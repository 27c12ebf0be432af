//! Quiz response repository implementation.
//!
//! Grading is computed here, at insert time, from the stored correct
//! answer. A submitted `is_correct` flag is never accepted.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use studia_core::{Error, NewQuizResponse, QuizResponse, QuizResponseRepository, Result};

/// PostgreSQL implementation of QuizResponseRepository.
#[derive(Clone)]
pub struct PgQuizResponseRepository {
    pool: Pool<Postgres>,
}

impl PgQuizResponseRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn response_from_row(row: &sqlx::postgres::PgRow) -> QuizResponse {
    QuizResponse {
        id: row.get("id"),
        user_id: row.get("user_id"),
        question_id: row.get("question_id"),
        session_id: row.get("session_id"),
        user_answer: row.get("user_answer"),
        correct_answer: row.get("correct_answer"),
        is_correct: row.get("is_correct"),
        response_time_ms: row.get("response_time_ms"),
        answered_at: row.get("answered_at"),
    }
}

const RESPONSE_COLUMNS: &str = "id, user_id, question_id, session_id, user_answer,
                                correct_answer, is_correct, response_time_ms, answered_at";

#[async_trait]
impl QuizResponseRepository for PgQuizResponseRepository {
    async fn insert(&self, req: NewQuizResponse) -> Result<QuizResponse> {
        // Pull the correct answer from the question row and grade in the
        // same statement so the comparison cannot race a question edit.
        // The answer is trimmed before binding, so the stored user_answer
        // is exactly the string that was compared.
        let user_answer = req.user_answer.trim();
        let query = format!(
            "INSERT INTO quiz_responses
                 (id, user_id, question_id, session_id, user_answer,
                  correct_answer, is_correct, response_time_ms)
             SELECT $1, $2, q.id, $4, $5, q.correct_answer,
                    $5 = q.correct_answer, $6
             FROM questions q
             WHERE q.id = $3
             RETURNING {}",
            RESPONSE_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(Uuid::now_v7())
            .bind(req.user_id)
            .bind(req.question_id)
            .bind(req.session_id)
            .bind(user_answer)
            .bind(req.response_time_ms)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::QuestionNotFound(req.question_id))?;

        Ok(response_from_row(&row))
    }

    async fn list_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<QuizResponse>> {
        let query = format!(
            "SELECT {} FROM quiz_responses
             WHERE user_id = $1
             ORDER BY answered_at DESC, id DESC
             LIMIT $2",
            RESPONSE_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows.iter().map(response_from_row).collect())
    }
}
