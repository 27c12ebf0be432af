//! Daily progress repository implementation.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use studia_core::{
    update_running_mean, Error, ProgressDelta, ProgressEntry, ProgressRepository, Result,
};

/// PostgreSQL implementation of ProgressRepository.
///
/// Each user has at most one row per date; `record` folds deltas into
/// that row with an `ON CONFLICT` upsert.
#[derive(Clone)]
pub struct PgProgressRepository {
    pool: Pool<Postgres>,
}

impl PgProgressRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn entry_from_row(row: &sqlx::postgres::PgRow) -> ProgressEntry {
    ProgressEntry {
        id: row.get("id"),
        user_id: row.get("user_id"),
        date: row.get("date"),
        questions_answered: row.get("questions_answered"),
        correct_answers: row.get("correct_answers"),
        study_time_minutes: row.get("study_time_minutes"),
        documents_read: row.get("documents_read"),
        summaries_generated: row.get("summaries_generated"),
        avg_response_time_ms: row.get("avg_response_time_ms"),
    }
}

#[async_trait]
impl ProgressRepository for PgProgressRepository {
    async fn record(&self, user_id: Uuid, date: NaiveDate, delta: ProgressDelta) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let row = sqlx::query(
            "INSERT INTO progress_tracking
                 (id, user_id, date, questions_answered, correct_answers,
                  study_time_minutes, documents_read, summaries_generated)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (user_id, date) DO UPDATE SET
                 questions_answered = progress_tracking.questions_answered + EXCLUDED.questions_answered,
                 correct_answers = progress_tracking.correct_answers + EXCLUDED.correct_answers,
                 study_time_minutes = progress_tracking.study_time_minutes + EXCLUDED.study_time_minutes,
                 documents_read = progress_tracking.documents_read + EXCLUDED.documents_read,
                 summaries_generated = progress_tracking.summaries_generated + EXCLUDED.summaries_generated
             RETURNING id, avg_response_time_ms, response_samples",
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(date)
        .bind(delta.questions_answered)
        .bind(delta.correct_answers)
        .bind(delta.study_time_minutes)
        .bind(delta.documents_read)
        .bind(delta.summaries_generated)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        if let Some(sample_ms) = delta.response_time_ms {
            let row_id: Uuid = row.get("id");
            let prior_mean: Option<f64> = row.get("avg_response_time_ms");
            let samples: i64 = row.get("response_samples");

            let new_mean = update_running_mean(prior_mean, samples, sample_ms as f64);

            sqlx::query(
                "UPDATE progress_tracking
                 SET avg_response_time_ms = $1, response_samples = response_samples + 1
                 WHERE id = $2",
            )
            .bind(new_mean)
            .bind(row_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn range(
        &self,
        user_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ProgressEntry>> {
        let rows = sqlx::query(
            "SELECT id, user_id, date, questions_answered, correct_answers,
                    study_time_minutes, documents_read, summaries_generated,
                    avg_response_time_ms
             FROM progress_tracking
             WHERE user_id = $1 AND date >= $2 AND date <= $3
             ORDER BY date",
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(entry_from_row).collect())
    }

    async fn activity_dates(&self, user_id: Uuid) -> Result<Vec<NaiveDate>> {
        let dates = sqlx::query_scalar(
            "SELECT date FROM progress_tracking WHERE user_id = $1 ORDER BY date DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(dates)
    }
}
