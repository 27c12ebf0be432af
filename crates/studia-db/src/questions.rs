//! Question repository implementation.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use studia_core::{
    DifficultyLevel, Error, NewQuestion, Question, QuestionRepository, QuestionType, Result,
};

/// PostgreSQL implementation of QuestionRepository.
#[derive(Clone)]
pub struct PgQuestionRepository {
    pool: Pool<Postgres>,
}

impl PgQuestionRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn question_from_row(row: &sqlx::postgres::PgRow) -> Result<Question> {
    let question_type: String = row.get("question_type");
    let difficulty_level: String = row.get("difficulty_level");
    let options: serde_json::Value = row.get("options");
    let options: Vec<String> = serde_json::from_value(options)
        .map_err(|e| Error::Serialization(format!("Invalid options payload: {}", e)))?;

    Ok(Question {
        id: row.get("id"),
        document_id: row.get("document_id"),
        question_text: row.get("question_text"),
        question_type: QuestionType::from_str(&question_type)?,
        options,
        correct_answer: row.get("correct_answer"),
        difficulty_level: DifficultyLevel::from_str(&difficulty_level)?,
        source_chunk: row.get("source_chunk"),
        created_at: row.get("created_at"),
    })
}

const QUESTION_COLUMNS: &str = "id, document_id, question_text, question_type, options,
                                correct_answer, difficulty_level, source_chunk, created_at";

#[async_trait]
impl QuestionRepository for PgQuestionRepository {
    async fn insert_batch(&self, questions: Vec<NewQuestion>) -> Result<Vec<Question>> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let mut inserted = Vec::with_capacity(questions.len());

        for question in questions {
            let options = serde_json::to_value(&question.options)
                .map_err(|e| Error::Serialization(e.to_string()))?;

            let query = format!(
                "INSERT INTO questions (id, document_id, question_text, question_type,
                                        options, correct_answer, difficulty_level, source_chunk)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                 RETURNING {}",
                QUESTION_COLUMNS
            );

            let row = sqlx::query(&query)
                .bind(Uuid::now_v7())
                .bind(question.document_id)
                .bind(&question.question_text)
                .bind(question.question_type.to_string())
                .bind(options)
                .bind(&question.correct_answer)
                .bind(question.difficulty_level.to_string())
                .bind(&question.source_chunk)
                .fetch_one(&mut *tx)
                .await
                .map_err(Error::Database)?;

            inserted.push(question_from_row(&row)?);
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(inserted)
    }

    async fn fetch(&self, id: Uuid) -> Result<Question> {
        let query = format!("SELECT {} FROM questions WHERE id = $1", QUESTION_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::QuestionNotFound(id))?;

        question_from_row(&row)
    }

    async fn list_for_document(&self, document_id: Uuid) -> Result<Vec<Question>> {
        let query = format!(
            "SELECT {} FROM questions WHERE document_id = $1 ORDER BY created_at, id",
            QUESTION_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(document_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        rows.iter().map(question_from_row).collect()
    }
}
