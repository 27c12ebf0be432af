//! Summary repository implementation.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use studia_core::{
    Error, NewSummary, Result, Summary, SummaryLength, SummaryRepository, SummaryType,
};

/// PostgreSQL implementation of SummaryRepository.
#[derive(Clone)]
pub struct PgSummaryRepository {
    pool: Pool<Postgres>,
}

impl PgSummaryRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn summary_from_row(row: &sqlx::postgres::PgRow) -> Result<Summary> {
    let summary_type: String = row.get("summary_type");
    let length_setting: String = row.get("length_setting");
    let key_points: serde_json::Value = row.get("key_points");
    let key_points: Vec<String> = serde_json::from_value(key_points)
        .map_err(|e| Error::Serialization(format!("Invalid key_points payload: {}", e)))?;

    Ok(Summary {
        id: row.get("id"),
        document_id: row.get("document_id"),
        summary_text: row.get("summary_text"),
        summary_type: SummaryType::from_str(&summary_type)?,
        length_setting: SummaryLength::from_str(&length_setting)?,
        key_points,
        created_at: row.get("created_at"),
    })
}

const SUMMARY_COLUMNS: &str = "id, document_id, summary_text, summary_type,
                               length_setting, key_points, created_at";

#[async_trait]
impl SummaryRepository for PgSummaryRepository {
    async fn insert(&self, req: NewSummary) -> Result<Summary> {
        let key_points = serde_json::to_value(&req.key_points)
            .map_err(|e| Error::Serialization(e.to_string()))?;

        let query = format!(
            "INSERT INTO summaries
                 (id, document_id, summary_text, summary_type, length_setting, key_points)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {}",
            SUMMARY_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(Uuid::now_v7())
            .bind(req.document_id)
            .bind(&req.summary_text)
            .bind(req.summary_type.to_string())
            .bind(req.length_setting.to_string())
            .bind(key_points)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;

        summary_from_row(&row)
    }

    async fn fetch(&self, id: Uuid) -> Result<Summary> {
        let query = format!("SELECT {} FROM summaries WHERE id = $1", SUMMARY_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or_else(|| Error::NotFound(format!("Summary {} not found", id)))?;

        summary_from_row(&row)
    }

    async fn list_for_document(&self, document_id: Uuid) -> Result<Vec<Summary>> {
        let query = format!(
            "SELECT {} FROM summaries
             WHERE document_id = $1
             ORDER BY created_at DESC, id DESC",
            SUMMARY_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(document_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        rows.iter().map(summary_from_row).collect()
    }
}
