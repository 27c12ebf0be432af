//! Document repository implementation.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use studia_core::{
    CreateDocumentRequest, Document, DocumentRepository, Error, FileType, ListDocumentsResponse,
    Result,
};

/// PostgreSQL implementation of DocumentRepository.
#[derive(Clone)]
pub struct PgDocumentRepository {
    pool: Pool<Postgres>,
}

impl PgDocumentRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn document_from_row(row: &sqlx::postgres::PgRow) -> Result<Document> {
    let file_type: String = row.get("file_type");
    Ok(Document {
        id: row.get("id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        file_path: row.get("file_path"),
        file_type: FileType::from_str(&file_type)?,
        content_preview: row.get("content_preview"),
        word_count: row.get("word_count"),
        uploaded_at: row.get("uploaded_at"),
    })
}

#[async_trait]
impl DocumentRepository for PgDocumentRepository {
    async fn insert(&self, req: CreateDocumentRequest) -> Result<Uuid> {
        let id = Uuid::now_v7();

        sqlx::query(
            "INSERT INTO documents (id, user_id, title, file_path, file_type)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(req.user_id)
        .bind(&req.title)
        .bind(&req.file_path)
        .bind(req.file_type.to_string())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(id)
    }

    async fn fetch(&self, id: Uuid) -> Result<Document> {
        let row = sqlx::query(
            "SELECT id, user_id, title, file_path, file_type, content_preview,
                    word_count, uploaded_at
             FROM documents WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?
        .ok_or(Error::DocumentNotFound(id))?;

        document_from_row(&row)
    }

    async fn list(&self, user_id: Uuid, limit: i64, offset: i64) -> Result<ListDocumentsResponse> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;

        let rows = sqlx::query(
            "SELECT id, user_id, title, file_path, file_type, content_preview,
                    word_count, uploaded_at
             FROM documents
             WHERE user_id = $1
             ORDER BY uploaded_at DESC, id DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let documents = rows
            .iter()
            .map(document_from_row)
            .collect::<Result<Vec<_>>>()?;

        Ok(ListDocumentsResponse { documents, total })
    }

    async fn set_extracted(&self, id: Uuid, preview: &str, word_count: i32) -> Result<()> {
        let result = sqlx::query(
            "UPDATE documents SET content_preview = $1, word_count = $2 WHERE id = $3",
        )
        .bind(preview)
        .bind(word_count)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::DocumentNotFound(id));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::DocumentNotFound(id));
        }
        Ok(())
    }

    async fn exists(&self, id: Uuid) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM documents WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(exists)
    }
}
