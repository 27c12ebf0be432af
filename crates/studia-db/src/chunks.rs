//! Embedding index repository implementation.

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use studia_core::{ChunkHit, ChunkRepository, DocumentChunk, Error, Result};

/// PostgreSQL implementation of ChunkRepository backed by pgvector.
#[derive(Clone)]
pub struct PgChunkRepository {
    pool: Pool<Postgres>,
}

impl PgChunkRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChunkRepository for PgChunkRepository {
    async fn store(
        &self,
        document_id: Uuid,
        chunks: Vec<(String, Vector)>,
        model: &str,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Re-indexing replaces the whole set for the document.
        sqlx::query("DELETE FROM document_chunk WHERE document_id = $1")
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        for (index, (text, vector)) in chunks.into_iter().enumerate() {
            sqlx::query(
                "INSERT INTO document_chunk (id, document_id, chunk_index, text, vector, model)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(Uuid::now_v7())
            .bind(document_id)
            .bind(index as i32)
            .bind(&text)
            .bind(&vector)
            .bind(model)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn get_for_document(&self, document_id: Uuid) -> Result<Vec<DocumentChunk>> {
        let rows = sqlx::query(
            "SELECT id, document_id, chunk_index, text, vector, model
             FROM document_chunk
             WHERE document_id = $1
             ORDER BY chunk_index",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let chunks = rows
            .into_iter()
            .map(|row| DocumentChunk {
                id: row.get("id"),
                document_id: row.get("document_id"),
                chunk_index: row.get("chunk_index"),
                text: row.get("text"),
                vector: row.get("vector"),
                model: row.get("model"),
            })
            .collect();

        Ok(chunks)
    }

    async fn delete_for_document(&self, document_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM document_chunk WHERE document_id = $1")
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn find_similar(
        &self,
        query_vec: &Vector,
        limit: i64,
        document_id: Option<Uuid>,
    ) -> Result<Vec<ChunkHit>> {
        // Cosine distance; score = 1 - distance. Ties resolve by chunk id.
        let scope_clause = if document_id.is_some() {
            "WHERE c.document_id = $3"
        } else {
            ""
        };

        let query = format!(
            r#"
            SELECT c.id, c.document_id, c.chunk_index, c.text,
                   1.0 - (c.vector <=> $1::vector) AS score
            FROM document_chunk c
            {}
            ORDER BY c.vector <=> $1::vector, c.id
            LIMIT $2
            "#,
            scope_clause
        );

        let mut q = sqlx::query(&query).bind(query_vec).bind(limit);
        if let Some(doc_id) = document_id {
            q = q.bind(doc_id);
        }

        let rows = q.fetch_all(&self.pool).await.map_err(Error::Database)?;

        let hits = rows
            .into_iter()
            .map(|row| {
                let score: f64 = row.get("score");
                ChunkHit {
                    chunk_id: row.get("id"),
                    document_id: row.get("document_id"),
                    chunk_index: row.get("chunk_index"),
                    text: row.get("text"),
                    score: score as f32,
                }
            })
            .collect();

        Ok(hits)
    }
}
