//! Question embedding and nearest-chunk retrieval.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument};
use uuid::Uuid;

use studia_core::defaults::{CONTEXT_CHAR_BUDGET, RETRIEVE_TOP_K};
use studia_core::{ChunkHit, ChunkRepository, EmbeddingBackend, Error, Result};

/// Retrieves the chunks most relevant to a question.
///
/// Embeds the question with the configured backend and runs a cosine
/// nearest-neighbor query over the chunk index.
pub struct Retriever {
    chunks: Arc<dyn ChunkRepository>,
    embedder: Arc<dyn EmbeddingBackend>,
}

impl Retriever {
    pub fn new(chunks: Arc<dyn ChunkRepository>, embedder: Arc<dyn EmbeddingBackend>) -> Self {
        Self { chunks, embedder }
    }

    /// Retrieve the `top_k` nearest chunks, optionally scoped to one document.
    #[instrument(skip(self, question), fields(subsystem = "search", component = "retriever", op = "retrieve"))]
    pub async fn retrieve(
        &self,
        question: &str,
        top_k: usize,
        document_id: Option<Uuid>,
    ) -> Result<Vec<ChunkHit>> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidInput("Question must not be empty".to_string()));
        }
        let top_k = if top_k == 0 { RETRIEVE_TOP_K } else { top_k };

        let start = Instant::now();
        let vectors = self.embedder.embed_texts(&[question.to_string()]).await?;
        let query_vec = vectors
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("Backend returned no vector for query".to_string()))?;

        let hits = self
            .chunks
            .find_similar(&query_vec, top_k as i64, document_id)
            .await?;

        debug!(
            subsystem = "search",
            component = "retriever",
            op = "retrieve",
            result_count = hits.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Retrieved nearest chunks"
        );

        Ok(hits)
    }
}

/// Context assembled from retrieved chunks, bounded by a character budget.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    /// The concatenated chunk texts fed to the generation model.
    pub text: String,
    /// The hits that made it into the context, in rank order.
    pub used: Vec<ChunkHit>,
}

/// Join chunk texts in rank order until the character budget is spent.
///
/// A chunk that would overflow the budget is skipped, not truncated, so
/// the model never sees a cut-off sentence. At least the best chunk is
/// always included, truncated at a char boundary if it alone overflows.
pub fn assemble_context(hits: &[ChunkHit], char_budget: usize) -> AssembledContext {
    let budget = if char_budget == 0 {
        CONTEXT_CHAR_BUDGET
    } else {
        char_budget
    };

    let mut text = String::new();
    let mut used = Vec::new();

    for hit in hits {
        let chunk_text = hit.text.trim();
        if chunk_text.is_empty() {
            continue;
        }

        let separator_len = if text.is_empty() { 0 } else { 2 };
        if text.len() + separator_len + chunk_text.len() <= budget {
            if !text.is_empty() {
                text.push_str("\n\n");
            }
            text.push_str(chunk_text);
            used.push(hit.clone());
        } else if used.is_empty() {
            // Best chunk alone exceeds the budget: truncate it.
            let mut cut = budget.min(chunk_text.len());
            while cut > 0 && !chunk_text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.push_str(&chunk_text[..cut]);
            used.push(hit.clone());
            break;
        }
    }

    AssembledContext { text, used }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pgvector::Vector;
    use studia_core::DocumentChunk;
    use studia_inference::MockBackend;

    fn hit(text: &str, score: f32) -> ChunkHit {
        ChunkHit {
            chunk_id: Uuid::now_v7(),
            document_id: Uuid::now_v7(),
            chunk_index: 0,
            text: text.to_string(),
            score,
        }
    }

    struct FixedChunks {
        hits: Vec<ChunkHit>,
    }

    #[async_trait]
    impl ChunkRepository for FixedChunks {
        async fn store(
            &self,
            _document_id: Uuid,
            _chunks: Vec<(String, Vector)>,
            _model: &str,
        ) -> Result<()> {
            Ok(())
        }

        async fn get_for_document(&self, _document_id: Uuid) -> Result<Vec<DocumentChunk>> {
            Ok(vec![])
        }

        async fn delete_for_document(&self, _document_id: Uuid) -> Result<()> {
            Ok(())
        }

        async fn find_similar(
            &self,
            _query_vec: &Vector,
            limit: i64,
            _document_id: Option<Uuid>,
        ) -> Result<Vec<ChunkHit>> {
            Ok(self.hits.iter().take(limit as usize).cloned().collect())
        }
    }

    #[tokio::test]
    async fn test_retrieve_embeds_question_and_returns_hits() {
        let chunks = Arc::new(FixedChunks {
            hits: vec![hit("photosynthesis chunk", 0.9), hit("respiration chunk", 0.5)],
        });
        let embedder = Arc::new(MockBackend::new());
        let retriever = Retriever::new(chunks, embedder.clone());

        let hits = retriever
            .retrieve("What is photosynthesis?", 2, None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(embedder.call_count("embed"), 1);
    }

    #[tokio::test]
    async fn test_retrieve_rejects_empty_question() {
        let chunks = Arc::new(FixedChunks { hits: vec![] });
        let retriever = Retriever::new(chunks, Arc::new(MockBackend::new()));
        let err = retriever.retrieve("   ", 4, None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_retrieve_zero_top_k_uses_default() {
        let many: Vec<ChunkHit> = (0..10).map(|i| hit(&format!("chunk {}", i), 0.5)).collect();
        let chunks = Arc::new(FixedChunks { hits: many });
        let retriever = Retriever::new(chunks, Arc::new(MockBackend::new()));
        let hits = retriever.retrieve("question", 0, None).await.unwrap();
        assert_eq!(hits.len(), RETRIEVE_TOP_K);
    }

    #[test]
    fn test_assemble_context_within_budget() {
        let hits = vec![hit("First chunk.", 0.9), hit("Second chunk.", 0.8)];
        let ctx = assemble_context(&hits, 100);
        assert_eq!(ctx.text, "First chunk.\n\nSecond chunk.");
        assert_eq!(ctx.used.len(), 2);
    }

    #[test]
    fn test_assemble_context_skips_overflowing_chunk() {
        let hits = vec![
            hit("Short first.", 0.9),
            hit(&"x".repeat(200), 0.8),
            hit("Short third.", 0.7),
        ];
        let ctx = assemble_context(&hits, 60);
        assert!(ctx.text.contains("Short first."));
        assert!(ctx.text.contains("Short third."));
        assert_eq!(ctx.used.len(), 2);
    }

    #[test]
    fn test_assemble_context_truncates_lone_oversized_chunk() {
        let hits = vec![hit(&"y".repeat(500), 0.9)];
        let ctx = assemble_context(&hits, 50);
        assert_eq!(ctx.text.len(), 50);
        assert_eq!(ctx.used.len(), 1);
    }

    #[test]
    fn test_assemble_context_empty_hits() {
        let ctx = assemble_context(&[], 100);
        assert!(ctx.text.is_empty());
        assert!(ctx.used.is_empty());
    }
}
