//! Grounded question answering over retrieved chunks.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use studia_core::defaults::{CONTEXT_CHAR_BUDGET, LOW_CONFIDENCE_THRESHOLD};
use studia_core::{ChunkHit, GenerationBackend, Result};

use crate::retriever::{assemble_context, Retriever};

/// System instruction for grounded answering.
const QA_SYSTEM: &str = "You are a study assistant. Answer the student's question using ONLY \
the provided study material. If the material does not contain the answer, say you do not \
have enough information. Be concise and factual.";

/// Build the user prompt for a grounded answer.
fn qa_prompt(context: &str, question: &str) -> String {
    format!(
        "Study material:\n{}\n\nQuestion: {}\n\nAnswer based only on the study material above.",
        context, question
    )
}

/// A generated answer with its supporting evidence.
#[derive(Debug, Clone, Serialize)]
pub struct GroundedAnswer {
    pub answer: String,
    /// Mean similarity of the chunks used as context, in [0, 1].
    pub confidence: f32,
    /// Set when confidence falls below the low-confidence threshold.
    pub low_confidence: bool,
    /// The chunks that backed the answer, in rank order.
    pub sources: Vec<ChunkHit>,
}

/// Answers questions from retrieved document chunks.
pub struct AnswerGenerator {
    retriever: Retriever,
    generator: Arc<dyn GenerationBackend>,
    context_budget: usize,
}

impl AnswerGenerator {
    pub fn new(retriever: Retriever, generator: Arc<dyn GenerationBackend>) -> Self {
        Self {
            retriever,
            generator,
            context_budget: CONTEXT_CHAR_BUDGET,
        }
    }

    /// Override the context character budget.
    pub fn with_context_budget(mut self, budget: usize) -> Self {
        self.context_budget = budget;
        self
    }

    /// Retrieve context and generate a grounded answer.
    #[instrument(skip(self, question), fields(subsystem = "search", component = "answer", op = "ask"))]
    pub async fn ask(
        &self,
        question: &str,
        top_k: usize,
        document_id: Option<Uuid>,
    ) -> Result<GroundedAnswer> {
        let start = Instant::now();
        let hits = self.retriever.retrieve(question, top_k, document_id).await?;

        if hits.is_empty() {
            return Ok(GroundedAnswer {
                answer: "I don't have enough information in the uploaded material to answer \
                         that question."
                    .to_string(),
                confidence: 0.0,
                low_confidence: true,
                sources: vec![],
            });
        }

        let context = assemble_context(&hits, self.context_budget);
        let confidence = mean_score(&context.used);
        let low_confidence = confidence < LOW_CONFIDENCE_THRESHOLD;

        if low_confidence {
            warn!(
                subsystem = "search",
                component = "answer",
                confidence,
                "Low retrieval confidence, answer may be ungrounded"
            );
        }

        let prompt = qa_prompt(&context.text, question.trim());
        let answer = self
            .generator
            .generate_with_system(QA_SYSTEM, &prompt)
            .await?;

        debug!(
            subsystem = "search",
            component = "answer",
            op = "ask",
            result_count = context.used.len(),
            confidence,
            duration_ms = start.elapsed().as_millis() as u64,
            "Generated grounded answer"
        );

        Ok(GroundedAnswer {
            answer: answer.trim().to_string(),
            confidence,
            low_confidence,
            sources: context.used,
        })
    }
}

/// Mean hit score clamped into [0, 1]. Zero for an empty slice.
fn mean_score(hits: &[ChunkHit]) -> f32 {
    if hits.is_empty() {
        return 0.0;
    }
    let sum: f32 = hits.iter().map(|h| h.score).sum();
    (sum / hits.len() as f32).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pgvector::Vector;
    use studia_core::{ChunkRepository, DocumentChunk};
    use studia_inference::MockBackend;

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

    fn hit(text: &str, score: f32) -> ChunkHit {
        ChunkHit {
            chunk_id: Uuid::now_v7(),
            document_id: Uuid::now_v7(),
            chunk_index: 0,
            text: text.to_string(),
            score,
        }
    }

    fn generator_for(hits: Vec<ChunkHit>, backend: MockBackend) -> AnswerGenerator {
        let retriever = Retriever::new(Arc::new(FixedChunks { hits }), Arc::new(backend.clone()));
        AnswerGenerator::new(retriever, Arc::new(backend))
    }

    #[tokio::test]
    async fn test_ask_returns_answer_with_sources() {
        let backend =
            MockBackend::new().with_fixed_response("Photosynthesis converts light to sugar.");
        let gen = generator_for(
            vec![hit("Plants use light to make sugar.", 0.8)],
            backend,
        );

        let answer = gen.ask("What is photosynthesis?", 4, None).await.unwrap();
        assert_eq!(answer.answer, "Photosynthesis converts light to sugar.");
        assert_eq!(answer.sources.len(), 1);
        assert!(!answer.low_confidence);
        assert!((answer.confidence - 0.8).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_ask_without_hits_declines() {
        let gen = generator_for(vec![], MockBackend::new());
        let answer = gen.ask("Anything?", 4, None).await.unwrap();
        assert!(answer.answer.contains("enough information"));
        assert_eq!(answer.confidence, 0.0);
        assert!(answer.low_confidence);
        assert!(answer.sources.is_empty());
    }

    #[tokio::test]
    async fn test_ask_flags_low_confidence() {
        let gen = generator_for(
            vec![hit("barely related text", 0.1)],
            MockBackend::new(),
        );
        let answer = gen.ask("Unrelated question?", 4, None).await.unwrap();
        assert!(answer.low_confidence);
    }

    #[tokio::test]
    async fn test_ask_prompt_carries_context_and_question() {
        let backend = MockBackend::new();
        let gen = generator_for(vec![hit("Mitochondria make ATP.", 0.9)], backend.clone());
        gen.ask("What makes ATP?", 4, None).await.unwrap();

        let calls = backend.calls();
        let prompt = &calls.iter().find(|c| c.operation == "generate").unwrap().input;
        assert!(prompt.contains("Mitochondria make ATP."));
        assert!(prompt.contains("What makes ATP?"));
    }

    #[test]
    fn test_mean_score() {
        assert_eq!(mean_score(&[]), 0.0);
        let hits = vec![hit("a", 0.4), hit("b", 0.6)];
        assert!((mean_score(&hits) - 0.5).abs() < 1e-6);
    }
}
