//! Document summarization with key-point extraction.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, instrument, warn};

use studia_core::defaults::{SUMMARY_MAX_CHUNKS, SUMMARY_MIN_CHUNK_WORDS};
use studia_core::{
    DocumentChunk, Error, GenerationBackend, Result, SummaryLength, SummaryType,
};

/// System instruction for summarization.
const SUMMARY_SYSTEM: &str = "You are a study assistant that writes clear, faithful summaries \
of study material. Do not invent facts.";

/// System instruction for key point extraction.
const KEY_POINTS_SYSTEM: &str = "You extract the most important points from study material. \
You respond with a JSON array of short strings and nothing else.";

/// Build the summarization prompt for a length budget.
pub fn summary_prompt(text: &str, length: SummaryLength) -> String {
    format!(
        "Summarize the following study material in roughly {} words:\n\n{}",
        length.word_budget(),
        text
    )
}

/// Input for one summarization run.
#[derive(Debug, Clone)]
pub struct SummarizeRequest {
    pub length: SummaryLength,
    /// When set, summarize this text instead of the document chunks.
    pub custom_text: Option<String>,
}

/// Word counts before and after summarization.
#[derive(Debug, Clone, Serialize)]
pub struct CompressionStats {
    pub original_words: usize,
    pub summary_words: usize,
    /// summary_words / original_words, zero when the input was empty.
    pub compression_ratio: f64,
}

impl CompressionStats {
    fn compute(original: &str, summary: &str) -> Self {
        let original_words = original.split_whitespace().count();
        let summary_words = summary.split_whitespace().count();
        let compression_ratio = if original_words == 0 {
            0.0
        } else {
            summary_words as f64 / original_words as f64
        };
        Self {
            original_words,
            summary_words,
            compression_ratio,
        }
    }
}

/// A generated summary with key points and compression statistics.
#[derive(Debug, Clone)]
pub struct SummaryOutput {
    pub summary_text: String,
    pub summary_type: SummaryType,
    pub length_setting: SummaryLength,
    pub key_points: Vec<String>,
    pub stats: CompressionStats,
}

/// Summarizes document chunks or caller-supplied text.
pub struct Summarizer {
    generator: Arc<dyn GenerationBackend>,
}

impl Summarizer {
    pub fn new(generator: Arc<dyn GenerationBackend>) -> Self {
        Self { generator }
    }

    /// Summarize a document from its chunks, or from custom text.
    ///
    /// Auto mode takes the first few substantial chunks (at least
    /// `SUMMARY_MIN_CHUNK_WORDS` words each) as source material.
    #[instrument(skip(self, chunks, req), fields(subsystem = "search", component = "summarize", op = "summarize"))]
    pub async fn summarize(
        &self,
        chunks: &[DocumentChunk],
        req: &SummarizeRequest,
    ) -> Result<SummaryOutput> {
        let (source, summary_type) = match &req.custom_text {
            Some(text) if !text.trim().is_empty() => (text.trim().to_string(), SummaryType::Custom),
            Some(_) => {
                return Err(Error::InvalidInput(
                    "Custom text for summarization must not be empty".to_string(),
                ))
            }
            None => (select_source_text(chunks)?, SummaryType::Auto),
        };

        let start = Instant::now();
        let prompt = summary_prompt(&source, req.length);
        let summary_text = self
            .generator
            .generate_with_system(SUMMARY_SYSTEM, &prompt)
            .await?
            .trim()
            .to_string();

        let key_points = self.extract_key_points(&source).await;
        let stats = CompressionStats::compute(&source, &summary_text);

        debug!(
            subsystem = "search",
            component = "summarize",
            op = "summarize",
            original_words = stats.original_words,
            summary_words = stats.summary_words,
            duration_ms = start.elapsed().as_millis() as u64,
            "Generated summary"
        );

        Ok(SummaryOutput {
            summary_text,
            summary_type,
            length_setting: req.length,
            key_points,
            stats,
        })
    }

    /// Ask the model for key points; a malformed response yields an empty
    /// list rather than failing the summary.
    async fn extract_key_points(&self, source: &str) -> Vec<String> {
        let prompt = format!(
            "List the 3 to 5 most important points from this study material as a JSON array \
             of short strings:\n\n{}",
            source
        );

        let response = match self.generator.generate_json(KEY_POINTS_SYSTEM, &prompt).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    subsystem = "search",
                    component = "summarize",
                    error = %e,
                    "Key point extraction failed, continuing without"
                );
                return Vec::new();
            }
        };

        parse_key_points(&response)
    }
}

/// Pick the first substantial chunks as summarization source.
fn select_source_text(chunks: &[DocumentChunk]) -> Result<String> {
    let substantial: Vec<&str> = chunks
        .iter()
        .filter(|c| c.text.split_whitespace().count() >= SUMMARY_MIN_CHUNK_WORDS)
        .take(SUMMARY_MAX_CHUNKS)
        .map(|c| c.text.as_str())
        .collect();

    if substantial.is_empty() {
        return Err(Error::InvalidInput(
            "Document has no chunks substantial enough to summarize".to_string(),
        ));
    }

    Ok(substantial.join("\n\n"))
}

/// Parse a JSON array of strings out of a model response, tolerating
/// code fences and trailing prose.
fn parse_key_points(response: &str) -> Vec<String> {
    let trimmed = response.trim();
    let (Some(start), Some(end)) = (trimmed.find('['), trimmed.rfind(']')) else {
        return Vec::new();
    };
    if end <= start {
        return Vec::new();
    }

    match serde_json::from_str::<Vec<serde_json::Value>>(&trimmed[start..=end]) {
        Ok(values) => values
            .into_iter()
            .filter_map(|v| match v {
                serde_json::Value::String(s) => Some(s.trim().to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Err(_) => Vec::new(),
    }
}
