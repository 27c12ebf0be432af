//! Chunking strategies for splitting extracted text before embedding.
//!
//! Two strategies are provided:
//!
//! - `SentenceChunker` packs whole sentences into chunks up to the size
//!   limit, so embeddings see coherent units of meaning.
//! - `SlidingWindowChunker` emits fixed-size windows with configurable
//!   overlap, for text without usable sentence structure.

use regex::Regex;

use studia_core::defaults::{CHUNK_MIN_SIZE, CHUNK_OVERLAP, CHUNK_SIZE};

/// Configuration shared by all chunking strategies.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Maximum chunk size in bytes.
    pub max_chunk_size: usize,
    /// Chunks shorter than this are merged into their neighbor when possible.
    pub min_chunk_size: usize,
    /// Bytes of overlap between adjacent window chunks.
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: CHUNK_SIZE,
            min_chunk_size: CHUNK_MIN_SIZE,
            overlap: CHUNK_OVERLAP,
        }
    }
}

/// A chunk of document text with its position in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    /// Starting byte offset in the original document.
    pub start_offset: usize,
    /// Ending byte offset in the original document.
    pub end_offset: usize,
}

impl Chunk {
    pub fn new(text: String, start_offset: usize, end_offset: usize) -> Self {
        Self {
            text,
            start_offset,
            end_offset,
        }
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Common trait for chunking strategies.
pub trait Chunker: Send + Sync {
    fn chunk(&self, text: &str) -> Vec<Chunk>;

    fn config(&self) -> &ChunkerConfig;
}

/// Find UTF-8 safe boundary at or before the given position.
fn find_char_boundary_before(text: &str, mut pos: usize) -> usize {
    while pos > 0 && !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

/// Find UTF-8 safe boundary at or after the given position.
fn find_char_boundary_after(text: &str, mut pos: usize) -> usize {
    while pos < text.len() && !text.is_char_boundary(pos) {
        pos += 1;
    }
    pos
}

/// Build one chunk from a run of sentence ranges.
fn join_sentences(text: &str, group: &[(usize, usize)]) -> Chunk {
    let joined = group
        .iter()
        .map(|&(start, end)| text[start..end].trim())
        .collect::<Vec<_>>()
        .join(" ");
    let start = group.first().map_or(0, |&(s, _)| s);
    let end = group.last().map_or(0, |&(_, e)| e);
    Chunk::new(joined, start, end)
}

/// Packs whole sentences into chunks up to the size limit.
///
/// Sentence boundaries are `.`, `!`, `?` followed by whitespace, with
/// guards for common abbreviations and decimal numbers.
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    config: ChunkerConfig,
}

impl SentenceChunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Find sentence boundaries as (start, end) byte ranges.
    fn find_sentences(&self, text: &str) -> Vec<(usize, usize)> {
        let sentence_regex = Regex::new(r"[.!?]+(?:\s+|$)").unwrap();
        let abbrev_regex =
            Regex::new(r"(?i)\b(?:dr|mr|mrs|ms|prof|sr|jr|inc|ltd|co|etc|vs|e\.g|i\.e)\.$")
                .unwrap();

        let mut sentences = Vec::new();
        let mut last_end = 0;

        for mat in sentence_regex.find_iter(text) {
            let end = mat.end();
            let candidate = &text[last_end..end];

            if abbrev_regex.is_match(candidate.trim()) {
                continue;
            }

            // Preceded by a digit, likely a decimal point
            let before_punct = mat.start();
            if before_punct > 0
                && text[..before_punct]
                    .chars()
                    .last()
                    .is_some_and(|c| c.is_ascii_digit())
            {
                continue;
            }

            sentences.push((last_end, end));
            last_end = end;
        }

        if last_end < text.len() && !text[last_end..].trim().is_empty() {
            sentences.push((last_end, text.len()));
        }

        sentences
    }

    /// Split an oversized sentence into size-bounded pieces.
    fn split_long_sentence(&self, sentence: &str, base: usize, out: &mut Vec<Chunk>) {
        let mut offset = 0;
        while offset < sentence.len() {
            let chunk_end = (offset + self.config.max_chunk_size).min(sentence.len());
            let chunk_end = find_char_boundary_before(sentence, chunk_end);

            if chunk_end > offset {
                out.push(Chunk::new(
                    sentence[offset..chunk_end].to_string(),
                    base + offset,
                    base + chunk_end,
                ));
                offset = chunk_end;
            } else {
                break;
            }
        }
    }
}

impl Chunker for SentenceChunker {
    fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.trim().is_empty() {
            return vec![];
        }

        let sentences = self.find_sentences(text);
        let mut chunks = Vec::new();

        // Accumulate sentence ranges until adding the next one would
        // overflow. The ranges behind the most recently pushed chunk are
        // kept for the trailing-runt rebalance below.
        let mut current: Vec<(usize, usize)> = Vec::new();
        let mut current_len = 0;
        let mut last_group: Vec<(usize, usize)> = Vec::new();

        for (start, end) in sentences {
            let sentence = text[start..end].trim();
            if sentence.is_empty() {
                continue;
            }

            if sentence.len() > self.config.max_chunk_size {
                if !current.is_empty() {
                    chunks.push(join_sentences(text, &current));
                    current.clear();
                    current_len = 0;
                }
                self.split_long_sentence(sentence, start, &mut chunks);
                // A split piece ends mid-sentence; never rebalance into it.
                last_group.clear();
                continue;
            }

            if current.is_empty() {
                current.push((start, end));
                current_len = sentence.len();
            } else if current_len + 1 + sentence.len() <= self.config.max_chunk_size {
                current.push((start, end));
                current_len += 1 + sentence.len();
            } else {
                chunks.push(join_sentences(text, &current));
                last_group = std::mem::replace(&mut current, vec![(start, end)]);
                current_len = sentence.len();
            }
        }

        if current.is_empty() {
            return chunks;
        }

        let runt = join_sentences(text, &current);
        if runt.len() >= self.config.min_chunk_size || chunks.is_empty() {
            chunks.push(runt);
            return chunks;
        }

        // The tail is below the minimum. Merge it into the previous chunk
        // when that fits; otherwise move the previous chunk's final
        // sentence into the tail so neither side ends up undersized.
        if let Some(last) = chunks.last_mut() {
            if last.text.len() + 1 + runt.text.len() <= self.config.max_chunk_size {
                last.text.push(' ');
                last.text.push_str(&runt.text);
                last.end_offset = runt.end_offset;
                return chunks;
            }
            if last_group.len() >= 2 {
                let (moved_start, moved_end) = last_group[last_group.len() - 1];
                let moved_len = text[moved_start..moved_end].trim().len();
                if moved_len + 1 + runt.text.len() <= self.config.max_chunk_size {
                    last_group.pop();
                    *last = join_sentences(text, &last_group);
                    let mut tail = vec![(moved_start, moved_end)];
                    tail.extend_from_slice(&current);
                    chunks.push(join_sentences(text, &tail));
                    return chunks;
                }
            }
        }
        chunks.push(runt);
        chunks
    }

    fn config(&self) -> &ChunkerConfig {
        &self.config
    }
}

/// Fixed-size chunks with configurable overlap.
#[derive(Debug, Clone)]
pub struct SlidingWindowChunker {
    config: ChunkerConfig,
}

impl SlidingWindowChunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }
}

impl Chunker for SlidingWindowChunker {
    fn chunk(&self, text: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return vec![];
        }

        if text.len() <= self.config.max_chunk_size {
            return vec![Chunk::new(text.to_string(), 0, text.len())];
        }

        let step_size = if self.config.overlap >= self.config.max_chunk_size {
            1 // Prevent infinite loop
        } else {
            self.config
                .max_chunk_size
                .saturating_sub(self.config.overlap)
                .max(1)
        };

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < text.len() {
            let end = (start + self.config.max_chunk_size).min(text.len());
            let end = find_char_boundary_before(text, end);

            if end > start {
                chunks.push(Chunk::new(text[start..end].to_string(), start, end));
            }

            if end >= text.len() {
                break;
            }

            start += step_size;
            start = find_char_boundary_after(text, start);
        }

        chunks
    }

    fn config(&self) -> &ChunkerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> ChunkerConfig {
        ChunkerConfig {
            max_chunk_size: 100,
            min_chunk_size: 20,
            overlap: 10,
        }
    }

    #[test]
    fn test_sentence_chunker_empty_text() {
        let chunker = SentenceChunker::new(small_config());
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("   \n  ").is_empty());
    }

    #[test]
    fn test_sentence_chunker_single_sentence() {
        let chunker = SentenceChunker::new(small_config());
        let chunks = chunker.chunk("Mitochondria are the powerhouse of the cell.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Mitochondria are the powerhouse of the cell.");
    }

    #[test]
    fn test_sentence_chunker_packs_sentences() {
        let chunker = SentenceChunker::new(small_config());
        let text = "First sentence. Second sentence. Third sentence.";
        let chunks = chunker.chunk(text);
        // All three fit well under 100 bytes, so they pack into one chunk.
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains("First sentence"));
        assert!(chunks[0].text.contains("Third sentence"));
    }

    #[test]
    fn test_sentence_chunker_splits_at_limit() {
        let config = ChunkerConfig {
            max_chunk_size: 40,
            min_chunk_size: 5,
            overlap: 0,
        };
        let chunker = SentenceChunker::new(config);
        let text = "Photosynthesis makes sugar. Respiration burns it. Enzymes catalyze both.";
        let chunks = chunker.chunk(text);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.text.len() <= 40, "chunk too long: {}", chunk.text);
        }
    }

    #[test]
    fn test_sentence_chunker_handles_abbreviations() {
        let chunker = SentenceChunker::new(ChunkerConfig {
            max_chunk_size: 30,
            min_chunk_size: 5,
            overlap: 0,
        });
        let text = "Dr. Smith teaches biology. He is good.";
        let chunks = chunker.chunk(text);
        // "Dr." must not terminate a sentence on its own.
        assert!(chunks[0].text.contains("Dr. Smith teaches biology"));
    }

    #[test]
    fn test_sentence_chunker_handles_decimals() {
        let chunker = SentenceChunker::new(small_config());
        let chunks = chunker.chunk("Pi is roughly 3.14159. It never ends.");
        assert!(chunks[0].text.contains("3.14159"));
    }

    #[test]
    fn test_sentence_chunker_splits_oversized_sentence() {
        let config = ChunkerConfig {
            max_chunk_size: 50,
            min_chunk_size: 10,
            overlap: 0,
        };
        let chunker = SentenceChunker::new(config);
        let text = "word ".repeat(40); // one long run without terminators
        let chunks = chunker.chunk(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.len() <= 50);
        }
    }

    #[test]
    fn test_sentence_chunker_merges_trailing_runt() {
        let config = ChunkerConfig {
            max_chunk_size: 100,
            min_chunk_size: 20,
            overlap: 0,
        };
        let chunker = SentenceChunker::new(config);
        let text = format!("{} Tiny end.", "A medium length sentence goes right here now. ".repeat(2));
        let chunks = chunker.chunk(&text);
        // "Tiny end." is shorter than min_chunk_size; merging it into the
        // previous chunk would overflow, so the previous chunk's final
        // sentence moves over to keep both sides above the minimum.
        assert_eq!(chunks.len(), 2);
        for chunk in &chunks {
            assert!(chunk.text.len() >= 20, "undersized chunk: {}", chunk.text);
            assert!(chunk.text.len() <= 100);
        }
        assert!(chunks.last().unwrap().text.ends_with("Tiny end."));
    }

    #[test]
    fn test_sentence_chunker_rebalances_overflowing_runt() {
        let config = ChunkerConfig {
            max_chunk_size: 100,
            min_chunk_size: 20,
            overlap: 0,
        };
        let chunker = SentenceChunker::new(config);
        // Two sentences pack to just under the limit, so the short tail
        // cannot merge and must borrow the second sentence instead.
        let text = format!(
            "{} {} Tiny end.",
            "This first sentence runs for exactly sixty characters ok yes.",
            "This second one is thirty four ok."
        );
        let chunks = chunker.chunk(&text);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].text.starts_with("This second one"));
        assert!(chunks[1].text.ends_with("Tiny end."));
        assert!(chunks[1].text.len() >= 20);
    }

    #[test]
    fn test_sentence_chunker_emits_runt_when_rebalance_impossible() {
        let config = ChunkerConfig {
            max_chunk_size: 100,
            min_chunk_size: 20,
            overlap: 0,
        };
        let chunker = SentenceChunker::new(config);
        // The previous chunk is a single 99-byte sentence: the tail can
        // neither merge nor borrow a sentence, so it is emitted as-is.
        let long = format!("{}end.", "word ".repeat(19));
        let text = format!("{} Tiny.", long);
        let chunks = chunker.chunk(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].text, "Tiny.");
    }

    #[test]
    fn test_sentence_chunker_utf8_safe() {
        let chunker = SentenceChunker::new(small_config());
        let text = "Hello 世界! This is a test. 日本語の文章。";
        let chunks = chunker.chunk(text);
        for chunk in &chunks {
            assert!(std::str::from_utf8(chunk.text.as_bytes()).is_ok());
        }
    }

    #[test]
    fn test_sentence_chunker_no_punctuation() {
        let chunker = SentenceChunker::new(small_config());
        let chunks = chunker.chunk("text without any terminator at all");
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_sliding_window_empty_text() {
        let chunker = SlidingWindowChunker::new(small_config());
        assert!(chunker.chunk("").is_empty());
    }

    #[test]
    fn test_sliding_window_short_text() {
        let chunker = SlidingWindowChunker::new(small_config());
        let chunks = chunker.chunk("Short text.");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_offset, 0);
        assert_eq!(chunks[0].end_offset, 11);
    }

    #[test]
    fn test_sliding_window_overlap() {
        let config = ChunkerConfig {
            max_chunk_size: 10,
            min_chunk_size: 5,
            overlap: 3,
        };
        let chunker = SlidingWindowChunker::new(config);
        let text = "0123456789ABCDEFGHIJ";
        let chunks = chunker.chunk(text);
        assert!(chunks.len() >= 2);
        // Adjacent chunks share the overlap region.
        assert_eq!(&chunks[0].text[7..], &chunks[1].text[..3]);
    }

    #[test]
    fn test_sliding_window_no_overlap_is_contiguous() {
        let config = ChunkerConfig {
            max_chunk_size: 10,
            min_chunk_size: 5,
            overlap: 0,
        };
        let chunker = SlidingWindowChunker::new(config);
        let chunks = chunker.chunk("0123456789ABCDEFGHIJ");
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].end_offset, chunks[1].start_offset);
    }

    #[test]
    fn test_sliding_window_full_overlap_terminates() {
        let config = ChunkerConfig {
            max_chunk_size: 10,
            min_chunk_size: 5,
            overlap: 10,
        };
        let chunker = SlidingWindowChunker::new(config);
        let chunks = chunker.chunk("0123456789ABCDEFGHIJ");
        assert!(!chunks.is_empty());
    }

    #[test]
    fn test_sliding_window_utf8_boundaries() {
        let config = ChunkerConfig {
            max_chunk_size: 20,
            min_chunk_size: 5,
            overlap: 5,
        };
        let chunker = SlidingWindowChunker::new(config);
        let text = "Hello 世界! 你好世界! Привет мир!";
        let chunks = chunker.chunk(text);
        for chunk in &chunks {
            assert!(text.is_char_boundary(chunk.start_offset));
            assert!(text.is_char_boundary(chunk.end_offset));
            assert_eq!(&text[chunk.start_offset..chunk.end_offset], chunk.text);
        }
    }

    #[test]
    fn test_default_config_uses_shared_defaults() {
        let config = ChunkerConfig::default();
        assert_eq!(config.max_chunk_size, CHUNK_SIZE);
        assert_eq!(config.min_chunk_size, CHUNK_MIN_SIZE);
        assert_eq!(config.overlap, CHUNK_OVERLAP);
    }
}
