//! # studia-ingest
//!
//! Document ingestion for studia: text extraction from uploaded files and
//! chunking of the extracted text for embedding.
//!
//! Extraction shells out to the same battle-tested converters the rest of
//! the document world uses (`pdftotext` for PDF, `pandoc` for DOCX); plain
//! text is handled natively. Chunking offers sentence-packed and
//! sliding-window strategies.

pub mod chunking;
pub mod extract;
pub mod text;

pub use chunking::{Chunk, Chunker, ChunkerConfig, SentenceChunker, SlidingWindowChunker};
pub use extract::{
    DocxAdapter, ExtractionAdapter, ExtractionRegistry, ExtractionResult, PdfTextAdapter,
    PlainTextAdapter,
};
pub use text::{content_preview, word_count};
