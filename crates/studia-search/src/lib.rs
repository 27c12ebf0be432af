//! # studia-search
//!
//! The retrieval-augmented layer of studia: embed a question, find the
//! nearest document chunks with pgvector, assemble a bounded context, and
//! drive the generation model for grounded answers, quiz questions, and
//! summaries.

pub mod answer;
pub mod quiz;
pub mod retriever;
pub mod summarize;

pub use answer::{AnswerGenerator, GroundedAnswer};
pub use quiz::{parse_questions, quiz_prompt, QuizGenerator, QuizRequest};
pub use retriever::{assemble_context, AssembledContext, Retriever};
pub use summarize::{
    summary_prompt, CompressionStats, SummarizeRequest, Summarizer, SummaryOutput,
};
