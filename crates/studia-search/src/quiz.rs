//! Quiz question generation from document chunks.
//!
//! The generation model is asked for a JSON array of questions; the
//! response is parsed defensively and malformed entries are dropped
//! rather than failing the batch.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use rand::seq::SliceRandom;
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use studia_core::defaults::{QUIZ_MAX_QUESTIONS, QUIZ_NUM_QUESTIONS};
use studia_core::{
    DifficultyLevel, DocumentChunk, Error, GenerationBackend, NewQuestion, QuestionType, Result,
};

/// Chunks with fewer words than this are too thin to source a question.
const MIN_SOURCE_WORDS: usize = 10;

/// System instruction for quiz generation.
const QUIZ_SYSTEM: &str = "You are a quiz writer for students. You produce strictly valid JSON \
and nothing else.";

/// Parameters for one quiz generation run.
#[derive(Debug, Clone)]
pub struct QuizRequest {
    pub num_questions: usize,
    pub difficulty: DifficultyLevel,
    pub question_type: QuestionType,
}

impl Default for QuizRequest {
    fn default() -> Self {
        Self {
            num_questions: QUIZ_NUM_QUESTIONS,
            difficulty: DifficultyLevel::default(),
            question_type: QuestionType::default(),
        }
    }
}

/// Build the generation prompt for a batch of questions.
pub fn quiz_prompt(context: &str, req: &QuizRequest) -> String {
    let type_instruction = match req.question_type {
        QuestionType::Mcq => {
            "Each question must have exactly 4 answer options, one of them correct."
        }
        QuestionType::TrueFalse => {
            "Each question is a statement; options must be [\"True\", \"False\"]."
        }
        QuestionType::ShortAnswer => {
            "Each question expects a short free-text answer; options must be an empty array."
        }
    };

    format!(
        "Write {} {} quiz questions of type \"{}\" from this study material:\n\n{}\n\n{}\n\n\
         Respond with a JSON array only. Each element: {{\"question\": \"...\", \
         \"options\": [...], \"correct_answer\": \"...\"}}.",
        req.num_questions, req.difficulty, req.question_type, context, type_instruction
    )
}

/// One entry of the model's JSON response, before validation.
#[derive(Debug, Deserialize)]
struct RawQuestion {
    question: Option<String>,
    #[serde(default)]
    options: Vec<serde_json::Value>,
    correct_answer: Option<String>,
    #[serde(rename = "type")]
    question_type: Option<String>,
    difficulty: Option<String>,
}

/// Strip Markdown code fences and locate the outermost JSON array.
fn extract_json_array(response: &str) -> Option<&str> {
    let trimmed = response.trim();
    let start = trimmed.find('[')?;
    let end = trimmed.rfind(']')?;
    if end > start {
        Some(&trimmed[start..=end])
    } else {
        None
    }
}

/// Parse a model response into validated questions.
///
/// Malformed entries (missing text or answer, unusable options) are
/// skipped with a warning. Returns an error only when the response holds
/// no JSON array at all.
pub fn parse_questions(
    response: &str,
    document_id: Uuid,
    req: &QuizRequest,
    source_chunk: Option<&str>,
) -> Result<Vec<NewQuestion>> {
    let payload = extract_json_array(response).ok_or_else(|| {
        Error::Serialization("Quiz response contains no JSON array".to_string())
    })?;

    let raw: Vec<RawQuestion> = serde_json::from_str(payload)
        .map_err(|e| Error::Serialization(format!("Quiz response is not valid JSON: {}", e)))?;

    let mut accepted = Vec::new();
    for (index, entry) in raw.into_iter().enumerate() {
        match validate_entry(entry, document_id, req, source_chunk) {
            Some(question) => accepted.push(question),
            None => {
                warn!(
                    subsystem = "search",
                    component = "quiz",
                    entry = index,
                    "Dropping malformed quiz entry"
                );
            }
        }
    }

    Ok(accepted)
}

fn validate_entry(
    entry: RawQuestion,
    document_id: Uuid,
    req: &QuizRequest,
    source_chunk: Option<&str>,
) -> Option<NewQuestion> {
    let question_text = entry.question?.trim().to_string();
    let mut correct_answer = entry.correct_answer?.trim().to_string();
    if question_text.is_empty() || correct_answer.is_empty() {
        return None;
    }

    let question_type = entry
        .question_type
        .as_deref()
        .and_then(|s| QuestionType::from_str(s).ok())
        .unwrap_or(req.question_type);

    let difficulty_level = entry
        .difficulty
        .as_deref()
        .and_then(|s| DifficultyLevel::from_str(s).ok())
        .unwrap_or(req.difficulty);

    let mut options: Vec<String> = entry
        .options
        .into_iter()
        .filter_map(|v| match v {
            serde_json::Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    match question_type {
        QuestionType::Mcq => {
            if options.len() < 2 {
                return None;
            }
            // The key must be answerable from the shown options.
            if !options.iter().any(|o| o == &correct_answer) {
                options.push(correct_answer.clone());
            }
        }
        QuestionType::TrueFalse => {
            options = vec!["True".to_string(), "False".to_string()];
            // Canonicalize the key to the shown option so exact-match
            // grading accepts the displayed answer.
            match options.iter().find(|o| o.eq_ignore_ascii_case(&correct_answer)) {
                Some(canonical) => correct_answer = canonical.clone(),
                None => return None,
            }
        }
        QuestionType::ShortAnswer => {
            options = Vec::new();
        }
    }

    Some(NewQuestion {
        document_id,
        question_text,
        question_type,
        options,
        correct_answer,
        difficulty_level,
        source_chunk: source_chunk.map(str::to_string),
    })
}

/// Generates quiz questions from a document's chunks.
pub struct QuizGenerator {
    generator: Arc<dyn GenerationBackend>,
}

impl QuizGenerator {
    pub fn new(generator: Arc<dyn GenerationBackend>) -> Self {
        Self { generator }
    }

    /// Generate questions from the given chunks.
    ///
    /// Substantial chunks are sampled at random as source material; the
    /// model response is parsed defensively.
    #[instrument(skip(self, chunks), fields(subsystem = "search", component = "quiz", op = "generate"))]
    pub async fn generate(
        &self,
        document_id: Uuid,
        chunks: &[DocumentChunk],
        req: &QuizRequest,
    ) -> Result<Vec<NewQuestion>> {
        let req = QuizRequest {
            num_questions: req.num_questions.clamp(1, QUIZ_MAX_QUESTIONS),
            ..req.clone()
        };

        let mut substantial: Vec<&DocumentChunk> = chunks
            .iter()
            .filter(|c| c.text.split_whitespace().count() >= MIN_SOURCE_WORDS)
            .collect();
        if substantial.is_empty() {
            return Err(Error::InvalidInput(
                "Document has no chunks substantial enough for quiz generation".to_string(),
            ));
        }

        let start = Instant::now();
        substantial.shuffle(&mut rand::thread_rng());
        let sample: Vec<&str> = substantial
            .iter()
            .take(req.num_questions.max(3))
            .map(|c| c.text.as_str())
            .collect();
        let context = sample.join("\n\n");
        let source_chunk = sample.first().copied();

        let prompt = quiz_prompt(&context, &req);
        let response = self.generator.generate_json(QUIZ_SYSTEM, &prompt).await?;
        let questions = parse_questions(&response, document_id, &req, source_chunk)?;

        debug!(
            subsystem = "search",
            component = "quiz",
            op = "generate",
            result_count = questions.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Generated quiz questions"
        );

        Ok(questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgvector::Vector;
    use studia_inference::MockBackend;

    fn chunk(text: &str, index: i32) -> DocumentChunk {
        DocumentChunk {
            id: Uuid::now_v7(),
            document_id: Uuid::now_v7(),
            chunk_index: index,
            text: text.to_string(),
            vector: Vector::from(vec![0.0; 4]),
            model: "mock-embed".to_string(),
        }
    }

    #[test]
    fn test_quiz_prompt_mentions_parameters() {
        let req = QuizRequest {
            num_questions: 3,
            difficulty: DifficultyLevel::Hard,
            question_type: QuestionType::Mcq,
        };
        let prompt = quiz_prompt("Cells divide by mitosis.", &req);
        assert!(prompt.contains("3 hard"));
        assert!(prompt.contains("mcq"));
        assert!(prompt.contains("Cells divide by mitosis."));
    }

    #[test]
    fn test_parse_valid_mcq_batch() {
        let response = r#"[
            {"question": "What makes ATP?", "options": ["Nucleus", "Mitochondria", "Golgi", "Ribosome"], "correct_answer": "Mitochondria"},
            {"question": "Where is DNA stored?", "options": ["Nucleus", "Cytoplasm", "Membrane", "Vacuole"], "correct_answer": "Nucleus"}
        ]"#;
        let req = QuizRequest::default();
        let questions = parse_questions(response, Uuid::now_v7(), &req, Some("src")).unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].correct_answer, "Mitochondria");
        assert_eq!(questions[0].source_chunk.as_deref(), Some("src"));
    }

    #[test]
    fn test_parse_strips_code_fences() {
        let response = "```json\n[{\"question\": \"Q?\", \"options\": [\"A\", \"B\"], \"correct_answer\": \"A\"}]\n```";
        let questions =
            parse_questions(response, Uuid::now_v7(), &QuizRequest::default(), None).unwrap();
        assert_eq!(questions.len(), 1);
    }

    #[test]
    fn test_parse_drops_malformed_entries() {
        let response = r#"[
            {"question": "Good?", "options": ["A", "B"], "correct_answer": "A"},
            {"question": "", "options": ["A", "B"], "correct_answer": "A"},
            {"options": ["A", "B"], "correct_answer": "A"},
            {"question": "No answer?", "options": ["A", "B"]},
            {"question": "One option?", "options": ["A"], "correct_answer": "A"}
        ]"#;
        let questions =
            parse_questions(response, Uuid::now_v7(), &QuizRequest::default(), None).unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].question_text, "Good?");
    }

    #[test]
    fn test_parse_adds_missing_correct_option() {
        let response =
            r#"[{"question": "Q?", "options": ["A", "B"], "correct_answer": "C"}]"#;
        let questions =
            parse_questions(response, Uuid::now_v7(), &QuizRequest::default(), None).unwrap();
        assert!(questions[0].options.contains(&"C".to_string()));
    }

    #[test]
    fn test_parse_true_false_normalizes_options() {
        let response = r#"[{"question": "The cell wall is rigid.", "type": "true_false", "options": [], "correct_answer": "True"}]"#;
        let req = QuizRequest {
            question_type: QuestionType::TrueFalse,
            ..Default::default()
        };
        let questions = parse_questions(response, Uuid::now_v7(), &req, None).unwrap();
        assert_eq!(questions[0].options, vec!["True", "False"]);
    }

    #[test]
    fn test_parse_true_false_canonicalizes_answer_casing() {
        let response = r#"[
            {"question": "Mitosis produces two cells.", "type": "true_false", "options": ["true", "false"], "correct_answer": "true"},
            {"question": "DNA is a protein.", "type": "true_false", "options": [], "correct_answer": "FALSE"}
        ]"#;
        let req = QuizRequest {
            question_type: QuestionType::TrueFalse,
            ..Default::default()
        };
        let questions = parse_questions(response, Uuid::now_v7(), &req, None).unwrap();
        // The stored key must be one of the shown options, exactly.
        assert_eq!(questions[0].correct_answer, "True");
        assert_eq!(questions[1].correct_answer, "False");
        for q in &questions {
            assert!(q.options.contains(&q.correct_answer));
        }
    }

    #[test]
    fn test_parse_true_false_rejects_unanswerable_key() {
        let response = r#"[{"question": "Water boils at 100C.", "type": "true_false", "options": [], "correct_answer": "Maybe"}]"#;
        let req = QuizRequest {
            question_type: QuestionType::TrueFalse,
            ..Default::default()
        };
        let questions = parse_questions(response, Uuid::now_v7(), &req, None).unwrap();
        assert!(questions.is_empty());
    }

    #[test]
    fn test_parse_no_array_is_error() {
        let err =
            parse_questions("sorry, I cannot", Uuid::now_v7(), &QuizRequest::default(), None)
                .unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_parse_entry_difficulty_override() {
        let response = r#"[{"question": "Q?", "options": ["A", "B"], "correct_answer": "A", "difficulty": "hard"}]"#;
        let questions =
            parse_questions(response, Uuid::now_v7(), &QuizRequest::default(), None).unwrap();
        assert_eq!(questions[0].difficulty_level, DifficultyLevel::Hard);
    }

    #[tokio::test]
    async fn test_generate_end_to_end_with_mock() {
        let backend = MockBackend::new().with_fixed_response(
            r#"[{"question": "What do plants make?", "options": ["Sugar", "Salt", "Iron", "Gold"], "correct_answer": "Sugar"}]"#,
        );
        let gen = QuizGenerator::new(Arc::new(backend));
        let chunks = vec![chunk(
            "Plants use sunlight water and carbon dioxide to make sugar during photosynthesis.",
            0,
        )];

        let questions = gen
            .generate(Uuid::now_v7(), &chunks, &QuizRequest::default())
            .await
            .unwrap();
        assert_eq!(questions.len(), 1);
        assert!(questions[0].source_chunk.is_some());
    }

    #[tokio::test]
    async fn test_generate_rejects_thin_chunks() {
        let gen = QuizGenerator::new(Arc::new(MockBackend::new()));
        let chunks = vec![chunk("too short", 0)];
        let err = gen
            .generate(Uuid::now_v7(), &chunks, &QuizRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
