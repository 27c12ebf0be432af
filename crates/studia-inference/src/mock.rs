//! Deterministic mock inference backend for testing.
//!
//! Implements the studia-core backend traits so the retrieval, quiz, and
//! summarization layers can be exercised without a live model server.
//! Embeddings are derived from character content, so identical texts always
//! embed identically and related texts land near each other.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use studia_core::{
    EmbeddingBackend, Error, GenerationBackend, InferenceBackend, Result, Vector,
};

/// Mock inference backend for deterministic tests.
#[derive(Clone)]
pub struct MockBackend {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

#[derive(Debug, Clone)]
struct MockConfig {
    dimension: usize,
    /// Responses matched by substring of the prompt, checked in insertion order.
    routed_responses: Vec<(String, String)>,
    default_response: String,
    fail_embeddings: bool,
    fail_generation: bool,
}

/// A recorded backend invocation, for assertions.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub operation: String,
    pub input: String,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            dimension: 384,
            routed_responses: Vec::new(),
            default_response: "Mock response".to_string(),
            fail_embeddings: false,
            fail_generation: false,
        }
    }
}

impl MockBackend {
    /// Create a new mock backend with default configuration.
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig::default()),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set the embedding dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        Arc::make_mut(&mut self.config).dimension = dimension;
        self
    }

    /// Set the fallback response for generation requests.
    pub fn with_fixed_response(mut self, response: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).default_response = response.into();
        self
    }

    /// Route prompts containing `marker` to `response`.
    ///
    /// Lets one mock serve QA, quiz, and summary prompts in a single test.
    pub fn with_routed_response(
        mut self,
        marker: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        Arc::make_mut(&mut self.config)
            .routed_responses
            .push((marker.into(), response.into()));
        self
    }

    /// Make embedding calls fail, for error-path tests.
    pub fn with_failing_embeddings(mut self) -> Self {
        Arc::make_mut(&mut self.config).fail_embeddings = true;
        self
    }

    /// Make generation calls fail, for error-path tests.
    pub fn with_failing_generation(mut self) -> Self {
        Arc::make_mut(&mut self.config).fail_generation = true;
        self
    }

    /// Get all logged calls for assertion.
    pub fn calls(&self) -> Vec<MockCall> {
        self.call_log.lock().unwrap().clone()
    }

    /// Count calls for one operation ("embed" or "generate").
    pub fn call_count(&self, operation: &str) -> usize {
        self.call_log
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    fn log_call(&self, operation: &str, input: &str) {
        self.call_log.lock().unwrap().push(MockCall {
            operation: operation.to_string(),
            input: input.to_string(),
        });
    }

    fn route(&self, prompt: &str) -> String {
        for (marker, response) in &self.config.routed_responses {
            if prompt.contains(marker.as_str()) {
                return response.clone();
            }
        }
        self.config.default_response.clone()
    }

    /// Generate a deterministic embedding from text.
    ///
    /// Character-based hashing: the same text always produces the same
    /// unit-length vector.
    pub fn embed_deterministic(text: &str, dimension: usize) -> Vec<f32> {
        let mut vec = vec![0.0f32; dimension];
        for (i, c) in text.chars().enumerate() {
            let idx = (c as usize + i) % dimension;
            vec[idx] += 0.1;
        }
        let magnitude: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            vec.iter_mut().for_each(|x| *x /= magnitude);
        }
        vec
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingBackend for MockBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        if self.config.fail_embeddings {
            return Err(Error::Embedding("simulated failure".to_string()));
        }
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            self.log_call("embed", text);
            vectors.push(Vector::from(Self::embed_deterministic(
                text,
                self.config.dimension,
            )));
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embed"
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system("", prompt).await
    }

    async fn generate_with_system(&self, _system: &str, prompt: &str) -> Result<String> {
        if self.config.fail_generation {
            return Err(Error::Inference("simulated failure".to_string()));
        }
        self.log_call("generate", prompt);
        Ok(self.route(prompt))
    }

    async fn generate_json(&self, system: &str, prompt: &str) -> Result<String> {
        self.generate_with_system(system, prompt).await
    }

    fn model_name(&self) -> &str {
        "mock-gen"
    }
}

#[async_trait]
impl InferenceBackend for MockBackend {
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_embed_dimension() {
        let backend = MockBackend::new().with_dimension(128);
        let vectors = backend
            .embed_texts(&["test".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 1);
        assert_eq!(vectors[0].as_slice().len(), 128);
    }

    #[tokio::test]
    async fn test_mock_embed_deterministic() {
        let backend = MockBackend::new();
        let a = backend
            .embed_texts(&["quantum computing".to_string()])
            .await
            .unwrap();
        let b = backend
            .embed_texts(&["quantum computing".to_string()])
            .await
            .unwrap();
        assert_eq!(a[0].as_slice(), b[0].as_slice());
    }

    #[test]
    fn test_embed_deterministic_is_normalized() {
        let vec = MockBackend::embed_deterministic("some study text", 96);
        let magnitude: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_mock_generate_default() {
        let backend = MockBackend::new().with_fixed_response("Custom response");
        assert_eq!(backend.generate("anything").await.unwrap(), "Custom response");
    }

    #[tokio::test]
    async fn test_mock_generate_routing() {
        let backend = MockBackend::new()
            .with_routed_response("quiz", r#"[{"question": "Q1?"}]"#)
            .with_routed_response("summarize", "A short summary.");

        let quiz = backend.generate("please make a quiz now").await.unwrap();
        assert!(quiz.contains("Q1?"));

        let summary = backend.generate("summarize this text").await.unwrap();
        assert_eq!(summary, "A short summary.");
    }

    #[tokio::test]
    async fn test_mock_call_logging() {
        let backend = MockBackend::new();
        backend
            .embed_texts(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        backend.generate("prompt").await.unwrap();

        assert_eq!(backend.call_count("embed"), 2);
        assert_eq!(backend.call_count("generate"), 1);
        assert_eq!(backend.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_mock_failure_paths() {
        let backend = MockBackend::new().with_failing_embeddings();
        assert!(backend.embed_texts(&["x".to_string()]).await.is_err());

        let backend = MockBackend::new().with_failing_generation();
        assert!(backend.generate("x").await.is_err());
    }

    #[tokio::test]
    async fn test_mock_health_check() {
        let backend = MockBackend::new();
        assert!(backend.health_check().await.unwrap());
    }
}
