//! Ollama-compatible inference backend implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use studia_core::{
    defaults, EmbeddingBackend, Error, GenerationBackend, InferenceBackend, Result, Vector,
};

/// Default inference endpoint.
pub const DEFAULT_INFERENCE_URL: &str = defaults::INFERENCE_URL;

/// Default embedding model.
pub const DEFAULT_EMBED_MODEL: &str = defaults::EMBED_MODEL;

/// Default generation model.
pub const DEFAULT_GEN_MODEL: &str = defaults::GEN_MODEL;

/// Default embedding dimension for nomic-embed-text.
pub const DEFAULT_DIMENSION: usize = defaults::EMBED_DIMENSION;

/// Ollama-compatible inference backend.
///
/// Works against a local Ollama server by default. Hosted endpoints that
/// speak the same API can be used by pointing `STUDIA_INFERENCE_URL` at
/// them and supplying the optional bearer credentials.
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    embed_model: String,
    gen_model: String,
    dimension: usize,
    /// Optional bearer token for the generation endpoint.
    api_key: Option<String>,
    /// Optional bearer token for the embedding endpoint.
    embed_api_key: Option<String>,
    embed_timeout_secs: u64,
    gen_timeout_secs: u64,
}

impl OllamaBackend {
    /// Create a new backend with default settings.
    pub fn new() -> Self {
        Self::with_config(
            DEFAULT_INFERENCE_URL.to_string(),
            DEFAULT_EMBED_MODEL.to_string(),
            DEFAULT_GEN_MODEL.to_string(),
            DEFAULT_DIMENSION,
        )
    }

    /// Create a new backend with custom configuration.
    pub fn with_config(
        base_url: String,
        embed_model: String,
        gen_model: String,
        dimension: usize,
    ) -> Self {
        let gen_timeout = std::env::var("STUDIA_GEN_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::GEN_TIMEOUT_SECS);

        let embed_timeout = std::env::var("STUDIA_EMBED_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::EMBED_TIMEOUT_SECS);

        let client = Client::builder()
            .timeout(Duration::from_secs(gen_timeout))
            .build()
            .expect("Failed to create HTTP client");

        info!(
            "Initializing inference backend: url={}, embed={}, gen={}",
            base_url, embed_model, gen_model
        );

        Self {
            client,
            base_url,
            embed_model,
            gen_model,
            dimension,
            api_key: None,
            embed_api_key: None,
            embed_timeout_secs: embed_timeout,
            gen_timeout_secs: gen_timeout,
        }
    }

    /// Create from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `STUDIA_INFERENCE_URL` | `http://127.0.0.1:11434` |
    /// | `STUDIA_EMBED_MODEL` | `nomic-embed-text` |
    /// | `STUDIA_GEN_MODEL` | `llama3.1:8b` |
    /// | `STUDIA_EMBED_DIM` | `768` |
    /// | `STUDIA_API_KEY` | unset (no Authorization header) |
    /// | `STUDIA_EMBED_API_KEY` | falls back to `STUDIA_API_KEY` |
    pub fn from_env() -> Self {
        let base_url = std::env::var("STUDIA_INFERENCE_URL")
            .unwrap_or_else(|_| DEFAULT_INFERENCE_URL.to_string());
        let embed_model =
            std::env::var("STUDIA_EMBED_MODEL").unwrap_or_else(|_| DEFAULT_EMBED_MODEL.to_string());
        let gen_model =
            std::env::var("STUDIA_GEN_MODEL").unwrap_or_else(|_| DEFAULT_GEN_MODEL.to_string());
        let dimension = std::env::var("STUDIA_EMBED_DIM")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_DIMENSION);

        let api_key = std::env::var("STUDIA_API_KEY").ok().filter(|k| !k.is_empty());
        let embed_api_key = std::env::var("STUDIA_EMBED_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| api_key.clone());

        let mut backend = Self::with_config(base_url, embed_model, gen_model, dimension);
        backend.api_key = api_key;
        backend.embed_api_key = embed_api_key;
        backend
    }

    /// Set the bearer token for the generation endpoint.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the bearer token for the embedding endpoint.
    pub fn with_embed_api_key(mut self, key: impl Into<String>) -> Self {
        self.embed_api_key = Some(key.into());
        self
    }

    fn apply_auth(
        request: reqwest::RequestBuilder,
        key: &Option<String>,
    ) -> reqwest::RequestBuilder {
        match key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Internal generation method shared by all generate variants.
    ///
    /// Uses the `/api/chat` endpoint which properly separates
    /// thinking/reasoning from the final response content.
    async fn generate_internal(
        &self,
        system: &str,
        prompt: &str,
        format: Option<serde_json::Value>,
    ) -> Result<String> {
        let start = Instant::now();

        debug!(
            json_format = format.is_some(),
            "Starting generation via chat API"
        );

        let mut messages = Vec::new();
        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let request = ChatRequest {
            model: self.gen_model.clone(),
            messages,
            stream: false,
            format,
        };

        let response = Self::apply_auth(
            self.client.post(format!("{}/api/chat", self.base_url)),
            &self.api_key,
        )
        .timeout(Duration::from_secs(self.gen_timeout_secs))
        .json(&request)
        .send()
        .await
        .map_err(|e| Error::Inference(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "Inference server returned {}: {}",
                status, body
            )));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let content = result.message.content;
        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            response_len = content.len(),
            duration_ms = elapsed,
            "Generation complete"
        );
        if elapsed > 30000 {
            warn!(
                duration_ms = elapsed,
                prompt_len = prompt.len(),
                slow = true,
                "Slow generation operation"
            );
        }
        Ok(content)
    }
}

impl Default for OllamaBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Chat API message for `/api/chat`.
#[derive(Serialize, Deserialize, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Request payload for the `/api/chat` endpoint.
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    /// Format enforcement. Set to `"json"` for guaranteed valid JSON output.
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<serde_json::Value>,
}

/// Response from the `/api/chat` endpoint.
#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[async_trait]
impl EmbeddingBackend for OllamaBackend {
    #[instrument(skip(self, texts), fields(subsystem = "inference", component = "ollama", op = "embed_texts", model = %self.embed_model, input_count = texts.len()))]
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let start = Instant::now();

        let request = EmbeddingRequest {
            model: self.embed_model.clone(),
            input: texts.to_vec(),
        };

        let response = Self::apply_auth(
            self.client.post(format!("{}/api/embed", self.base_url)),
            &self.embed_api_key,
        )
        .timeout(Duration::from_secs(self.embed_timeout_secs))
        .json(&request)
        .send()
        .await
        .map_err(|e| Error::Embedding(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!(
                "Inference server returned {}: {}",
                status, body
            )));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Failed to parse response: {}", e)))?;

        let vectors: Vec<Vector> = result.embeddings.into_iter().map(Vector::from).collect();
        let elapsed = start.elapsed().as_millis() as u64;

        debug!(
            result_count = vectors.len(),
            duration_ms = elapsed,
            "Embedding complete"
        );
        if elapsed > 5000 {
            warn!(
                duration_ms = elapsed,
                input_count = texts.len(),
                slow = true,
                "Slow embedding operation"
            );
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.embed_model
    }
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with_system("", prompt).await
    }

    #[instrument(skip(self, system, prompt), fields(subsystem = "inference", component = "ollama", op = "generate", model = %self.gen_model, prompt_len = prompt.len()))]
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.generate_internal(system, prompt, None).await
    }

    #[instrument(skip(self, system, prompt), fields(subsystem = "inference", component = "ollama", op = "generate_json", model = %self.gen_model, prompt_len = prompt.len()))]
    async fn generate_json(&self, system: &str, prompt: &str) -> Result<String> {
        self.generate_internal(system, prompt, Some(serde_json::json!("json")))
            .await
    }

    fn model_name(&self) -> &str {
        &self.gen_model
    }
}

#[async_trait]
impl InferenceBackend for OllamaBackend {
    async fn health_check(&self) -> Result<bool> {
        let response = Self::apply_auth(
            self.client.get(format!("{}/api/tags", self.base_url)),
            &self.api_key,
        )
        .timeout(Duration::from_secs(5))
        .send()
        .await;

        match response {
            Ok(resp) => {
                if resp.status().is_success() {
                    debug!("Inference health check passed");
                    Ok(true)
                } else {
                    warn!("Inference health check failed: {}", resp.status());
                    Ok(false)
                }
            }
            Err(e) => {
                warn!("Inference health check error: {}", e);
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_constants() {
        assert_eq!(DEFAULT_INFERENCE_URL, "http://127.0.0.1:11434");
        assert_eq!(DEFAULT_EMBED_MODEL, "nomic-embed-text");
        assert_eq!(DEFAULT_GEN_MODEL, "llama3.1:8b");
        assert_eq!(DEFAULT_DIMENSION, 768);
    }

    #[test]
    fn test_default_config() {
        let backend = OllamaBackend::new();
        assert_eq!(backend.base_url, DEFAULT_INFERENCE_URL);
        assert_eq!(backend.embed_model, DEFAULT_EMBED_MODEL);
        assert_eq!(backend.gen_model, DEFAULT_GEN_MODEL);
        assert_eq!(backend.dimension, DEFAULT_DIMENSION);
        assert!(backend.api_key.is_none());
        assert!(backend.embed_api_key.is_none());
    }

    #[test]
    fn test_custom_config() {
        let backend = OllamaBackend::with_config(
            "http://custom:1234".to_string(),
            "custom-embed".to_string(),
            "custom-gen".to_string(),
            512,
        );
        assert_eq!(backend.base_url, "http://custom:1234");
        assert_eq!(backend.embed_model, "custom-embed");
        assert_eq!(backend.gen_model, "custom-gen");
        assert_eq!(backend.dimension, 512);
    }

    #[test]
    fn test_with_api_keys() {
        let backend = OllamaBackend::new()
            .with_api_key("sk-gen")
            .with_embed_api_key("sk-embed");
        assert_eq!(backend.api_key.as_deref(), Some("sk-gen"));
        assert_eq!(backend.embed_api_key.as_deref(), Some("sk-embed"));
    }

    #[test]
    fn test_dimension_accessor() {
        let backend = OllamaBackend::with_config(
            "http://test".to_string(),
            "model".to_string(),
            "gen".to_string(),
            384,
        );
        assert_eq!(backend.dimension(), 384);
    }

    #[test]
    fn test_model_name_accessor() {
        let backend = OllamaBackend::with_config(
            "http://test".to_string(),
            "my-embed-model".to_string(),
            "my-gen-model".to_string(),
            768,
        );
        assert_eq!(EmbeddingBackend::model_name(&backend), "my-embed-model");
        assert_eq!(GenerationBackend::model_name(&backend), "my-gen-model");
    }

    #[test]
    fn test_embedding_request_serialization() {
        let request = EmbeddingRequest {
            model: "test-model".to_string(),
            input: vec!["hello".to_string(), "world".to_string()],
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("test-model"));
        assert!(json.contains("hello"));
        assert!(json.contains("world"));
    }

    #[test]
    fn test_embedding_response_deserialization() {
        let json = r#"{"embeddings": [[0.1, 0.2, 0.3], [0.4, 0.5, 0.6]]}"#;
        let response: EmbeddingResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.embeddings.len(), 2);
        assert_eq!(response.embeddings[0], vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_chat_request_serialization() {
        let request = ChatRequest {
            model: "llama3.1:8b".to_string(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: "Be helpful".to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: "Hello".to_string(),
                },
            ],
            stream: false,
            format: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"role\":\"system\""));
        assert!(json.contains("\"role\":\"user\""));
        assert!(!json.contains("format")); // Should not serialize None
    }

    #[test]
    fn test_chat_request_with_json_format() {
        let request = ChatRequest {
            model: "llama3.1:8b".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "Output JSON".to_string(),
            }],
            stream: false,
            format: Some(serde_json::json!("json")),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"format\":\"json\""));
    }

    #[test]
    fn test_chat_response_deserialization() {
        let json = r#"{"message": {"role": "assistant", "content": "Hello there!"}, "done": true}"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.message.content, "Hello there!");
        assert_eq!(response.message.role, "assistant");
    }
}

/// Integration tests that require a live inference server.
/// Run with: cargo test --package studia-inference --features integration
#[cfg(all(test, feature = "integration"))]
mod integration_tests {
    use super::*;

    fn get_backend() -> OllamaBackend {
        OllamaBackend::from_env()
    }

    #[tokio::test]
    async fn test_health_check() {
        let backend = get_backend();
        let healthy = backend.health_check().await.expect("health check failed");
        assert!(healthy, "Inference server should be healthy and reachable");
    }

    #[tokio::test]
    async fn test_embed_single_text() {
        let backend = get_backend();

        let texts = vec!["Hello, this is a test sentence for embedding.".to_string()];
        let vectors = backend.embed_texts(&texts).await.expect("embedding failed");

        assert_eq!(vectors.len(), 1, "Should return one vector");
        assert_eq!(
            vectors[0].as_slice().len(),
            backend.dimension(),
            "Vector dimension should match model dimension"
        );
    }

    #[tokio::test]
    async fn test_generate_simple() {
        let backend = get_backend();

        let response = backend
            .generate("Say 'hello' and nothing else.")
            .await
            .expect("generation failed");

        assert!(!response.is_empty(), "Response should not be empty");
    }
}
