//! # studia-inference
//!
//! External model backend abstraction for studia.
//!
//! This crate provides:
//! - Pluggable inference backend traits (re-exported from studia-core)
//! - Ollama-compatible implementation (default)
//! - Optional bearer-token credentials for hosted model endpoints
//! - Deterministic mock backend for tests (feature `mock`)
//!
//! # Feature Flags
//!
//! - `ollama` (default): Enable the Ollama-compatible backend
//! - `mock`: Enable the deterministic mock backend
//!
//! # Example
//!
//! ```rust,no_run
//! use studia_inference::OllamaBackend;
//! use studia_core::EmbeddingBackend;
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = OllamaBackend::from_env();
//!     let texts = vec!["Hello".to_string()];
//!     let embeddings = backend.embed_texts(&texts).await.unwrap();
//! }
//! ```

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use studia_core::{EmbeddingBackend, Error, GenerationBackend, InferenceBackend, Result, Vector};

#[cfg(feature = "ollama")]
pub use ollama::OllamaBackend;

#[cfg(any(test, feature = "mock"))]
pub use mock::MockBackend;
