//! Ollama inference backend implementation.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use garden_core::defaults;
use garden_core::{EmbeddingBackend, Error, GenerationBackend, Result, Vector};

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = defaults::OLLAMA_URL;

/// Default embedding model.
pub const DEFAULT_EMBED_MODEL: &str = defaults::EMBED_MODEL;

/// Default generation model.
pub const DEFAULT_GEN_MODEL: &str = defaults::GEN_MODEL;

/// Default embedding dimension for nomic-embed-text.
pub const DEFAULT_DIMENSION: usize = defaults::EMBED_DIMENSION;

/// Connection settings for [`OllamaBackend`].
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Endpoint used for generation.
    pub base_url: String,
    /// Endpoint used for embeddings.
    pub embed_url: String,
    pub embed_model: String,
    pub gen_model: String,
    pub dimension: usize,
    pub embed_timeout_secs: u64,
    pub gen_timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            embed_url: DEFAULT_OLLAMA_URL.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            gen_model: DEFAULT_GEN_MODEL.to_string(),
            dimension: DEFAULT_DIMENSION,
            embed_timeout_secs: defaults::EMBED_TIMEOUT_SECS,
            gen_timeout_secs: defaults::GEN_TIMEOUT_SECS,
        }
    }
}

impl OllamaConfig {
    /// Read settings from the environment, falling back to defaults.
    ///
    /// `OLLAMA_EMBED_API_URL` falls back to `OLLAMA_API_URL`.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("OLLAMA_API_URL").unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());
        let embed_url = std::env::var("OLLAMA_EMBED_API_URL").unwrap_or_else(|_| base_url.clone());
        let embed_model =
            std::env::var("OLLAMA_EMBED_MODEL").unwrap_or_else(|_| DEFAULT_EMBED_MODEL.to_string());
        let gen_model =
            std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| DEFAULT_GEN_MODEL.to_string());
        let dimension = std::env::var("OLLAMA_EMBED_DIM")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_DIMENSION);
        let gen_timeout_secs = std::env::var("GARDEN_GEN_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::GEN_TIMEOUT_SECS);
        let embed_timeout_secs = std::env::var("GARDEN_EMBED_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::EMBED_TIMEOUT_SECS);

        Self {
            base_url,
            embed_url,
            embed_model,
            gen_model,
            dimension,
            embed_timeout_secs,
            gen_timeout_secs,
        }
    }
}

/// Ollama inference backend.
pub struct OllamaBackend {
    client: Client,
    config: OllamaConfig,
}

impl OllamaBackend {
    /// Create a new Ollama backend with default settings.
    pub fn new() -> Self {
        Self::with_config(OllamaConfig::default())
    }

    /// Create a new Ollama backend with custom configuration.
    pub fn with_config(config: OllamaConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.gen_timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        info!(
            "Initializing Ollama backend: url={}, embed_url={}, embed={}, gen={}",
            config.base_url, config.embed_url, config.embed_model, config.gen_model
        );

        Self { client, config }
    }

    /// Create from environment variables.
    pub fn from_env() -> Self {
        Self::with_config(OllamaConfig::from_env())
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
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

/// Request payload for the Ollama `/api/generate` endpoint.
#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
}

/// Response from the Ollama `/api/generate` endpoint.
#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[async_trait]
impl EmbeddingBackend for OllamaBackend {
    #[instrument(skip(self, texts), fields(subsystem = "inference", component = "ollama", op = "embed_texts", model = %self.config.embed_model, input_count = texts.len()))]
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let start = Instant::now();

        let request = EmbeddingRequest {
            model: self.config.embed_model.clone(),
            input: texts.to_vec(),
        };

        let response = self
            .client
            .post(format!("{}/api/embed", self.config.embed_url))
            .timeout(Duration::from_secs(self.config.embed_timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!(
                "Ollama returned {}: {}",
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
        if elapsed > defaults::SLOW_EMBED_MS {
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
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        &self.config.embed_model
    }
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    #[instrument(skip(self, prompt), fields(subsystem = "inference", component = "ollama", op = "generate", model = %self.config.gen_model, prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String> {
        let start = Instant::now();

        let request = GenerateRequest {
            model: self.config.gen_model.clone(),
            prompt: prompt.to_string(),
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.config.base_url))
            .timeout(Duration::from_secs(self.config.gen_timeout_secs))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let result: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            response_len = result.response.len(),
            duration_ms = elapsed,
            "Generation complete"
        );
        if elapsed > defaults::SLOW_GEN_MS {
            warn!(
                duration_ms = elapsed,
                prompt_len = prompt.len(),
                slow = true,
                "Slow generation operation"
            );
        }
        Ok(result.response)
    }

    fn model_name(&self) -> &str {
        &self.config.gen_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend_for(server: &MockServer) -> OllamaBackend {
        OllamaBackend::with_config(OllamaConfig {
            base_url: server.uri(),
            embed_url: server.uri(),
            embed_model: "test-embed".to_string(),
            gen_model: "test-gen".to_string(),
            dimension: 3,
            ..OllamaConfig::default()
        })
    }

    // ==========================================================================
    // Constants Tests
    // ==========================================================================

    #[test]
    fn test_default_constants() {
        assert_eq!(DEFAULT_OLLAMA_URL, "http://127.0.0.1:11434");
        assert_eq!(DEFAULT_EMBED_MODEL, "nomic-embed-text");
        assert_eq!(DEFAULT_DIMENSION, 768);
    }

    #[test]
    fn test_default_config() {
        let backend = OllamaBackend::new();
        assert_eq!(backend.config().base_url, DEFAULT_OLLAMA_URL);
        assert_eq!(backend.config().embed_url, DEFAULT_OLLAMA_URL);
        assert_eq!(EmbeddingBackend::model_name(&backend), DEFAULT_EMBED_MODEL);
        assert_eq!(GenerationBackend::model_name(&backend), DEFAULT_GEN_MODEL);
        assert_eq!(backend.dimension(), DEFAULT_DIMENSION);
    }

    // ==========================================================================
    // Embedding Tests
    // ==========================================================================

    #[tokio::test]
    async fn test_embed_texts_posts_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .and(body_json(serde_json::json!({
                "model": "test-embed",
                "input": ["a", "b"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": [[0.1, 0.2, 0.3], [0.4, 0.5, 0.6]]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = backend_for(&server);
        let vectors = backend
            .embed_texts(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[1].as_slice(), &[0.4, 0.5, 0.6]);
    }

    #[tokio::test]
    async fn test_embed_empty_list_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let backend = backend_for(&server);
        assert!(backend.embed_texts(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_embed_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
            .mount(&server)
            .await;

        let err = backend_for(&server)
            .embed_texts(&["x".to_string()])
            .await
            .unwrap_err();
        match err {
            Error::Embedding(msg) => {
                assert!(msg.contains("Ollama returned 500"));
                assert!(msg.contains("model not loaded"));
            }
            other => panic!("Expected Embedding error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_embed_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"nope": 1})))
            .mount(&server)
            .await;

        let err = backend_for(&server)
            .embed_texts(&["x".to_string()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to parse response"));
    }

    #[tokio::test]
    async fn test_embed_uses_separate_embed_url() {
        let gen_server = MockServer::start().await;
        let embed_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": [[1.0]]
            })))
            .expect(1)
            .mount(&embed_server)
            .await;

        let backend = OllamaBackend::with_config(OllamaConfig {
            base_url: gen_server.uri(),
            embed_url: embed_server.uri(),
            dimension: 1,
            ..OllamaConfig::default()
        });
        assert_eq!(backend.embed_texts(&["x".to_string()]).await.unwrap().len(), 1);
    }

    // ==========================================================================
    // Generation Tests
    // ==========================================================================

    #[tokio::test]
    async fn test_generate_uses_generate_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_json(serde_json::json!({
                "model": "test-gen",
                "prompt": "Say hi",
                "stream": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "test-gen",
                "response": "<think>greeting</think>Hi!",
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = backend_for(&server).generate("Say hi").await.unwrap();
        // Think spans are left for callers to interpret.
        assert_eq!(text, "<think>greeting</think>Hi!");
    }

    #[tokio::test]
    async fn test_generate_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
            .mount(&server)
            .await;

        let err = backend_for(&server).generate("x").await.unwrap_err();
        assert!(matches!(err, Error::Inference(ref m) if m.contains("404")));
    }

    #[tokio::test]
    async fn test_generate_connection_refused() {
        let backend = OllamaBackend::with_config(OllamaConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            ..OllamaConfig::default()
        });
        let err = backend.generate("x").await.unwrap_err();
        assert!(matches!(err, Error::Inference(ref m) if m.starts_with("Request failed")));
    }
}
