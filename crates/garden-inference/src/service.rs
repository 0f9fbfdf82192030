//! External embedding service returning `[text, [floats]]` tuples.
//!
//! The service chunks server-side: one request with a prompt yields an
//! ordered list of `[chunk_text, vector]` pairs.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info, instrument, warn};

use garden_core::defaults;
use garden_core::{
    ChunkedEmbeddingBackend, EmbeddedChunk, EmbeddingBackend, Error, Result, Vector,
};

/// Operation prefix sent with every request.
pub const QUERY_OPERATION: &str = "query: ";

/// Client for the tuple embedding service.
pub struct EmbeddingServiceBackend {
    client: Client,
    url: String,
    api_key: Option<String>,
    dimension: usize,
}

#[derive(Serialize)]
struct EmbeddingServiceRequest<'a> {
    prompt: &'a str,
    operation: &'a str,
}

impl EmbeddingServiceBackend {
    pub fn new(url: String, api_key: Option<String>, dimension: usize) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(defaults::EMBED_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());
        info!("Initializing embedding service backend: url={}", url);
        Self {
            client,
            url,
            api_key: api_key.filter(|k| !k.is_empty()),
            dimension,
        }
    }

    /// Create from `AI_SERVICE_URL`, `AI_SERVICE_KEY`, and `OLLAMA_EMBED_DIM`.
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("AI_SERVICE_URL")
            .map_err(|_| Error::Config("AI_SERVICE_URL is required for the embedding service".into()))?;
        let api_key = std::env::var("AI_SERVICE_KEY").ok();
        let dimension = std::env::var("OLLAMA_EMBED_DIM")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults::EMBED_DIMENSION);
        Ok(Self::new(url, api_key, dimension))
    }

    async fn request_tuples(&self, text: &str) -> Result<Vec<EmbeddedChunk>> {
        let start = Instant::now();
        let mut request = self.client.post(&self.url).json(&EmbeddingServiceRequest {
            prompt: text,
            operation: QUERY_OPERATION,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Embedding(format!(
                "Embedding service returned {}: {}",
                status, body
            )));
        }

        let body: JsonValue = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Failed to parse response: {}", e)))?;
        let chunks = parse_tuples(body)?;

        let elapsed = start.elapsed().as_millis() as u64;
        debug!(chunk_count = chunks.len(), duration_ms = elapsed, "Service embedding complete");
        if elapsed > defaults::SLOW_EMBED_MS {
            warn!(duration_ms = elapsed, slow = true, "Slow embedding operation");
        }
        Ok(chunks)
    }
}

/// Parse `[[text, [floats]], ...]`, rejecting any element that is not a
/// two-element `[string, number array]` pair.
pub fn parse_tuples(body: JsonValue) -> Result<Vec<EmbeddedChunk>> {
    let JsonValue::Array(items) = body else {
        return Err(Error::Embedding("invalid response format: expected an array".into()));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            let JsonValue::Array(mut pair) = item else {
                return Err(Error::Embedding(format!(
                    "invalid response format at {}: expected [text, embedding] tuple",
                    i
                )));
            };
            if pair.len() != 2 {
                return Err(Error::Embedding(format!(
                    "invalid response format at {}: expected 2 elements, got {}",
                    i,
                    pair.len()
                )));
            }
            let values = pair.pop().unwrap_or_default();
            let text = match pair.pop() {
                Some(JsonValue::String(text)) => text,
                _ => {
                    return Err(Error::Embedding(format!(
                        "invalid response format at {}: first element should be string",
                        i
                    )))
                }
            };
            let JsonValue::Array(values) = values else {
                return Err(Error::Embedding(format!(
                    "invalid response format at {}: second element should be array",
                    i
                )));
            };
            let vector = values
                .iter()
                .enumerate()
                .map(|(j, v)| {
                    v.as_f64().map(|f| f as f32).ok_or_else(|| {
                        Error::Embedding(format!("invalid embedding value type at index {}", j))
                    })
                })
                .collect::<Result<Vec<f32>>>()?;
            Ok(EmbeddedChunk {
                text,
                vector: Vector::from(vector),
            })
        })
        .collect()
}

#[async_trait]
impl ChunkedEmbeddingBackend for EmbeddingServiceBackend {
    #[instrument(skip(self, text), fields(subsystem = "inference", component = "embedding_service", op = "embed_chunks", text_len = text.len()))]
    async fn embed_chunks(&self, text: &str) -> Result<Vec<EmbeddedChunk>> {
        self.request_tuples(text).await
    }
}

#[async_trait]
impl EmbeddingBackend for EmbeddingServiceBackend {
    /// One vector per text: the first tuple the service returns for it.
    #[instrument(skip(self, texts), fields(subsystem = "inference", component = "embedding_service", op = "embed_texts", input_count = texts.len()))]
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            let first = self
                .request_tuples(text)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| Error::Embedding("no embedding returned".to_string()))?;
            vectors.push(first.vector);
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "embedding-service"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // =========================================================================
    // Tuple parsing
    // =========================================================================

    #[test]
    fn test_parse_valid_tuples() {
        let chunks = parse_tuples(json!([["first", [0.5, 1]], ["second", [2.0, -1.5]]])).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "first");
        assert_eq!(chunks[0].vector.as_slice(), &[0.5, 1.0]);
        assert_eq!(chunks[1].text, "second");
    }

    #[test]
    fn test_parse_rejects_wrong_arity() {
        let err = parse_tuples(json!([["text", [1.0], "extra"]])).unwrap_err();
        assert!(err.to_string().contains("expected 2 elements, got 3"));
    }

    #[test]
    fn test_parse_rejects_non_string_text() {
        let err = parse_tuples(json!([[1, [1.0]]])).unwrap_err();
        assert!(err.to_string().contains("first element should be string"));
    }

    #[test]
    fn test_parse_rejects_non_array_vector() {
        let err = parse_tuples(json!([["t", "1.0"]])).unwrap_err();
        assert!(err.to_string().contains("second element should be array"));
    }

    #[test]
    fn test_parse_rejects_non_numeric_value() {
        let err = parse_tuples(json!([["t", [1.0, "x"]]])).unwrap_err();
        assert!(err.to_string().contains("index 1"));
    }

    #[test]
    fn test_parse_rejects_non_array_body() {
        assert!(parse_tuples(json!({"embeddings": []})).is_err());
    }

    // =========================================================================
    // HTTP
    // =========================================================================

    #[tokio::test]
    async fn test_embed_chunks_sends_prompt_and_bearer_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed"))
            .and(header("authorization", "Bearer secret"))
            .and(body_json(json!({"prompt": "hello", "operation": "query: "})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([["hello", [0.1, 0.2]]])))
            .expect(1)
            .mount(&server)
            .await;

        let backend = EmbeddingServiceBackend::new(
            format!("{}/embed", server.uri()),
            Some("secret".to_string()),
            2,
        );
        let chunks = backend.embed_chunks("hello").await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello");
    }

    #[tokio::test]
    async fn test_embed_texts_takes_first_tuple() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([["a", [1.0, 0.0]], ["b", [0.0, 1.0]]])),
            )
            .mount(&server)
            .await;

        let backend = EmbeddingServiceBackend::new(server.uri(), None, 2);
        let vectors = backend.embed_texts(&["ab".to_string()]).await.unwrap();
        assert_eq!(vectors.len(), 1);
        assert_eq!(vectors[0].as_slice(), &[1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_error_status_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let backend = EmbeddingServiceBackend::new(server.uri(), Some("k".into()), 2);
        let err = backend.embed_chunks("x").await.unwrap_err();
        assert!(matches!(err, Error::Embedding(ref m) if m.contains("401") && m.contains("bad key")));
    }

    #[tokio::test]
    async fn test_empty_tuple_list_is_error_for_single_vector() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let backend = EmbeddingServiceBackend::new(server.uri(), None, 2);
        assert!(backend.embed_chunks("x").await.unwrap().is_empty());
        assert!(backend.embed_texts(&["x".to_string()]).await.is_err());
    }
}
