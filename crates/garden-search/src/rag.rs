//! LLM-backed advanced search.
//!
//! Embeds the question, retrieves the nearest Q&A fragments, renders them
//! into a prompt template, and asks the generation backend for an answer.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value as JsonValue};
use tracing::{debug, info, instrument, warn};

use garden_core::defaults;
use garden_core::{
    AdvancedSearchResult, ConfigurationRepository, EmbeddingChunkRepository, Error,
    GenerationBackend, PromptTemplate, Result, RetrievedItem,
};
use garden_inference::{parse_thinking_response, VectorEmbedder};

/// Prompt used when no template is configured under
/// [`defaults::SEARCH_PROMPT_TEMPLATE_KEY`].
pub const DEFAULT_PROMPT_TEMPLATE: &str = r#"System: You are a helpful assistant that helps the user answering questions based on the provided context. The context is a set of questions and answers generated from the content of bookmarks of the user, including a summary of the source article.
When answering, if any article from the questions and answers is relevant, quote it with a link in markdown using the format [title](url)
If the context article is not relevant, dismiss it.
If you need to refer to "the context", mention "the bookmarks database" instead, for example: "In the bookmarks database there is an article related to..."

Context:
{{range .RetrievedItems}}Title: {{.BookmarkTitle}}
Question: {{.Question}}
Answer: {{.Answer}}
Summary: {{.Summary}}
Url: {{.BookmarkURL}}
{{end}}
User question: {{.UserQuestion}}

Please answer the user's question, and rely as much as possible on the provided context. If the context doesn't contain relevant information, say so."#;

/// Generation calls above this duration are logged as slow.
const SLOW_ANSWER_MS: u64 = 30_000;

/// Normalize a request query: strings pass through, objects are
/// serialized to compact JSON, anything else is rejected.
pub fn query_text(query: &JsonValue) -> Result<String> {
    let text = match query {
        JsonValue::String(s) => s.clone(),
        JsonValue::Object(_) => serde_json::to_string(query)?,
        _ => {
            return Err(Error::InvalidInput(
                "Query must be a string or object".to_string(),
            ))
        }
    };
    if text.trim().is_empty() {
        return Err(Error::InvalidInput("Query parameter is required".to_string()));
    }
    Ok(text)
}

/// Template bindings: `UserQuestion` and `RetrievedItems`, with item
/// fields under their template names.
pub fn prompt_bindings(user_question: &str, items: &[RetrievedItem]) -> JsonValue {
    let items: Vec<JsonValue> = items
        .iter()
        .map(|item| {
            json!({
                "ID": item.id,
                "Question": item.question,
                "Answer": item.answer,
                "BookmarkID": item.bookmark_id.to_string(),
                "BookmarkTitle": item.bookmark_title,
                "BookmarkURL": item.bookmark_url,
                "Title": item.title,
                "URL": item.url,
                "Summary": item.summary,
                "Similarity": item.similarity,
                "Strategy": item.strategy,
            })
        })
        .collect();
    json!({
        "UserQuestion": user_question,
        "RetrievedItems": items,
    })
}

/// Retrieval-augmented answering over the Q&A index.
#[derive(Clone)]
pub struct AdvancedSearch {
    chunks: Arc<dyn EmbeddingChunkRepository>,
    configuration: Arc<dyn ConfigurationRepository>,
    embedder: VectorEmbedder,
    generator: Arc<dyn GenerationBackend>,
}

impl AdvancedSearch {
    pub fn new(
        chunks: Arc<dyn EmbeddingChunkRepository>,
        configuration: Arc<dyn ConfigurationRepository>,
        embedder: VectorEmbedder,
        generator: Arc<dyn GenerationBackend>,
    ) -> Self {
        Self {
            chunks,
            configuration,
            embedder,
            generator,
        }
    }

    /// Configured template, or the built-in one when none is set or the
    /// lookup fails.
    async fn template_source(&self) -> String {
        match self
            .configuration
            .get_value(defaults::SEARCH_PROMPT_TEMPLATE_KEY)
            .await
        {
            Ok(Some(source)) if !source.trim().is_empty() => source,
            Ok(_) => DEFAULT_PROMPT_TEMPLATE.to_string(),
            Err(e) => {
                warn!(error = %e, "Failed to load prompt template, using default");
                DEFAULT_PROMPT_TEMPLATE.to_string()
            }
        }
    }

    /// Answer `query` from the nearest Q&A fragments.
    #[instrument(skip(self, query), fields(subsystem = "search", component = "rag", op = "advanced_search", model = self.generator.model_name()))]
    pub async fn search(&self, query: &str) -> Result<AdvancedSearchResult> {
        let start = Instant::now();

        let query_vector = self.embedder.embed(query).await?;
        let similar_questions = self
            .chunks
            .similar_questions(&query_vector, defaults::SIMILAR_QA_LIMIT)
            .await?;
        debug!(result_count = similar_questions.len(), "Retrieved context");

        let template = PromptTemplate::parse(&self.template_source().await)?;
        let rendered_prompt = template.render(&prompt_bindings(query, &similar_questions))?;

        let gen_start = Instant::now();
        let full_response = self.generator.generate(&rendered_prompt).await?;
        let gen_ms = gen_start.elapsed().as_millis() as u64;
        if gen_ms > SLOW_ANSWER_MS {
            warn!(duration_ms = gen_ms, slow = true, "Slow answer generation");
        }

        let parsed = parse_thinking_response(&full_response);
        info!(
            prompt_len = rendered_prompt.len(),
            response_len = full_response.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Advanced search complete"
        );

        Ok(AdvancedSearchResult {
            query: query.to_string(),
            query_string: query.to_string(),
            similar_questions,
            rendered_prompt,
            thinking_process: parsed.thinking_content.unwrap_or_default(),
            full_response,
            answer: parsed.answer_content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use garden_core::memory::InMemoryStore;
    use garden_core::{strategy, BookmarkRepository, EmbeddingBackend, TitleSource};
    use garden_inference::mock::MockInferenceBackend;

    const DIM: usize = 16;

    async fn seeded(backend: &MockInferenceBackend) -> InMemoryStore {
        let store = InMemoryStore::new().with_dimension(DIM);
        let bookmark = store.add_bookmark("https://example.com/lifetimes");
        store
            .insert_title(bookmark.id, "Lifetimes Explained", &TitleSource::Reader)
            .await
            .unwrap();
        let vector = backend
            .embed_texts(&["what are lifetimes".to_string()])
            .await
            .unwrap()
            .remove(0);
        store.add_chunk(
            bookmark.id,
            strategy::QA_V2_PASSAGE,
            "What are lifetimes?\nScopes for references.",
            vector,
        );
        store
    }

    fn rag(store: &InMemoryStore, backend: &MockInferenceBackend) -> AdvancedSearch {
        AdvancedSearch::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            VectorEmbedder::new(Arc::new(backend.clone())),
            Arc::new(backend.clone()),
        )
    }

    // =========================================================================
    // QUERY NORMALIZATION
    // =========================================================================

    #[test]
    fn test_query_text_accepts_string_and_object() {
        assert_eq!(query_text(&json!("hello")).unwrap(), "hello");
        assert_eq!(
            query_text(&json!({"topic": "rust"})).unwrap(),
            r#"{"topic":"rust"}"#
        );
    }

    #[test]
    fn test_query_text_rejects_other_shapes() {
        assert!(matches!(query_text(&json!(42)), Err(Error::InvalidInput(_))));
        assert!(matches!(query_text(&json!("")), Err(Error::InvalidInput(_))));
        assert!(matches!(query_text(&json!(" \t\n ")), Err(Error::InvalidInput(_))));
        assert!(matches!(query_text(&JsonValue::Null), Err(Error::InvalidInput(_))));
    }

    // =========================================================================
    // TEMPLATE
    // =========================================================================

    #[test]
    fn test_default_template_renders_context_block() {
        let item = RetrievedItem {
            id: 1,
            question: "Q1?".to_string(),
            answer: "A1".to_string(),
            bookmark_id: uuid::Uuid::nil(),
            bookmark_title: "T1".to_string(),
            bookmark_url: "https://t1".to_string(),
            title: "T1".to_string(),
            url: "https://t1".to_string(),
            summary: "S1".to_string(),
            similarity: 0.9,
            strategy: strategy::QA_V2_PASSAGE.to_string(),
        };
        let prompt = PromptTemplate::parse(DEFAULT_PROMPT_TEMPLATE)
            .unwrap()
            .render(&prompt_bindings("why?", &[item]))
            .unwrap();
        assert!(prompt.starts_with("System: You are a helpful assistant"));
        assert!(prompt.contains(
            "Context:\nTitle: T1\nQuestion: Q1?\nAnswer: A1\nSummary: S1\nUrl: https://t1\n\nUser question: why?"
        ));
    }

    // =========================================================================
    // PIPELINE
    // =========================================================================

    #[tokio::test]
    async fn test_advanced_search_with_thinking() {
        let backend = MockInferenceBackend::new()
            .with_dimension(DIM)
            .with_fixed_response("<think>consider context</think>\n\nLifetimes bound references.");
        let store = seeded(&backend).await;

        let result = rag(&store, &backend)
            .search("what are lifetimes")
            .await
            .unwrap();

        assert_eq!(result.query, "what are lifetimes");
        assert_eq!(result.query_string, "what are lifetimes");
        assert_eq!(result.similar_questions.len(), 1);
        assert_eq!(result.thinking_process, "consider context");
        assert_eq!(result.answer, "Lifetimes bound references.");
        assert!(result.full_response.starts_with("<think>"));
        assert!(result.rendered_prompt.contains("Title: Lifetimes Explained"));
        assert!(result.rendered_prompt.contains("User question: what are lifetimes"));
        assert_eq!(backend.prompts(), vec![result.rendered_prompt.clone()]);
    }

    #[tokio::test]
    async fn test_advanced_search_without_thinking() {
        let backend = MockInferenceBackend::new()
            .with_dimension(DIM)
            .with_fixed_response("Plain answer.");
        let store = seeded(&backend).await;

        let result = rag(&store, &backend).search("anything").await.unwrap();
        assert_eq!(result.thinking_process, "");
        assert_eq!(result.answer, "Plain answer.");
    }

    #[tokio::test]
    async fn test_configured_template_overrides_default() {
        let backend = MockInferenceBackend::new().with_dimension(DIM);
        let store = seeded(&backend).await;
        store
            .set_value(
                defaults::SEARCH_PROMPT_TEMPLATE_KEY,
                "Q={{.UserQuestion}}{{range .RetrievedItems}}|{{.ID}}:{{.Question}}{{end}}",
                false,
            )
            .await
            .unwrap();

        let result = rag(&store, &backend)
            .search("what are lifetimes")
            .await
            .unwrap();
        assert_eq!(
            result.rendered_prompt,
            "Q=what are lifetimes|1:What are lifetimes?"
        );
    }

    #[tokio::test]
    async fn test_broken_template_is_template_error() {
        let backend = MockInferenceBackend::new().with_dimension(DIM);
        let store = seeded(&backend).await;
        store
            .set_value(defaults::SEARCH_PROMPT_TEMPLATE_KEY, "{{range .RetrievedItems}}", false)
            .await
            .unwrap();

        let result = rag(&store, &backend).search("q").await;
        assert!(matches!(result, Err(Error::Template(_))));
        assert_eq!(backend.generate_call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_embedding_fails_before_generation() {
        let backend = MockInferenceBackend::new().with_empty_embeddings();
        let store = InMemoryStore::new();

        let result = rag(&store, &backend).search("q").await;
        assert!(matches!(result, Err(Error::Embedding(_))));
        assert_eq!(backend.generate_call_count(), 0);
    }

    #[tokio::test]
    async fn test_generation_failure_surfaces() {
        let backend = MockInferenceBackend::new()
            .with_dimension(DIM)
            .with_generation_failure();
        let store = seeded(&backend).await;

        let result = rag(&store, &backend).search("q").await;
        assert!(matches!(result, Err(Error::Inference(_))));
    }
}
