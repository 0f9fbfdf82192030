//! Article summarization through a [`GenerationBackend`].

use std::sync::Arc;

use tracing::{debug, instrument};

use garden_core::{defaults, GenerationBackend, Result};

use crate::thinking::strip_thinking;

/// Build the summarization prompt for an article.
pub fn summary_prompt(content: &str, url: &str, max_words: usize) -> String {
    format!(
        "I have read the following article of url {}:\n\n\n===\n{}\n\n===\nNow, what would be your summary of this article? Please use less than {} words",
        url, content, max_words
    )
}

/// Asks the generation model for a bounded-length summary.
#[derive(Clone)]
pub struct Summarizer {
    backend: Arc<dyn GenerationBackend>,
}

impl Summarizer {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    /// Summarize `content` in fewer than `max_words` words.
    ///
    /// The first `<think>` span is removed and the result trimmed.
    #[instrument(skip(self, content), fields(subsystem = "inference", component = "summarizer", op = "summarize", word_count = max_words, model = self.backend.model_name()))]
    pub async fn summarize(&self, content: &str, url: &str, max_words: usize) -> Result<String> {
        let prompt = summary_prompt(content, url, max_words);
        let response = self.backend.generate(&prompt).await?;
        let summary = strip_thinking(&response);
        debug!(response_len = summary.len(), "Summary generated");
        Ok(summary)
    }

    /// Summarize with the default budget of
    /// [`SUMMARY_DEFAULT_WORDS`](defaults::SUMMARY_DEFAULT_WORDS) words.
    pub async fn summarize_default(&self, content: &str, url: &str) -> Result<String> {
        self.summarize(content, url, defaults::SUMMARY_DEFAULT_WORDS)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockInferenceBackend;
    use garden_core::Error;

    #[test]
    fn test_summary_prompt_layout() {
        let prompt = summary_prompt("Body text", "https://a.test/x", 300);
        assert_eq!(
            prompt,
            "I have read the following article of url https://a.test/x:\n\n\n===\nBody text\n\n===\nNow, what would be your summary of this article? Please use less than 300 words"
        );
    }

    #[tokio::test]
    async fn test_summarize_strips_thinking() {
        let backend = Arc::new(
            MockInferenceBackend::new().with_fixed_response("<think>planning</think>\n  The gist.  "),
        );
        let summarizer = Summarizer::new(backend.clone());
        let summary = summarizer.summarize("content", "u", 250).await.unwrap();
        assert_eq!(summary, "The gist.");
        assert!(backend.prompts()[0].ends_with("less than 250 words"));
    }

    #[tokio::test]
    async fn test_summarize_default_asks_for_400_words() {
        let backend = Arc::new(MockInferenceBackend::new().with_fixed_response("Short."));
        let summarizer = Summarizer::new(backend.clone());
        let summary = summarizer
            .summarize_default("content", "https://a.test/y")
            .await
            .unwrap();
        assert_eq!(summary, "Short.");
        assert!(backend.prompts()[0].ends_with("less than 400 words"));
    }

    #[tokio::test]
    async fn test_summarize_propagates_failure() {
        let backend = Arc::new(MockInferenceBackend::new().with_generation_failure());
        let summarizer = Summarizer::new(backend);
        assert!(matches!(
            summarizer.summarize("c", "u", 300).await,
            Err(Error::Inference(_))
        ));
    }
}
