//! Parsing of `<think>...</think>` reasoning spans in model responses.
//!
//! Reasoning models may prefix their answer with an internal monologue
//! wrapped in `<think>` tags. Only the first span is treated as thinking;
//! the match is non-greedy, case-sensitive, and spans newlines.

use once_cell::sync::Lazy;
use regex::Regex;

static THINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<think>(.*?)</think>").expect("think pattern is valid"));

/// Result of parsing a model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThinkingResponse {
    /// Trimmed content of the first `<think>` span, if any.
    pub thinking_content: Option<String>,
    /// The response without that span, trimmed.
    pub answer_content: String,
}

/// Split a response into thinking and answer.
///
/// Without a span the full response is the answer. When removing the span
/// leaves nothing, the full response is the answer as well.
///
/// # Examples
///
/// ```
/// use garden_inference::thinking::parse_thinking_response;
///
/// let parsed = parse_thinking_response("<think>weigh options</think>\nFinal: go north.");
/// assert_eq!(parsed.thinking_content.as_deref(), Some("weigh options"));
/// assert_eq!(parsed.answer_content, "Final: go north.");
/// ```
pub fn parse_thinking_response(response: &str) -> ThinkingResponse {
    let Some(caps) = THINK_RE.captures(response) else {
        return ThinkingResponse {
            thinking_content: None,
            answer_content: response.to_string(),
        };
    };

    let thinking = caps.get(1).map(|m| m.as_str().trim().to_string());
    let answer = THINK_RE.replacen(response, 1, "").trim().to_string();

    ThinkingResponse {
        thinking_content: thinking,
        answer_content: if answer.is_empty() {
            response.to_string()
        } else {
            answer
        },
    }
}

/// Remove the first `<think>` span and trim.
pub fn strip_thinking(text: &str) -> String {
    THINK_RE.replacen(text, 1, "").trim().to_string()
}
