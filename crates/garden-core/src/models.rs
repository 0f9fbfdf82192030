//! Core data models for garden.
//!
//! These types are shared across all garden crates and represent the
//! bookmark ingestion, retrieval, feedback, and note/entity domains.

use chrono::{DateTime, Utc};
use pgvector::Vector;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

// =============================================================================
// STRATEGY NAMES
// =============================================================================

/// Strategy names that key processed content and embedding chunks.
pub mod strategy {
    /// Terminal-renderer dump.
    pub const LYNX: &str = "lynx";
    /// Readability extraction rendered as Markdown.
    pub const READER: &str = "reader";
    /// Chunked embeddings of the reader content.
    pub const CHUNKED_READER: &str = "chunked-reader";
    /// Single embedding of an LLM summary of the reader content.
    pub const SUMMARY_READER: &str = "summary-reader";
    /// Question/answer passages generated from bookmark content.
    pub const QA_V2_PASSAGE: &str = "qa-v2-passage";
}

/// Extraction strategy applied to a fetched page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStrategy {
    Lynx,
    Reader,
}

impl ExtractionStrategy {
    /// Strategy name under which processed content is stored.
    pub fn name(&self) -> &'static str {
        match self {
            ExtractionStrategy::Lynx => strategy::LYNX,
            ExtractionStrategy::Reader => strategy::READER,
        }
    }
}

impl std::fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// BOOKMARK TYPES
// =============================================================================

/// A persisted URL reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bookmark {
    pub id: Uuid,
    pub url: String,
    pub creation_date: DateTime<Utc>,
}

/// Bookmark with its canonical title and summary, for lists and similarity hits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmarkWithTitle {
    pub id: Uuid,
    pub url: String,
    pub creation_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Request to create a bookmark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookmarkRequest {
    pub url: String,
}

/// A bookmark ranked by vector similarity to a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarBookmark {
    #[serde(flatten)]
    pub bookmark: BookmarkWithTitle,
    pub similarity: f64,
}

/// Filters for the paginated bookmark list.
#[derive(Debug, Clone, Default)]
pub struct ListBookmarksRequest {
    /// Case-insensitive substring over URL and title.
    pub search: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

/// Everything the core has derived for one bookmark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmarkDetails {
    pub id: Uuid,
    pub url: String,
    pub creation_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lynx: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reader: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub questions: Vec<BookmarkQuestion>,
}

/// A Q&A pair derived from bookmark content, stored as `"question?\nanswer"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookmarkQuestion {
    pub id: Uuid,
    pub content: String,
}

impl BookmarkQuestion {
    /// Question half of the stored content.
    pub fn question(&self) -> &str {
        split_question_answer(&self.content).0
    }

    /// Answer half of the stored content (empty when there is no newline).
    pub fn answer(&self) -> &str {
        split_question_answer(&self.content).1
    }
}

/// Split stored Q&A content on the first newline.
pub fn split_question_answer(content: &str) -> (&str, &str) {
    match content.split_once('\n') {
        Some((question, answer)) => (question, answer),
        None => (content, ""),
    }
}

/// Compose stored Q&A content from its halves.
pub fn compose_question_answer(question: &str, answer: &str) -> String {
    format!("{}?\n{}", question, answer)
}

/// One stored HTTP response for a bookmark.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpResponseRecord {
    pub id: Uuid,
    pub bookmark_id: Uuid,
    pub status_code: i32,
    /// Header map serialized as a JSON object of first values.
    pub headers: String,
    pub content: Vec<u8>,
    pub fetch_date: DateTime<Utc>,
}

impl HttpResponseRecord {
    /// Lowercased `Content-Type`, looked up case-insensitively.
    ///
    /// Returns `Ok(None)` when the header is absent and an error when the
    /// stored header map is not a JSON object.
    pub fn content_type(&self) -> crate::Result<Option<String>> {
        let map: serde_json::Map<String, JsonValue> = serde_json::from_str(&self.headers)
            .map_err(|e| crate::Error::Serialization(format!("failed to parse headers: {}", e)))?;
        Ok(map
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
            .and_then(|(_, v)| v.as_str())
            .map(|v| v.to_lowercase()))
    }

    /// True when the stored content may be handed to an extractor.
    pub fn is_textual(&self) -> crate::Result<bool> {
        let content_type = self.content_type()?.unwrap_or_default();
        Ok(content_type.contains("text") || content_type.contains("html"))
    }
}

/// Raw result of one outbound fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    pub status_code: i32,
    pub headers: String,
    pub content: Vec<u8>,
}

/// Result of the fetch stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResult {
    pub status_code: i32,
    pub headers: String,
    pub content: String,
    pub message: String,
}

/// Result of a process (lynx/reader) stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessingResult {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Result of the embed-chunks stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResult {
    pub ids: Vec<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Result of the summary-embedding stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryEmbeddingResult {
    pub ids: Vec<Uuid>,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// A text fragment with its embedding, as produced by the chunked embedder.
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub text: String,
    pub vector: Vector,
}

/// Where a bookmark title came from.
///
/// Sources are totally ordered by trust: externally supplied titles beat
/// reader titles, which beat HTML `<title>` titles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum TitleSource {
    /// Title extracted by the reader strategy.
    Reader,
    /// Title matched in the raw HTML.
    Html,
    /// Any other, externally supplied, source tag.
    External(String),
}

impl TitleSource {
    pub fn as_str(&self) -> &str {
        match self {
            TitleSource::Reader => "reader-title",
            TitleSource::Html => "html-title",
            TitleSource::External(tag) => tag,
        }
    }

    /// Higher rank means more trusted.
    pub fn rank(&self) -> u8 {
        match self {
            TitleSource::Html => 0,
            TitleSource::Reader => 1,
            TitleSource::External(_) => 2,
        }
    }
}

impl From<String> for TitleSource {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "reader-title" => TitleSource::Reader,
            "html-title" => TitleSource::Html,
            _ => TitleSource::External(tag),
        }
    }
}

impl From<TitleSource> for String {
    fn from(source: TitleSource) -> Self {
        source.as_str().to_string()
    }
}

/// Inputs to title resolution, gathered in one read.
#[derive(Debug, Clone, Default)]
pub struct TitleData {
    pub existing_title: Option<String>,
    pub reader_content: Option<String>,
    pub raw_content: Option<Vec<u8>>,
}

/// Result of the resolve-title stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleResolution {
    pub bookmark: Bookmark,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<TitleSource>,
}

/// Request to rewrite one Q&A pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateQuestionRequest {
    pub reference_id: Uuid,
    #[serde(default)]
    pub previous_question: String,
    #[serde(default)]
    pub previous_answer: String,
    pub new_question: String,
    pub new_answer: String,
}

/// Request to delete one Q&A pair; question/answer are kept for the audit trail.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteQuestionRequest {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
}

/// Audit payload of a `qa-edit` observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QaEditPayload {
    pub bookmark_id: Uuid,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub previous_question: String,
    pub previous_answer: String,
    pub new_question: String,
    pub new_answer: String,
    pub timestamp: DateTime<Utc>,
}

/// Audit payload of a `qa-delete` observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QaDeletePayload {
    pub bookmark_id: Uuid,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub question: String,
    pub answer: String,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of one bookmark in a batch catch-up run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatchUpOutcome {
    pub bookmark_id: Uuid,
    pub stage: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// =============================================================================
// SEARCH TYPES
// =============================================================================

/// Weights of the hybrid score terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchWeights {
    pub exact_match: f64,
    pub similarity: f64,
    pub recency: f64,
}

impl Default for SearchWeights {
    fn default() -> Self {
        Self {
            exact_match: crate::defaults::SEARCH_EXACT_MATCH_WEIGHT,
            similarity: crate::defaults::SEARCH_SIMILARITY_WEIGHT,
            recency: crate::defaults::SEARCH_RECENCY_WEIGHT,
        }
    }
}

/// One row of a hybrid search across artifact kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedSearchResult {
    /// Artifact kind: "bookmark", "note", or "entity".
    pub item_type: String,
    pub item_id: Uuid,
    pub item_title: String,
    pub last_activity: DateTime<Utc>,
    pub search_score: f64,
}

/// A Q&A fragment retrieved by vector similarity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedItem {
    /// 1-based rank within the result set.
    pub id: usize,
    pub question: String,
    pub answer: String,
    pub bookmark_id: Uuid,
    pub bookmark_title: String,
    pub bookmark_url: String,
    /// Same as `bookmark_title`, kept for older clients.
    pub title: String,
    /// Same as `bookmark_url`, kept for older clients.
    pub url: String,
    pub summary: String,
    pub similarity: f64,
    pub strategy: String,
}

/// Full result of an LLM-backed advanced search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedSearchResult {
    pub query: String,
    pub query_string: String,
    pub similar_questions: Vec<RetrievedItem>,
    pub rendered_prompt: String,
    pub thinking_process: String,
    pub full_response: String,
    pub answer: String,
}

// =============================================================================
// OBSERVATION TYPES
// =============================================================================

/// Observation type, source, and tag values written by the core.
pub mod observation {
    pub const TYPE_QA_FEEDBACK: &str = "qa-feedback";
    pub const TYPE_QA_EDIT: &str = "qa-edit";
    pub const TYPE_QA_DELETE: &str = "qa-delete";

    pub const SOURCE_USER_FEEDBACK: &str = "user-feedback";
    pub const SOURCE_USER_EDIT: &str = "user-edit";
    pub const SOURCE_USER_DELETE: &str = "user-delete";

    pub const TAGS_QA_EDIT: &str = "edit,question,answer";
    pub const TAGS_QA_DELETE: &str = "delete,question,answer";
}

/// An append-only audit or feedback record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub id: Uuid,
    pub data: JsonValue,
    #[serde(rename = "type")]
    pub observation_type: Option<String>,
    pub source: Option<String>,
    /// Comma separated.
    pub tags: Option<String>,
    pub parent: Option<Uuid>,
    #[serde(rename = "ref")]
    pub ref_id: Option<Uuid>,
    pub creation_date: DateTime<Utc>,
}

/// Observation to append.
#[derive(Debug, Clone)]
pub struct NewObservation {
    pub data: JsonValue,
    pub observation_type: String,
    pub source: String,
    pub tags: String,
    pub parent: Option<Uuid>,
    pub ref_id: Option<Uuid>,
}

/// User reaction to a retrieved Q&A fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackType {
    Upvote,
    Downvote,
    Trash,
}

impl FeedbackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackType::Upvote => "upvote",
            FeedbackType::Downvote => "downvote",
            FeedbackType::Trash => "trash",
        }
    }

    /// Tag list recorded on the observation.
    pub fn tags(&self) -> String {
        format!("feedback,{}", self.as_str())
    }
}

impl std::fmt::Display for FeedbackType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a `qa-feedback` observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackData {
    pub question: String,
    pub answer: String,
    pub bookmark_id: Uuid,
    pub user_question: String,
    pub similarity: f64,
    pub feedback_type: FeedbackType,
    pub timestamp: DateTime<Utc>,
}

/// Request to record feedback on a retrieved fragment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreFeedbackRequest {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
    pub bookmark_id: Uuid,
    #[serde(default)]
    pub reference_id: Option<Uuid>,
    #[serde(default)]
    pub user_question: String,
    #[serde(default)]
    pub similarity: f64,
    pub feedback_type: FeedbackType,
    #[serde(default)]
    pub delete_ref: bool,
}

/// Aggregated feedback counts for one bookmark.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackStats {
    pub upvotes: i64,
    pub downvotes: i64,
    pub trash: i64,
}

// =============================================================================
// ENTITY TYPES
// =============================================================================

/// Entity type assigned to entities created from `[[...]]` references.
pub const ENTITY_TYPE_GENERAL: &str = "general";

/// Entity type of the companion entity recorded for each note.
pub const ENTITY_TYPE_NOTE: &str = "note";

/// Source type recorded on references found in note bodies.
pub const SOURCE_TYPE_NOTE: &str = "note";

/// A node of the knowledge graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub description: Option<String>,
    pub properties: JsonValue,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Request to create an entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEntityRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: Option<JsonValue>,
}

/// A recorded mention of an entity inside some source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityReference {
    pub id: Uuid,
    pub source_type: String,
    pub source_id: Uuid,
    pub entity_id: Uuid,
    pub reference_text: String,
    pub position: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// A reference to insert for a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntityReference {
    pub entity_id: Uuid,
    pub reference_text: String,
    pub position: Option<i32>,
}

// =============================================================================
// NOTE TYPES
// =============================================================================

/// A stored note. `contents` holds the storage form (`[[<entity-id>]]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub title: Option<String>,
    pub slug: Option<String>,
    pub contents: Option<String>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

/// A note with tags, companion entity, and its display rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteFull {
    #[serde(flatten)]
    pub note: Note,
    pub tags: Vec<String>,
    pub entity_id: Option<Uuid>,
    /// Contents with references rewritten to `[name](/entities/<id>)` links.
    pub display_contents: Option<String>,
}

/// A note row in list views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteListItem {
    pub id: Uuid,
    pub title: Option<String>,
    pub tags: Vec<String>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

/// Request to create a note.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateNoteRequest {
    pub title: String,
    #[serde(default)]
    pub contents: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Request to update a note. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateNoteRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub contents: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// A tag that can be bound to notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

// =============================================================================
// CONFIGURATION TYPES
// =============================================================================

/// One runtime configuration entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationEntry {
    pub key: String,
    pub value: String,
    pub is_secret: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConfigurationEntry {
    /// Copy safe to return to clients: secret values are masked.
    pub fn masked(mut self) -> Self {
        if self.is_secret {
            self.value = crate::defaults::SECRET_MASK.to_string();
        }
        self
    }
}

/// Request to upsert a configuration entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetConfigurationRequest {
    pub value: String,
    #[serde(default)]
    pub is_secret: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_with_headers(headers: &str) -> HttpResponseRecord {
        HttpResponseRecord {
            id: Uuid::nil(),
            bookmark_id: Uuid::nil(),
            status_code: 200,
            headers: headers.to_string(),
            content: Vec::new(),
            fetch_date: Utc::now(),
        }
    }

    // =========================================================================
    // Q&A content
    // =========================================================================

    #[test]
    fn test_split_question_answer_on_first_newline() {
        let (q, a) = split_question_answer("What is Rust?\nA language.\nWith lines.");
        assert_eq!(q, "What is Rust?");
        assert_eq!(a, "A language.\nWith lines.");
    }

    #[test]
    fn test_split_question_answer_without_newline() {
        let (q, a) = split_question_answer("Only a question?");
        assert_eq!(q, "Only a question?");
        assert_eq!(a, "");
    }

    #[test]
    fn test_compose_question_answer() {
        assert_eq!(
            compose_question_answer("Why", "Because."),
            "Why?\nBecause."
        );
    }

    #[test]
    fn test_bookmark_question_accessors() {
        let q = BookmarkQuestion {
            id: Uuid::nil(),
            content: "Who?\nThem.".to_string(),
        };
        assert_eq!(q.question(), "Who?");
        assert_eq!(q.answer(), "Them.");
    }

    // =========================================================================
    // HTTP response headers
    // =========================================================================

    #[test]
    fn test_content_type_lookup_is_case_insensitive() {
        let resp = response_with_headers(r#"{"CONTENT-TYPE":"Text/HTML; charset=utf-8"}"#);
        assert_eq!(
            resp.content_type().unwrap().as_deref(),
            Some("text/html; charset=utf-8")
        );
        assert!(resp.is_textual().unwrap());
    }

    #[test]
    fn test_binary_content_is_not_textual() {
        let resp = response_with_headers(r#"{"Content-Type":"application/pdf"}"#);
        assert!(!resp.is_textual().unwrap());
    }

    #[test]
    fn test_missing_content_type_is_not_textual() {
        let resp = response_with_headers("{}");
        assert_eq!(resp.content_type().unwrap(), None);
        assert!(!resp.is_textual().unwrap());
    }

    #[test]
    fn test_malformed_headers_error() {
        let resp = response_with_headers("not json");
        assert!(matches!(
            resp.content_type(),
            Err(crate::Error::Serialization(_))
        ));
    }

    // =========================================================================
    // Title sources
    // =========================================================================

    #[test]
    fn test_title_source_round_trip_tags() {
        assert_eq!(TitleSource::from("reader-title".to_string()), TitleSource::Reader);
        assert_eq!(TitleSource::from("html-title".to_string()), TitleSource::Html);
        assert_eq!(
            TitleSource::from("pocket".to_string()),
            TitleSource::External("pocket".to_string())
        );
    }

    #[test]
    fn test_title_source_trust_order() {
        let external = TitleSource::External("import".to_string());
        assert!(external.rank() > TitleSource::Reader.rank());
        assert!(TitleSource::Reader.rank() > TitleSource::Html.rank());
    }

    // =========================================================================
    // Serialized shapes
    // =========================================================================

    #[test]
    fn test_feedback_type_tags() {
        assert_eq!(FeedbackType::Trash.tags(), "feedback,trash");
        assert_eq!(FeedbackType::Upvote.tags(), "feedback,upvote");
    }

    #[test]
    fn test_feedback_data_uses_camel_case() {
        let data = FeedbackData {
            question: "q".into(),
            answer: "a".into(),
            bookmark_id: Uuid::nil(),
            user_question: "u".into(),
            similarity: 0.71,
            feedback_type: FeedbackType::Downvote,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&data).unwrap();
        for key in [
            "question",
            "answer",
            "bookmarkId",
            "userQuestion",
            "similarity",
            "feedbackType",
            "timestamp",
        ] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(json["feedbackType"], "downvote");
    }

    #[test]
    fn test_advanced_search_result_field_names() {
        let result = AdvancedSearchResult {
            query: "q".into(),
            query_string: "q".into(),
            similar_questions: vec![],
            rendered_prompt: "p".into(),
            thinking_process: String::new(),
            full_response: "r".into(),
            answer: "r".into(),
        };
        let json = serde_json::to_value(&result).unwrap();
        for key in [
            "query",
            "queryString",
            "similarQuestions",
            "renderedPrompt",
            "thinkingProcess",
            "fullResponse",
            "answer",
        ] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
    }

    #[test]
    fn test_store_feedback_request_defaults() {
        let req: StoreFeedbackRequest = serde_json::from_str(
            r#"{"bookmark_id":"00000000-0000-0000-0000-000000000000","feedback_type":"trash"}"#,
        )
        .unwrap();
        assert_eq!(req.feedback_type, FeedbackType::Trash);
        assert!(!req.delete_ref);
        assert!(req.reference_id.is_none());
    }

    #[test]
    fn test_configuration_entry_masking() {
        let entry = ConfigurationEntry {
            key: "ai.key".into(),
            value: "sk-123".into(),
            is_secret: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(entry.masked().value, crate::defaults::SECRET_MASK);
    }
}
