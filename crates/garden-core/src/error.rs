//! Error types for garden.

use thiserror::Error;

/// Result type alias using garden's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for garden operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bookmark not found
    #[error("Bookmark not found: {0}")]
    BookmarkNotFound(uuid::Uuid),

    /// Entity not found
    #[error("Entity not found: {0}")]
    EntityNotFound(uuid::Uuid),

    /// Note not found
    #[error("Note not found: {0}")]
    NoteNotFound(uuid::Uuid),

    /// Outbound page fetch failed
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Content extraction (reader/lynx) failed
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Inference/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Prompt template could not be parsed or rendered
    #[error("Template error: {0}")]
    Template(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for every "lookup found nothing" variant.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_)
                | Error::BookmarkNotFound(_)
                | Error::EntityNotFound(_)
                | Error::NoteNotFound(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("test resource".to_string());
        assert_eq!(err.to_string(), "Not found: test resource");
    }

    #[test]
    fn test_error_display_bookmark_not_found() {
        let id = Uuid::nil();
        let err = Error::BookmarkNotFound(id);
        assert_eq!(err.to_string(), format!("Bookmark not found: {}", id));
    }

    #[test]
    fn test_error_display_entity_not_found() {
        let id = Uuid::nil();
        let err = Error::EntityNotFound(id);
        assert_eq!(err.to_string(), format!("Entity not found: {}", id));
    }

    #[test]
    fn test_error_display_fetch() {
        let err = Error::Fetch("failed to fetch: connection refused".to_string());
        assert_eq!(
            err.to_string(),
            "Fetch error: failed to fetch: connection refused"
        );
    }

    #[test]
    fn test_error_display_extraction() {
        let err = Error::Extraction("lynx exited with 1".to_string());
        assert_eq!(err.to_string(), "Extraction error: lynx exited with 1");
    }

    #[test]
    fn test_error_display_embedding() {
        let err = Error::Embedding("failed to generate".to_string());
        assert_eq!(err.to_string(), "Embedding error: failed to generate");
    }

    #[test]
    fn test_error_display_inference() {
        let err = Error::Inference("model timeout".to_string());
        assert_eq!(err.to_string(), "Inference error: model timeout");
    }

    #[test]
    fn test_error_display_template() {
        let err = Error::Template("unclosed range".to_string());
        assert_eq!(err.to_string(), "Template error: unclosed range");
    }

    #[test]
    fn test_error_display_invalid_input() {
        let err = Error::InvalidInput("query is required".to_string());
        assert_eq!(err.to_string(), "Invalid input: query is required");
    }

    #[test]
    fn test_error_display_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::Io(io_err);
        assert!(err.to_string().contains("I/O error:"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number");
        assert!(json_err.is_err());

        let err: Error = json_err.unwrap_err().into();
        match err {
            Error::Serialization(msg) => {
                assert!(!msg.is_empty());
            }
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_is_not_found_variants() {
        assert!(Error::NotFound("x".into()).is_not_found());
        assert!(Error::BookmarkNotFound(Uuid::nil()).is_not_found());
        assert!(Error::EntityNotFound(Uuid::nil()).is_not_found());
        assert!(Error::NoteNotFound(Uuid::nil()).is_not_found());
        assert!(!Error::InvalidInput("x".into()).is_not_found());
        assert!(!Error::Internal("x".into()).is_not_found());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
