//! `lynx` extraction: dump the page through the lynx terminal browser.

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use garden_core::defaults;
use garden_core::{ContentExtractor, Error, ExtractionStrategy, Result};

/// Runs `lynx -useragent=<ua> -dump <file>` over a scratch copy of the page.
#[derive(Debug, Clone)]
pub struct LynxExtractor {
    binary: String,
    timeout: Duration,
}

impl Default for LynxExtractor {
    fn default() -> Self {
        Self {
            binary: "lynx".to_string(),
            timeout: Duration::from_secs(defaults::LYNX_TIMEOUT_SECS),
        }
    }
}

impl LynxExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different executable (absolute path or name on `PATH`).
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// True when the binary can be executed.
    pub async fn is_available(&self) -> bool {
        match Command::new(&self.binary).arg("-version").output().await {
            Ok(output) => output.status.success(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl ContentExtractor for LynxExtractor {
    fn strategy(&self) -> ExtractionStrategy {
        ExtractionStrategy::Lynx
    }

    #[instrument(skip(self, body, _url), fields(subsystem = "ingest", component = "lynx", op = "extract", body_len = body.len()))]
    async fn extract(&self, body: &[u8], _url: &str) -> Result<String> {
        let mut scratch = tempfile::Builder::new()
            .prefix("bookmark-")
            .suffix(".html")
            .tempfile()
            .map_err(|e| Error::Extraction(format!("failed to create temp file: {}", e)))?;
        scratch
            .write_all(body)
            .and_then(|_| scratch.flush())
            .map_err(|e| Error::Extraction(format!("failed to write temp file: {}", e)))?;

        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.binary)
                .arg(format!("-useragent={}", defaults::LYNX_USER_AGENT))
                .arg("-dump")
                .arg(scratch.path())
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| {
            Error::Extraction(format!(
                "lynx timed out after {}s",
                self.timeout.as_secs()
            ))
        })?
        .map_err(|e| Error::Extraction(format!("failed to run lynx: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Extraction(format!(
                "lynx failed (exit {}): {}",
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(text_len = text.len(), "Lynx dump complete");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lynx_strategy() {
        assert_eq!(LynxExtractor::new().strategy(), ExtractionStrategy::Lynx);
    }

    #[tokio::test]
    async fn test_missing_binary_is_extraction_error() {
        let lynx = LynxExtractor::new().with_binary("garden-no-such-binary");
        assert!(!lynx.is_available().await);
        let result = lynx.extract(b"<html></html>", "https://example.com").await;
        assert!(matches!(result, Err(Error::Extraction(_))));
    }

    #[cfg(feature = "integration")]
    #[tokio::test]
    async fn test_lynx_dumps_text() {
        let lynx = LynxExtractor::new();
        let text = lynx
            .extract(
                b"<html><body><h1>Heading</h1><p>Paragraph text.</p></body></html>",
                "https://example.com",
            )
            .await
            .unwrap();
        assert!(text.contains("Heading"));
        assert!(text.contains("Paragraph text."));
    }
}
