//! `reader` extraction: pick the main article of a page and render it as
//! Markdown under a title line.

use async_trait::async_trait;
use dom_smoothie::Readability;
use tracing::{debug, instrument};
use url::Url;

use garden_core::defaults;
use garden_core::{ContentExtractor, Error, ExtractionStrategy, Result};

/// Readability extractor producing Markdown.
#[derive(Debug, Clone, Default)]
pub struct ReaderExtractor;

impl ReaderExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContentExtractor for ReaderExtractor {
    fn strategy(&self) -> ExtractionStrategy {
        ExtractionStrategy::Reader
    }

    #[instrument(skip(self, body), fields(subsystem = "ingest", component = "reader", op = "extract", body_len = body.len()))]
    async fn extract(&self, body: &[u8], url: &str) -> Result<String> {
        let html = String::from_utf8_lossy(body);
        if url.ends_with("README.md") {
            debug!("README passthrough");
            return Ok(html.into_owned());
        }
        extract_markdown(&html, url)
    }
}

/// Render the main content of `html` as Markdown.
///
/// With a URL the output is `# <title>\n(extracted from **<url>**)\n\n<md>`,
/// without one `# <title>\n\n<md>`.
pub fn extract_markdown(html: &str, url: &str) -> Result<String> {
    let url = url.trim();
    let base = Url::parse(url)
        .or_else(|_| Url::parse(defaults::READER_FALLBACK_URL))
        .map_err(|e| Error::Extraction(format!("invalid base url: {}", e)))?;

    let mut readability = Readability::new(html, Some(base.as_str()), None)
        .map_err(|e| Error::Extraction(format!("readability: {}", e)))?;
    let article = readability
        .parse()
        .map_err(|e| Error::Extraction(format!("no readable content found: {}", e)))?;

    let content_html = article.content.to_string();
    let mut markdown = htmd::convert(&content_html)
        .map_err(|e| Error::Extraction(format!("markdown conversion: {}", e)))?
        .trim()
        .to_string();

    // Pages without a usable <title> take their first heading instead.
    let mut title = collapse_whitespace(&article.title);
    if title.is_empty() {
        title = leading_heading(&markdown).unwrap_or_default();
    }
    if !title.is_empty() {
        markdown = drop_leading_heading(&markdown, &title);
    }

    if title.is_empty() && markdown.is_empty() {
        return Err(Error::Extraction("no readable content found".to_string()));
    }

    let output = if url.is_empty() {
        format!("# {}\n\n{}", title, markdown)
    } else {
        format!("# {}\n(extracted from **{}**)\n\n{}", title, url, markdown)
    };
    debug!(title = %title, markdown_len = markdown.len(), "Reader extraction complete");
    Ok(output)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text of an ATX heading on the first line, at any level.
fn leading_heading(markdown: &str) -> Option<String> {
    let first = markdown.lines().next()?;
    let text = first.trim_start_matches('#');
    if text.len() == first.len() || !text.starts_with(' ') {
        return None;
    }
    Some(collapse_whitespace(text)).filter(|t| !t.is_empty())
}

fn drop_leading_heading(markdown: &str, title: &str) -> String {
    match leading_heading(markdown) {
        Some(heading) if heading == title => markdown
            .split_once('\n')
            .map(|(_, rest)| rest.trim_start().to_string())
            .unwrap_or_default(),
        _ => markdown.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE_HTML: &str = "<html><head><title>Example Article</title></head><body><article><h1>Example Article</h1><p>First paragraph.</p><p>Second paragraph.</p></article></body></html>";

    /// A story page with navigation, a sidebar, a sponsored teaser article
    /// and a footer around the real article.
    const STORY_HTML: &str = r#"<html><head><title>Real Story</title></head><body>
        <nav class="menu" role="navigation"><ul>
            <li><a href="/">Home</a></li><li><a href="/world">World</a></li><li><a href="/sport">Sport</a></li>
        </ul></nav>
        <aside><article><p>Sponsored teaser.</p></article></aside>
        <main><article>
            <h1>Real Story</h1>
            <p>The real body paragraph with the actual article content, written at length, with several clauses, so that it reads like prose.</p>
            <p>A second paragraph continues the story, adds detail, quotes a witness, and keeps the reader going for a while longer.</p>
            <p>A third paragraph explains the background, the history, the stakes, and what is expected to happen over the coming weeks.</p>
            <p>The closing paragraph sums up the events, thanks the sources, and points to further coverage elsewhere in this publication.</p>
        </article></main>
        <div class="sidebar"><p>Popular now: ten tricks, five lists, three quizzes.</p></div>
        <footer><p>Copyright notice and legal boilerplate for the whole site.</p></footer>
        </body></html>"#;

    // =========================================================================
    // OUTPUT FORMAT
    // =========================================================================

    #[test]
    fn test_reader_with_url() {
        let out = extract_markdown(ARTICLE_HTML, "https://example.com/article").unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "# Example Article");
        assert_eq!(lines[1], "(extracted from **https://example.com/article**)");
        assert_eq!(lines[2], "");
        assert_eq!(lines[3], "First paragraph.");
        assert!(out.contains("Second"));
    }

    #[test]
    fn test_reader_without_url() {
        let out = extract_markdown(ARTICLE_HTML, "").unwrap();
        assert!(out.starts_with("# Example Article\n\nFirst paragraph."));
        assert!(!out.contains("(extracted from"));
    }

    #[tokio::test]
    async fn test_readme_passthrough() {
        let body = b"# Project\n\nRaw *markdown* body";
        let out = ReaderExtractor::new()
            .extract(body, "https://github.com/acme/project/blob/main/README.md")
            .await
            .unwrap();
        assert_eq!(out.as_bytes(), body);
    }

    #[test]
    fn test_title_falls_back_to_heading() {
        let html = "<html><body><main><h1>Only Heading</h1><p>Body text.</p></main></body></html>";
        let out = extract_markdown(html, "").unwrap();
        assert!(out.starts_with("# Only Heading\n\n"));
        assert!(out.contains("Body text."));
        assert_eq!(out.matches("Only Heading").count(), 1);
    }

    #[test]
    fn test_empty_document_errors() {
        let result = extract_markdown("<html><body></body></html>", "");
        assert!(matches!(result, Err(Error::Extraction(_))));
    }

    // =========================================================================
    // CONTENT SELECTION
    // =========================================================================

    #[test]
    fn test_teaser_article_does_not_win() {
        let out = extract_markdown(STORY_HTML, "https://example.com/story").unwrap();
        assert!(out.starts_with("# Real Story\n(extracted from **https://example.com/story**)\n\n"));
        assert!(out.contains("actual article content"));
        assert!(out.contains("The closing paragraph"));
        assert!(!out.contains("Sponsored teaser"));
    }

    #[test]
    fn test_navigation_sidebar_and_footer_are_dropped() {
        let out = extract_markdown(STORY_HTML, "").unwrap();
        assert!(out.contains("A third paragraph explains the background"));
        assert!(!out.contains("World"));
        assert!(!out.contains("Popular now"));
        assert!(!out.contains("Copyright notice"));
    }

    #[test]
    fn test_densest_block_wins_without_article_markup() {
        let html = r#"<html><head><title>Plain Page</title></head><body>
            <div id="header"><p>Welcome to the site, please log in.</p></div>
            <div id="body-text">
                <p>A long paragraph of real article text, with commas, clauses, and enough words to count as content.</p>
                <p>Another paragraph of the same story, also long enough, also carrying commas, to be scored as prose.</p>
                <p>One more paragraph so that this block clearly outweighs the short greeting shown above it.</p>
            </div>
            </body></html>"#;
        let out = extract_markdown(html, "").unwrap();
        assert!(out.contains("A long paragraph of real article text"));
        assert!(!out.contains("please log in"));
    }

    #[test]
    fn test_scripts_are_dropped() {
        let html = "<html><head><title>T</title><script>var tracker = 1;</script></head><body><article>\
            <script>var x = 1;</script>\
            <p>Kept paragraph with enough text to be scored as the main content of the page.</p>\
            </article></body></html>";
        let out = extract_markdown(html, "").unwrap();
        assert!(out.contains("Kept paragraph"));
        assert!(!out.contains("var x"));
        assert!(!out.contains("tracker"));
    }

    // =========================================================================
    // MARKDOWN RENDERING
    // =========================================================================

    #[test]
    fn test_links_resolve_against_url() {
        let html = r#"<html><head><title>T</title></head><body><article><p>See <a href="/docs">the docs</a> for the full reference of every option.</p></article></body></html>"#;
        let out = extract_markdown(html, "https://example.com/post").unwrap();
        assert!(out.contains("[the docs](https://example.com/docs)"));
    }

    #[test]
    fn test_links_resolve_against_fallback_host() {
        let html = r#"<html><head><title>T</title></head><body><article><p>Read <a href="/x">x</a> before anything else on this page.</p></article></body></html>"#;
        let out = extract_markdown(html, "not a url").unwrap();
        assert!(out.contains("[x](https://example.com/x)"));
        assert!(out.contains("(extracted from **not a url**)"));
    }

    #[test]
    fn test_inline_markup_survives() {
        let html = "<html><head><title>T</title></head><body><article>\
            <p>Use <strong>bold</strong> text and run <code>cargo</code> from the project root directory.</p>\
            </article></body></html>";
        let out = extract_markdown(html, "").unwrap();
        assert!(out.contains("**bold**"));
        assert!(out.contains("`cargo`"));
    }

    #[test]
    fn test_leading_heading_any_level() {
        assert_eq!(leading_heading("# T\n\nbody").as_deref(), Some("T"));
        assert_eq!(leading_heading("## Part two\nbody").as_deref(), Some("Part two"));
        assert_eq!(leading_heading("#hashtag").as_deref(), None);
        assert_eq!(leading_heading("plain").as_deref(), None);
    }

    #[test]
    fn test_drop_leading_heading_only_when_equal() {
        assert_eq!(drop_leading_heading("# T\n\nbody", "T"), "body");
        assert_eq!(drop_leading_heading("## T\n\nbody", "T"), "body");
        assert_eq!(drop_leading_heading("# Other\n\nbody", "T"), "# Other\n\nbody");
        assert_eq!(drop_leading_heading("T\n\nbody", "T"), "T\n\nbody");
    }
}
