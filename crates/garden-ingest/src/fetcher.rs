//! Outbound page fetcher.
//!
//! Sends browser-like headers, follows at most
//! [`defaults::FETCH_MAX_REDIRECTS`] redirects, and retries once over plain
//! HTTP when the HTTPS attempt fails on a TLS/certificate error.

use std::error::Error as StdError;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{redirect, Client};
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, instrument, warn};

use garden_core::defaults;
use garden_core::{Error, FetchResponse, PageFetcher, Result};

/// Fetches above this duration are logged as slow.
const SLOW_FETCH_MS: u64 = 10_000;

/// HTTP fetcher backed by reqwest.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(defaults::FETCH_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static(defaults::FETCH_ACCEPT));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static(defaults::FETCH_ACCEPT_LANGUAGE),
        );

        let client = Client::builder()
            .default_headers(headers)
            .redirect(redirect::Policy::limited(defaults::FETCH_MAX_REDIRECTS))
            .build()
            .map_err(|e| Error::Fetch(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    async fn fetch_once(&self, url: &str, timeout: Duration) -> std::result::Result<FetchResponse, reqwest::Error> {
        let response = self.client.get(url).timeout(timeout).send().await?;
        let status_code = response.status().as_u16() as i32;
        let headers = headers_to_json(response.headers());
        let content = response.bytes().await?.to_vec();
        Ok(FetchResponse {
            status_code,
            headers,
            content,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    #[instrument(skip(self, timeout), fields(subsystem = "ingest", component = "fetcher", op = "fetch"))]
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchResponse> {
        let start = Instant::now();
        let result = match self.fetch_once(url, timeout).await {
            Ok(response) => Ok(response),
            Err(e) if is_tls_error(&e) => match cleartext_url(url) {
                Some(fallback) => {
                    warn!(error = %e, fallback = %fallback, "TLS failure, retrying over http");
                    let remaining = timeout.saturating_sub(start.elapsed());
                    self.fetch_once(&fallback, remaining).await
                }
                None => Err(e),
            },
            Err(e) => Err(e),
        };

        let elapsed = start.elapsed().as_millis() as u64;
        match result {
            Ok(response) => {
                debug!(
                    status_code = response.status_code,
                    content_len = response.content.len(),
                    duration_ms = elapsed,
                    "Fetch complete"
                );
                if elapsed > SLOW_FETCH_MS {
                    warn!(duration_ms = elapsed, slow = true, "Slow fetch");
                }
                Ok(response)
            }
            Err(e) => Err(Error::Fetch(format!("failed to fetch: {}", error_chain(&e)))),
        }
    }
}

/// True when the error or any of its sources describes a TLS or
/// certificate failure.
pub fn is_tls_error(err: &(dyn StdError + 'static)) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        let msg = e.to_string().to_lowercase();
        if msg.contains("certificate") || msg.contains("x509") || msg.contains("tls") {
            return true;
        }
        current = e.source();
    }
    false
}

/// `https://` URL rewritten to `http://`; `None` for any other scheme.
pub fn cleartext_url(url: &str) -> Option<String> {
    url.strip_prefix("https://")
        .map(|rest| format!("http://{}", rest))
}

fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut current = err.source();
    while let Some(e) = current {
        parts.push(e.to_string());
        current = e.source();
    }
    parts.join(": ")
}

/// Header map as a JSON object holding the first value of every header,
/// keyed by canonical (`Content-Type`) names.
pub fn headers_to_json(headers: &HeaderMap) -> String {
    let mut map = Map::new();
    for name in headers.keys() {
        let key = canonical_header_name(name.as_str());
        if map.contains_key(&key) {
            continue;
        }
        if let Some(value) = headers.get(name) {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            map.insert(key, JsonValue::String(value));
        }
    }
    JsonValue::Object(map).to_string()
}

fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}
