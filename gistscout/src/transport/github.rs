use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, LINK};
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, trace};

use super::{ChunkStream, ContentTransport, GistRecord, ListingPage, ListingTransport};
use crate::config::SearchConfig;
use crate::errors::{FetchError, ListingError, SearchError, SearchResult};
use crate::gist::PageCursor;

static NEXT_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<([^>]+)>\s*;\s*rel="next""#).expect("link pattern is a valid regex")
});

const MAX_ERROR_EXCERPT: usize = 200;

/// GitHub REST client for gist listings and raw file content
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: Client,
    api_base_url: String,
}

impl GithubClient {
    /// Builds a client from the search configuration. Makes no request.
    pub fn new(config: &SearchConfig) -> SearchResult<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );

        let http = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SearchError::config_error(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn first_page_url(&self, username: &str, per_page: u32) -> String {
        format!(
            "{}/users/{}/gists?per_page={}",
            self.api_base_url, username, per_page
        )
    }

    async fn get_content(&self, raw_url: &str) -> Result<Response, FetchError> {
        let response = self
            .http
            .get(raw_url)
            .header(ACCEPT, "*/*")
            .send()
            .await
            .map_err(|e| FetchError::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response)
    }
}

/// Extracts the `rel="next"` target of a Link header
fn parse_next_link(link: &str) -> Option<PageCursor> {
    NEXT_LINK
        .captures(link)
        .and_then(|caps| caps.get(1))
        .and_then(|m| PageCursor::non_empty(m.as_str()))
}

async fn read_body_lossy(response: Response) -> String {
    match response.bytes().await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => String::new(),
    }
}

/// Prefers the API's `message` field, falling back to a body excerpt
fn error_message(status: StatusCode, body: &str) -> String {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.chars().take(MAX_ERROR_EXCERPT).collect());

    if message.trim().is_empty() {
        format!("HTTP {}", status)
    } else {
        message
    }
}

#[async_trait]
impl ListingTransport for GithubClient {
    async fn list_gists(
        &self,
        username: &str,
        cursor: Option<&PageCursor>,
        per_page: u32,
    ) -> Result<ListingPage, ListingError> {
        let url = match cursor {
            Some(cursor) => cursor.as_str().to_string(),
            None => self.first_page_url(username, per_page),
        };
        debug!("Listing gists: GET {}", url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ListingError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ListingError::NotFound);
        }
        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            let reset = response
                .headers()
                .get("x-ratelimit-reset")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let body = read_body_lossy(response).await;
            let mut message = error_message(status, &body);
            if let Some(reset) = reset {
                message.push_str(&format!(" (resets at {reset})"));
            }
            return Err(ListingError::RateLimited(message));
        }
        if !status.is_success() {
            let body = read_body_lossy(response).await;
            return Err(ListingError::Status {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        let next = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_next_link);

        let body = response
            .bytes()
            .await
            .map_err(|e| ListingError::Network(e.to_string()))?;
        let gists: Vec<GistRecord> =
            serde_json::from_slice(&body).map_err(|e| ListingError::Decode(e.to_string()))?;

        trace!("Decoded {} gists, next page: {:?}", gists.len(), next);
        Ok(ListingPage { gists, next })
    }
}

#[async_trait]
impl ContentTransport for GithubClient {
    async fn fetch_body(&self, raw_url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.get_content(raw_url).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::network(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn open_stream(
        &self,
        raw_url: &str,
        chunk_size: usize,
    ) -> Result<Box<dyn ChunkStream>, FetchError> {
        let response = self.get_content(raw_url).await?;
        Ok(Box::new(HttpChunkStream {
            response,
            chunk_size: chunk_size.max(1),
            buffer: Vec::new(),
            finished: false,
        }))
    }
}

/// Re-buffers network frames into fixed-size chunks
struct HttpChunkStream {
    response: Response,
    chunk_size: usize,
    buffer: Vec<u8>,
    finished: bool,
}

#[async_trait]
impl ChunkStream for HttpChunkStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, FetchError> {
        while !self.finished && self.buffer.len() < self.chunk_size {
            match self
                .response
                .chunk()
                .await
                .map_err(|e| FetchError::network(e.to_string()))?
            {
                Some(frame) => self.buffer.extend_from_slice(&frame),
                None => self.finished = true,
            }
        }

        if self.buffer.is_empty() {
            return Ok(None);
        }
        let rest = if self.buffer.len() > self.chunk_size {
            self.buffer.split_off(self.chunk_size)
        } else {
            Vec::new()
        };
        Ok(Some(std::mem::replace(&mut self.buffer, rest)))
    }
}
