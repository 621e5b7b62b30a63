use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::{ChunkStream, ContentTransport, GistRecord, ListingPage, ListingTransport};
use crate::errors::{FetchError, ListingError};
use crate::gist::PageCursor;

const CURSOR_PREFIX: &str = "page:";

#[derive(Debug, Clone)]
enum FileFixture {
    Body(Vec<u8>),
    Chunks(Vec<Vec<u8>>),
    Failure(FetchError),
}

/// In-memory listing and content transport.
///
/// Pages are served in the order they were added per user; an unknown user
/// is reported as not found and an unknown raw URL as HTTP 404. Every call
/// is counted so callers can assert what was (or was not) requested.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    pages: HashMap<String, Vec<Result<Vec<GistRecord>, ListingError>>>,
    files: HashMap<String, FileFixture>,
    latencies: HashMap<String, Duration>,
    listing_latency: Duration,
    listing_calls: AtomicUsize,
    body_calls: AtomicUsize,
    stream_calls: AtomicUsize,
    active_fetches: AtomicUsize,
    peak_fetches: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a listing page for `username`
    pub fn with_page(mut self, username: &str, gists: Vec<GistRecord>) -> Self {
        self.pages
            .entry(username.to_string())
            .or_default()
            .push(Ok(gists));
        self
    }

    /// Appends a page for `username` that fails with `error`
    pub fn with_failing_page(mut self, username: &str, error: ListingError) -> Self {
        self.pages
            .entry(username.to_string())
            .or_default()
            .push(Err(error));
        self
    }

    /// Serves `body` for `raw_url`; streams split it by the requested size
    pub fn with_file(mut self, raw_url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.files
            .insert(raw_url.to_string(), FileFixture::Body(body.into()));
        self
    }

    /// Serves `raw_url` as exactly these chunks when streamed
    pub fn with_chunked_file<C: Into<Vec<u8>>>(
        mut self,
        raw_url: &str,
        chunks: impl IntoIterator<Item = C>,
    ) -> Self {
        let chunks = chunks.into_iter().map(Into::into).collect();
        self.files
            .insert(raw_url.to_string(), FileFixture::Chunks(chunks));
        self
    }

    /// Fails every fetch of `raw_url` with `error`
    pub fn with_failing_file(mut self, raw_url: &str, error: FetchError) -> Self {
        self.files
            .insert(raw_url.to_string(), FileFixture::Failure(error));
        self
    }

    /// Delays every fetch of `raw_url`
    pub fn with_latency(mut self, raw_url: &str, latency: Duration) -> Self {
        self.latencies.insert(raw_url.to_string(), latency);
        self
    }

    /// Delays every listing call
    pub fn with_listing_latency(mut self, latency: Duration) -> Self {
        self.listing_latency = latency;
        self
    }

    pub fn listing_calls(&self) -> usize {
        self.listing_calls.load(Ordering::SeqCst)
    }

    pub fn whole_body_calls(&self) -> usize {
        self.body_calls.load(Ordering::SeqCst)
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn content_calls(&self) -> usize {
        self.whole_body_calls() + self.stream_calls()
    }

    /// Listing plus content calls
    pub fn total_calls(&self) -> usize {
        self.listing_calls() + self.content_calls()
    }

    /// Most content fetches observed running at once
    pub fn peak_concurrent_fetches(&self) -> usize {
        self.peak_fetches.load(Ordering::SeqCst)
    }

    /// Raw URLs requested so far, in request order
    pub fn requested_urls(&self) -> Vec<String> {
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn serve(&self, raw_url: &str) -> Result<FileFixture, FetchError> {
        self.requested
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(raw_url.to_string());

        let active = self.active_fetches.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_fetches.fetch_max(active, Ordering::SeqCst);

        if let Some(latency) = self.latencies.get(raw_url) {
            tokio::time::sleep(*latency).await;
        }
        self.active_fetches.fetch_sub(1, Ordering::SeqCst);

        match self.files.get(raw_url) {
            Some(FileFixture::Failure(err)) => Err(err.clone()),
            Some(fixture) => Ok(fixture.clone()),
            None => Err(FetchError::Status(404)),
        }
    }
}

fn page_index(cursor: Option<&PageCursor>) -> Result<usize, ListingError> {
    match cursor {
        None => Ok(0),
        Some(cursor) => cursor
            .as_str()
            .strip_prefix(CURSOR_PREFIX)
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| ListingError::Decode(format!("unknown cursor {:?}", cursor.as_str()))),
    }
}

#[async_trait]
impl ListingTransport for MemoryTransport {
    async fn list_gists(
        &self,
        username: &str,
        cursor: Option<&PageCursor>,
        _per_page: u32,
    ) -> Result<ListingPage, ListingError> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        if !self.listing_latency.is_zero() {
            tokio::time::sleep(self.listing_latency).await;
        }

        let pages = self.pages.get(username).ok_or(ListingError::NotFound)?;
        let index = page_index(cursor)?;
        let Some(page) = pages.get(index) else {
            return Ok(ListingPage::default());
        };

        let gists = page.clone()?;
        let next = (index + 1 < pages.len())
            .then(|| PageCursor::new(format!("{CURSOR_PREFIX}{}", index + 1)));
        Ok(ListingPage { gists, next })
    }
}

#[async_trait]
impl ContentTransport for MemoryTransport {
    async fn fetch_body(&self, raw_url: &str) -> Result<Vec<u8>, FetchError> {
        self.body_calls.fetch_add(1, Ordering::SeqCst);
        match self.serve(raw_url).await? {
            FileFixture::Body(body) => Ok(body),
            FileFixture::Chunks(chunks) => Ok(chunks.concat()),
            FileFixture::Failure(err) => Err(err),
        }
    }

    async fn open_stream(
        &self,
        raw_url: &str,
        chunk_size: usize,
    ) -> Result<Box<dyn ChunkStream>, FetchError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        let chunks: VecDeque<Vec<u8>> = match self.serve(raw_url).await? {
            FileFixture::Body(body) => body.chunks(chunk_size.max(1)).map(<[u8]>::to_vec).collect(),
            FileFixture::Chunks(chunks) => chunks.into(),
            FileFixture::Failure(err) => return Err(err),
        };
        Ok(Box::new(VecChunkStream { chunks }))
    }
}

struct VecChunkStream {
    chunks: VecDeque<Vec<u8>>,
}

#[async_trait]
impl ChunkStream for VecChunkStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, FetchError> {
        Ok(self.chunks.pop_front())
    }
}
