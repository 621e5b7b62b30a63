use std::borrow::Cow;
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{trace, warn};

use super::matcher::CompiledPattern;
use crate::cache::ContentCache;
use crate::config::{EncodingMode, SearchConfig};
use crate::errors::FetchError;
use crate::gist::FileRef;
use crate::metrics::SearchMetrics;
use crate::transport::ContentTransport;

/// Helper function to decode bytes into text according to encoding mode
fn decode_bytes<'a>(
    bytes: &'a [u8],
    raw_url: &str,
    encoding_mode: EncodingMode,
) -> Result<Cow<'a, str>, FetchError> {
    match encoding_mode {
        EncodingMode::FailFast => std::str::from_utf8(bytes)
            .map(Cow::Borrowed)
            .map_err(|e| FetchError::encoding(raw_url, e.to_string())),
        EncodingMode::Lossy => {
            let cow = String::from_utf8_lossy(bytes);
            // Owned means at least one invalid sequence was replaced
            if let Cow::Owned(_) = cow {
                warn!("Invalid UTF-8 replaced in {}", raw_url);
            }
            Ok(cow)
        }
    }
}

/// Decodes one streamed chunk, holding back a trailing partial UTF-8
/// sequence in `carry` so it is completed by the next chunk.
fn decode_chunk(
    carry: &mut Vec<u8>,
    chunk: Vec<u8>,
    raw_url: &str,
    encoding_mode: EncodingMode,
) -> Result<String, FetchError> {
    let mut bytes = if carry.is_empty() {
        chunk
    } else {
        let mut joined = std::mem::take(carry);
        joined.extend_from_slice(&chunk);
        joined
    };

    if let Err(e) = std::str::from_utf8(&bytes) {
        if e.error_len().is_none() {
            *carry = bytes.split_off(e.valid_up_to());
        }
    }

    decode_bytes(&bytes, raw_url, encoding_mode).map(Cow::into_owned)
}

/// Fetches one file and tests it against a pattern.
///
/// Files whose declared size is at or above the streaming threshold are
/// read chunk by chunk and each chunk is tested on its own, so a match that
/// straddles a chunk boundary is not found. Smaller files are read whole
/// (through the cache, when one is attached). Every network read holds a
/// permit of the shared limiter.
pub struct ContentFetcher {
    transport: Arc<dyn ContentTransport>,
    cache: Option<Arc<dyn ContentCache>>,
    limiter: Arc<Semaphore>,
    streaming_threshold: u64,
    chunk_size: usize,
    encoding_mode: EncodingMode,
    metrics: SearchMetrics,
}

impl ContentFetcher {
    /// Creates a fetcher with its own limiter sized by `concurrency_limit`
    pub fn new(transport: Arc<dyn ContentTransport>, config: &SearchConfig) -> Self {
        Self {
            transport,
            cache: None,
            limiter: Arc::new(Semaphore::new(config.concurrency_limit.get())),
            streaming_threshold: config.streaming_threshold_bytes,
            chunk_size: config.chunk_size_bytes.get(),
            encoding_mode: config.encoding_mode,
            metrics: SearchMetrics::new(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn ContentCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_metrics(mut self, metrics: SearchMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Gets the fetch metrics
    pub fn metrics(&self) -> &SearchMetrics {
        &self.metrics
    }

    /// Whether `file` is read as a stream rather than in one shot
    pub fn uses_streaming(&self, file: &FileRef) -> bool {
        file.declared_size_bytes >= self.streaming_threshold
    }

    /// Tests `file` against `pattern`, reporting failures to the caller
    pub async fn fetch(
        &self,
        file: &FileRef,
        pattern: &CompiledPattern,
    ) -> Result<bool, FetchError> {
        if self.uses_streaming(file) {
            self.match_streamed(file, pattern).await
        } else {
            self.match_whole_body(file, pattern).await
        }
    }

    /// Tests `file` against `pattern`. A file that cannot be fetched or
    /// decoded is logged and counted as not matching.
    pub async fn matches(&self, file: &FileRef, pattern: &CompiledPattern) -> bool {
        match self.fetch(file, pattern).await {
            Ok(hit) => hit,
            Err(err) => {
                self.metrics.record_soft_failure();
                warn!(
                    "Skipping {} ({}): {}",
                    file.filename, file.raw_location, err
                );
                false
            }
        }
    }

    async fn acquire(&self) -> Result<SemaphorePermit<'_>, FetchError> {
        self.limiter
            .acquire()
            .await
            .map_err(|_| FetchError::network("fetch limiter closed"))
    }

    fn cached(&self, raw_url: &str) -> Option<Arc<[u8]>> {
        let cache = self.cache.as_ref()?;
        let body = cache.get(raw_url);
        self.metrics.record_cache_operation(body.is_some());
        body
    }

    async fn match_whole_body(
        &self,
        file: &FileRef,
        pattern: &CompiledPattern,
    ) -> Result<bool, FetchError> {
        let raw_url = &file.raw_location;

        let body = match self.cached(raw_url) {
            Some(body) => {
                trace!("Cache hit for {}", raw_url);
                body
            }
            None => {
                let body = {
                    let _permit = self.acquire().await?;
                    let _in_flight = self.metrics.track_in_flight();
                    self.metrics.record_fetch(false);
                    self.transport.fetch_body(raw_url).await?
                };
                self.metrics.record_bytes(body.len() as u64);

                let body: Arc<[u8]> = Arc::from(body);
                if let Some(cache) = &self.cache {
                    cache.insert(raw_url, Arc::clone(&body));
                }
                body
            }
        };

        let text = decode_bytes(&body, raw_url, self.encoding_mode)?;
        Ok(pattern.is_match(&text))
    }

    async fn match_streamed(
        &self,
        file: &FileRef,
        pattern: &CompiledPattern,
    ) -> Result<bool, FetchError> {
        let raw_url = &file.raw_location;
        let _permit = self.acquire().await?;
        let _in_flight = self.metrics.track_in_flight();
        self.metrics.record_fetch(true);

        let mut stream = self.transport.open_stream(raw_url, self.chunk_size).await?;
        let mut carry = Vec::new();
        let mut chunk_index = 0usize;

        while let Some(chunk) = stream.next_chunk().await? {
            self.metrics.record_bytes(chunk.len() as u64);
            let text = decode_chunk(&mut carry, chunk, raw_url, self.encoding_mode)?;
            if pattern.is_match(&text) {
                trace!("Match in chunk {} of {}", chunk_index, raw_url);
                return Ok(true);
            }
            chunk_index += 1;
        }

        if !carry.is_empty() && self.encoding_mode == EncodingMode::FailFast {
            return Err(FetchError::encoding(
                raw_url.as_str(),
                "incomplete UTF-8 sequence at end of content",
            ));
        }
        Ok(false)
    }
}
