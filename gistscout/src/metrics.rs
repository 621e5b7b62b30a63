use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Tracks network and matching activity for searches
#[derive(Debug, Clone)]
pub struct SearchMetrics {
    // Listing metrics
    pages_listed: Arc<AtomicU64>,
    snippets_evaluated: Arc<AtomicU64>,

    // Content metrics
    whole_body_fetches: Arc<AtomicU64>,
    streamed_fetches: Arc<AtomicU64>,
    bytes_read: Arc<AtomicU64>,
    soft_failures: Arc<AtomicU64>,
    files_skipped: Arc<AtomicU64>,

    // Cache metrics
    cache_hits: Arc<AtomicU64>,
    cache_misses: Arc<AtomicU64>,

    // Concurrency metrics
    in_flight: Arc<AtomicU64>,
    peak_in_flight: Arc<AtomicU64>,
}

impl SearchMetrics {
    /// Creates a new SearchMetrics instance
    pub fn new() -> Self {
        Self {
            pages_listed: Arc::new(AtomicU64::new(0)),
            snippets_evaluated: Arc::new(AtomicU64::new(0)),
            whole_body_fetches: Arc::new(AtomicU64::new(0)),
            streamed_fetches: Arc::new(AtomicU64::new(0)),
            bytes_read: Arc::new(AtomicU64::new(0)),
            soft_failures: Arc::new(AtomicU64::new(0)),
            files_skipped: Arc::new(AtomicU64::new(0)),
            cache_hits: Arc::new(AtomicU64::new(0)),
            cache_misses: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(AtomicU64::new(0)),
            peak_in_flight: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Records a listing page
    pub fn record_page(&self, snippet_count: usize) {
        let pages = self.pages_listed.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("Listed page {} with {} gists", pages, snippet_count);
    }

    /// Records a finished snippet evaluation
    pub fn record_snippet(&self) {
        self.snippets_evaluated.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a content fetch by strategy
    pub fn record_fetch(&self, streamed: bool) {
        if streamed {
            self.streamed_fetches.fetch_add(1, Ordering::Relaxed);
        } else {
            self.whole_body_fetches.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records content bytes received
    pub fn record_bytes(&self, bytes: u64) {
        self.bytes_read.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Records a tolerated content failure
    pub fn record_soft_failure(&self) {
        self.soft_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records files abandoned after their gist was already decided
    pub fn record_skipped(&self, files: u64) {
        if files > 0 {
            self.files_skipped.fetch_add(files, Ordering::Relaxed);
        }
    }

    /// Records cache operation
    pub fn record_cache_operation(&self, hit: bool) {
        if hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cache_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Marks a content fetch as started and returns a guard that marks it
    /// finished when dropped
    pub fn track_in_flight(&self) -> InFlightGuard {
        let current = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        let mut peak = self.peak_in_flight.load(Ordering::Relaxed);
        while current > peak {
            match self.peak_in_flight.compare_exchange_weak(
                peak,
                current,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => peak = observed,
            }
        }
        InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    /// Gets current statistics
    pub fn get_stats(&self) -> SearchStats {
        SearchStats {
            pages_listed: self.pages_listed.load(Ordering::Relaxed),
            snippets_evaluated: self.snippets_evaluated.load(Ordering::Relaxed),
            whole_body_fetches: self.whole_body_fetches.load(Ordering::Relaxed),
            streamed_fetches: self.streamed_fetches.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            soft_failures: self.soft_failures.load(Ordering::Relaxed),
            files_skipped: self.files_skipped.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            peak_in_flight: self.peak_in_flight.load(Ordering::Relaxed),
        }
    }

    /// Logs the activity recorded since `before` was taken
    pub fn log_stats_since(&self, before: &SearchStats) {
        let stats = self.get_stats().since(before);
        info!(
            "Search stats:\n\
             Pages listed: {}\n\
             Gists evaluated: {}\n\
             Fetches (whole/streamed): {}/{}\n\
             Bytes read: {}\n\
             Soft failures: {}\n\
             Files skipped: {}\n\
             Cache hits/misses: {}/{}\n\
             Peak in-flight fetches: {}",
            stats.pages_listed,
            stats.snippets_evaluated,
            stats.whole_body_fetches,
            stats.streamed_fetches,
            stats.bytes_read,
            stats.soft_failures,
            stats.files_skipped,
            stats.cache_hits,
            stats.cache_misses,
            stats.peak_in_flight
        );
    }
}

impl Default for SearchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight counter on drop
#[derive(Debug)]
pub struct InFlightGuard {
    in_flight: Arc<AtomicU64>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Snapshot of search statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub pages_listed: u64,
    pub snippets_evaluated: u64,
    pub whole_body_fetches: u64,
    pub streamed_fetches: u64,
    pub bytes_read: u64,
    pub soft_failures: u64,
    pub files_skipped: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub peak_in_flight: u64,
}

impl SearchStats {
    /// Counters accumulated after `earlier`. The peak is a high-water mark
    /// and is kept as is.
    pub fn since(&self, earlier: &SearchStats) -> SearchStats {
        SearchStats {
            pages_listed: self.pages_listed.saturating_sub(earlier.pages_listed),
            snippets_evaluated: self
                .snippets_evaluated
                .saturating_sub(earlier.snippets_evaluated),
            whole_body_fetches: self
                .whole_body_fetches
                .saturating_sub(earlier.whole_body_fetches),
            streamed_fetches: self.streamed_fetches.saturating_sub(earlier.streamed_fetches),
            bytes_read: self.bytes_read.saturating_sub(earlier.bytes_read),
            soft_failures: self.soft_failures.saturating_sub(earlier.soft_failures),
            files_skipped: self.files_skipped.saturating_sub(earlier.files_skipped),
            cache_hits: self.cache_hits.saturating_sub(earlier.cache_hits),
            cache_misses: self.cache_misses.saturating_sub(earlier.cache_misses),
            peak_in_flight: self.peak_in_flight,
        }
    }
}
