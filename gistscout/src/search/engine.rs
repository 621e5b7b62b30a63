use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::fetcher::ContentFetcher;
use super::gist_matcher::GistMatcher;
use super::lister::{validate_username, GistLister};
use super::matcher::{validate_pattern, CompiledPattern};
use crate::cache::ContentCache;
use crate::config::{SearchConfig, SearchOptions};
use crate::errors::{SearchError, SearchResult};
use crate::gist::{PageCursor, Snippet};
use crate::metrics::SearchMetrics;
use crate::results::{MatchRecord, SearchOutcome};
use crate::transport::{ContentTransport, GithubClient, ListingTransport};

/// Searches every gist of a user with the default configuration over the
/// GitHub API.
pub async fn search(
    username: &str,
    pattern: &str,
    options: Option<SearchOptions>,
) -> SearchOutcome {
    let orchestrator = match SearchOrchestrator::github(SearchConfig::default()) {
        Ok(orchestrator) => orchestrator,
        Err(err) => return SearchOutcome::from(Err(err)),
    };
    orchestrator
        .search_with_options(username, pattern, options.unwrap_or_default())
        .await
}

/// Drives a search: validates input, walks the listing page by page and
/// evaluates each page's snippets concurrently.
///
/// Matches come back in discovery order: page order, then listing order
/// within a page. A listing failure on any page fails the whole search and
/// discards matches already found; a file that cannot be read only counts
/// as a non-match.
#[derive(Clone)]
pub struct SearchOrchestrator {
    config: SearchConfig,
    listing: Arc<dyn ListingTransport>,
    content: Arc<dyn ContentTransport>,
    cache: Option<Arc<dyn ContentCache>>,
    metrics: SearchMetrics,
}

impl SearchOrchestrator {
    pub fn new(
        config: SearchConfig,
        listing: Arc<dyn ListingTransport>,
        content: Arc<dyn ContentTransport>,
    ) -> Self {
        Self {
            config,
            listing,
            content,
            cache: None,
            metrics: SearchMetrics::new(),
        }
    }

    /// An orchestrator backed by a single [`GithubClient`]
    pub fn github(config: SearchConfig) -> SearchResult<Self> {
        let client = Arc::new(GithubClient::new(&config)?);
        Ok(Self::new(config, client.clone(), client))
    }

    /// Attaches a content cache shared by every search of this orchestrator
    pub fn with_cache(mut self, cache: Arc<dyn ContentCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Metrics accumulated across every search run by this orchestrator.
    /// Use [`crate::metrics::SearchStats::since`] on two snapshots for a single search.
    pub fn metrics(&self) -> &SearchMetrics {
        &self.metrics
    }

    pub async fn search(&self, username: &str, pattern: &str) -> SearchOutcome {
        self.search_with_options(username, pattern, SearchOptions::default())
            .await
    }

    pub async fn search_with_options(
        &self,
        username: &str,
        pattern: &str,
        options: SearchOptions,
    ) -> SearchOutcome {
        self.try_search_with_options(username, pattern, options)
            .await
            .into()
    }

    pub async fn try_search(&self, username: &str, pattern: &str) -> SearchResult<Vec<MatchRecord>> {
        self.try_search_with_options(username, pattern, SearchOptions::default())
            .await
    }

    pub async fn try_search_with_options(
        &self,
        username: &str,
        pattern: &str,
        options: SearchOptions,
    ) -> SearchResult<Vec<MatchRecord>> {
        // Nothing touches the network until both inputs are valid
        let username = validate_username(username)?;
        let pattern = validate_pattern(pattern)?;
        let config = self.config.clone().with_options(options);
        let before = self.metrics.get_stats();

        info!(
            "Starting search of {}'s gists for {:?} (concurrency {}, streaming at {} bytes)",
            username,
            pattern.as_str(),
            config.concurrency_limit,
            config.streaming_threshold_bytes
        );

        let walk = self.walk_pages(username, &pattern, &config);
        let result = match config.deadline {
            Some(deadline) => match tokio::time::timeout(deadline, walk).await {
                Ok(result) => result,
                Err(_) => Err(SearchError::transport(
                    None,
                    format!(
                        "search deadline of {} exceeded",
                        humantime::format_duration(deadline)
                    ),
                )),
            },
            None => walk.await,
        };

        self.metrics.log_stats_since(&before);
        match &result {
            Ok(matches) => info!("Search complete. Found {} matching gists", matches.len()),
            Err(err) => error!("Search failed: {}", err),
        }
        result
    }

    async fn walk_pages(
        &self,
        username: &str,
        pattern: &CompiledPattern,
        config: &SearchConfig,
    ) -> SearchResult<Vec<MatchRecord>> {
        let lister = GistLister::new(Arc::clone(&self.listing), config.per_page)
            .with_metrics(self.metrics.clone());

        let mut fetcher =
            ContentFetcher::new(Arc::clone(&self.content), config).with_metrics(self.metrics.clone());
        if let Some(cache) = &self.cache {
            fetcher = fetcher.with_cache(Arc::clone(cache));
        }
        let matcher = GistMatcher::new(Arc::new(fetcher));

        let mut matches = Vec::new();
        let mut cursor: Option<PageCursor> = None;
        let mut pages = 0u32;

        loop {
            let page = lister.list_page(username, cursor.as_ref()).await?;
            pages += 1;

            let found = self.evaluate_page(&matcher, page.snippets, pattern).await;
            debug!("Page {} produced {} matches", pages, found.len());
            matches.extend(found);

            let Some(next) = page.next_cursor else {
                break;
            };
            if config.max_pages.is_some_and(|max| pages >= max) {
                warn!(
                    "Stopping after {} pages; more gists remain unlisted",
                    pages
                );
                break;
            }
            cursor = Some(next);
        }

        Ok(matches)
    }

    /// Evaluates a page's snippets concurrently, keeping listing order
    async fn evaluate_page(
        &self,
        matcher: &GistMatcher,
        snippets: Vec<Snippet>,
        pattern: &CompiledPattern,
    ) -> Vec<MatchRecord> {
        let mut slots: Vec<Option<MatchRecord>> = vec![None; snippets.len()];
        let mut tasks = JoinSet::new();

        for (index, snippet) in snippets.into_iter().enumerate() {
            let matcher = matcher.clone();
            let pattern = pattern.clone();
            tasks.spawn(async move {
                let record = matcher
                    .first_match(&snippet, &pattern)
                    .await
                    .map(|file| MatchRecord::new(&snippet, &file));
                (index, record)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, record)) => {
                    self.metrics.record_snippet();
                    slots[index] = record;
                }
                Err(err) => warn!("Snippet evaluation failed: {}", err),
            }
        }

        slots.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::transport::{GistRecord, MemoryTransport};

    fn orchestrator(transport: Arc<MemoryTransport>) -> SearchOrchestrator {
        SearchOrchestrator::new(SearchConfig::default(), transport.clone(), transport)
    }

    #[tokio::test]
    async fn test_search_with_metrics() {
        let transport = Arc::new(
            MemoryTransport::new()
                .with_page(
                    "acme",
                    vec![
                        GistRecord::new("g1").with_file("a.py", "https://raw/a", 15),
                        GistRecord::new("g2").with_file("b.py", "https://raw/b", 5),
                    ],
                )
                .with_file("https://raw/a", "import requests")
                .with_file("https://raw/b", "pass\n"),
        );
        let orchestrator = orchestrator(transport);

        let matches = orchestrator.try_search("acme", "requests").await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].snippet_id, "g1");
        assert_eq!(matches[0].snippet_url, "https://gist.github.com/g1");
        assert_eq!(matches[0].filename, "a.py");

        let stats = orchestrator.metrics().get_stats();
        assert_eq!(stats.pages_listed, 1);
        assert_eq!(stats.snippets_evaluated, 2);
        assert_eq!(stats.whole_body_fetches, 2);
    }

    #[tokio::test]
    async fn test_validation_precedes_io() {
        let transport = Arc::new(MemoryTransport::new().with_page("acme", vec![]));
        let orchestrator = orchestrator(transport.clone());

        let outcome = orchestrator.search("acme", "(").await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::InvalidPattern));

        let outcome = orchestrator.search("", "requests").await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::InvalidInput));

        assert_eq!(transport.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_max_pages_stops_listing() {
        let transport = Arc::new(
            MemoryTransport::new()
                .with_page("acme", vec![GistRecord::new("g1")])
                .with_page("acme", vec![GistRecord::new("g2")])
                .with_page("acme", vec![GistRecord::new("g3")]),
        );
        let config = SearchConfig {
            max_pages: Some(2),
            ..SearchConfig::default()
        };
        let orchestrator = SearchOrchestrator::new(config, transport.clone(), transport.clone());

        let outcome = orchestrator.search("acme", "x").await;
        assert!(outcome.is_success());
        assert_eq!(transport.listing_calls(), 2);
    }

    #[tokio::test]
    async fn test_repeated_searches_accumulate() {
        let transport = Arc::new(
            MemoryTransport::new()
                .with_page(
                    "acme",
                    vec![
                        GistRecord::new("g1").with_file("a.py", "https://raw/a", 15),
                        GistRecord::new("g2").with_file("b.py", "https://raw/b", 5),
                    ],
                )
                .with_file("https://raw/a", "import requests")
                .with_file("https://raw/b", "pass\n"),
        );
        let orchestrator = orchestrator(transport);

        orchestrator.try_search("acme", "requests").await.unwrap();
        let first = orchestrator.metrics().get_stats();
        orchestrator.try_search("acme", "requests").await.unwrap();
        let second = orchestrator.metrics().get_stats();

        assert_eq!(second.pages_listed, 2);
        assert_eq!(second.whole_body_fetches, 4);

        let delta = second.since(&first);
        assert_eq!(delta.pages_listed, 1);
        assert_eq!(delta.snippets_evaluated, 2);
        assert_eq!(delta.whole_body_fetches, 2);
        assert_eq!(delta.bytes_read, first.bytes_read);
    }
}
