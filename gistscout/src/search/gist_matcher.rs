use std::sync::Arc;
use tokio::task::{AbortHandle, JoinSet};
use tracing::{debug, warn};

use super::fetcher::ContentFetcher;
use super::matcher::CompiledPattern;
use crate::gist::{FileRef, Snippet};

/// Tracks per-file outcomes until the first matching file, in listing
/// order, is known.
#[derive(Debug)]
struct FirstMatch {
    outcomes: Vec<Option<bool>>,
    misses_before: usize,
    earliest_hit: Option<usize>,
}

impl FirstMatch {
    fn new(file_count: usize) -> Self {
        Self {
            outcomes: vec![None; file_count],
            misses_before: 0,
            earliest_hit: None,
        }
    }

    fn record(&mut self, index: usize, hit: bool) {
        self.outcomes[index] = Some(hit);
        if hit && self.earliest_hit.map_or(true, |earliest| index < earliest) {
            self.earliest_hit = Some(index);
        }
        while self.outcomes.get(self.misses_before) == Some(&Some(false)) {
            self.misses_before += 1;
        }
    }

    /// `Some(answer)` once no pending file can change the answer
    fn decided(&self) -> Option<Option<usize>> {
        match self.earliest_hit {
            Some(hit) if self.misses_before == hit => Some(Some(hit)),
            Some(_) => None,
            None if self.misses_before == self.outcomes.len() => Some(None),
            None => None,
        }
    }

    fn earliest_hit(&self) -> Option<usize> {
        self.earliest_hit
    }
}

/// Decides whether any file of a snippet matches a pattern.
///
/// Files are fetched concurrently (bounded by the fetcher's limiter). The
/// first file in listing order that matches wins; once a file matches,
/// fetches for files after it are cancelled, and once the answer is fixed
/// every remaining fetch is cancelled.
#[derive(Clone)]
pub struct GistMatcher {
    fetcher: Arc<ContentFetcher>,
}

impl GistMatcher {
    pub fn new(fetcher: Arc<ContentFetcher>) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &ContentFetcher {
        &self.fetcher
    }

    /// Whether any file of `snippet` matches
    pub async fn matches(&self, snippet: &Snippet, pattern: &CompiledPattern) -> bool {
        self.first_match(snippet, pattern).await.is_some()
    }

    /// The first file of `snippet`, in listing order, whose content matches
    pub async fn first_match(
        &self,
        snippet: &Snippet,
        pattern: &CompiledPattern,
    ) -> Option<FileRef> {
        if snippet.is_empty() {
            debug!("Gist {} has no files", snippet.id());
            return None;
        }
        let files = snippet.files();

        let mut tasks = JoinSet::new();
        let handles: Vec<AbortHandle> = files
            .iter()
            .enumerate()
            .map(|(index, file)| {
                let fetcher = Arc::clone(&self.fetcher);
                let file = file.clone();
                let pattern = pattern.clone();
                tasks.spawn(async move { (index, fetcher.matches(&file, &pattern).await) })
            })
            .collect();

        let mut fold = FirstMatch::new(files.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, hit)) => {
                    fold.record(index, hit);
                    if hit {
                        for later in &handles[index + 1..] {
                            later.abort();
                        }
                    }
                }
                Err(err) if err.is_cancelled() => {}
                // A panicked evaluation leaves its slot unresolved: it can
                // never be the earliest hit
                Err(err) => warn!("File evaluation in gist {} failed: {}", snippet.id(), err),
            }
            if fold.decided().is_some() {
                break;
            }
        }

        let pending = tasks.len();
        if pending > 0 {
            tasks.abort_all();
            self.fetcher.metrics().record_skipped(pending as u64);
        }

        let index = fold.earliest_hit()?;
        debug!(
            "Gist {} ({}) matched in {} (file {} of {})",
            snippet.id(),
            snippet.listing_url(),
            files[index].filename,
            index + 1,
            files.len()
        );
        Some(files[index].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::search::matcher::validate_pattern;
    use crate::transport::MemoryTransport;
    use std::time::Duration;

    fn snippet(files: &[(&str, &str)]) -> Snippet {
        Snippet::new(
            "g1",
            "https://api.github.com/gists/g1",
            "https://gist.github.com/g1",
            files
                .iter()
                .map(|(name, url)| FileRef::new(*name, *url, 10)),
        )
    }

    fn matcher(transport: Arc<MemoryTransport>) -> GistMatcher {
        GistMatcher::new(Arc::new(ContentFetcher::new(
            transport,
            &SearchConfig::default(),
        )))
    }

    #[test]
    fn test_fold_waits_for_earlier_files() {
        let mut fold = FirstMatch::new(3);
        fold.record(2, true);
        assert_eq!(fold.decided(), None);
        fold.record(0, false);
        assert_eq!(fold.decided(), None);
        fold.record(1, true);
        assert_eq!(fold.decided(), Some(Some(1)));
    }

    #[test]
    fn test_fold_all_misses() {
        let mut fold = FirstMatch::new(2);
        fold.record(1, false);
        assert_eq!(fold.decided(), None);
        fold.record(0, false);
        assert_eq!(fold.decided(), Some(None));
        assert_eq!(fold.earliest_hit(), None);
    }

    #[tokio::test]
    async fn test_empty_snippet_never_matches() {
        let transport = Arc::new(MemoryTransport::new());
        let matcher = matcher(transport.clone());
        let pattern = validate_pattern("anything").unwrap();

        assert!(!matcher.matches(&snippet(&[]), &pattern).await);
        assert_eq!(transport.content_calls(), 0);
    }

    #[tokio::test]
    async fn test_first_match_follows_listing_order() {
        // The second file answers first, but the first file also matches
        let transport = Arc::new(
            MemoryTransport::new()
                .with_file("https://raw/a", "import requests")
                .with_latency("https://raw/a", Duration::from_millis(40))
                .with_file("https://raw/b", "import requests"),
        );
        let matcher = matcher(transport);
        let pattern = validate_pattern("import requests").unwrap();

        let hit = matcher
            .first_match(
                &snippet(&[("a.py", "https://raw/a"), ("b.py", "https://raw/b")]),
                &pattern,
            )
            .await
            .unwrap();
        assert_eq!(hit.filename, "a.py");
    }

    #[tokio::test]
    async fn test_match_cancels_slow_later_files() {
        let transport = Arc::new(
            MemoryTransport::new()
                .with_file("https://raw/a", "import requests")
                .with_file("https://raw/slow", "import requests")
                .with_latency("https://raw/slow", Duration::from_secs(30)),
        );
        let matcher = matcher(transport);
        let pattern = validate_pattern("import requests").unwrap();

        let started = std::time::Instant::now();
        let hit = matcher
            .first_match(
                &snippet(&[("a.py", "https://raw/a"), ("slow.py", "https://raw/slow")]),
                &pattern,
            )
            .await
            .unwrap();

        assert_eq!(hit.filename, "a.py");
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(matcher.fetcher().metrics().get_stats().files_skipped, 1);
    }

    #[tokio::test]
    async fn test_failures_do_not_hide_later_matches() {
        let transport = Arc::new(MemoryTransport::new().with_file("https://raw/b", "x = 1\nimport requests\n"));
        let matcher = matcher(transport);
        let pattern = validate_pattern("import requests").unwrap();

        let hit = matcher
            .first_match(
                &snippet(&[("missing.py", "https://raw/missing"), ("b.py", "https://raw/b")]),
                &pattern,
            )
            .await;
        assert_eq!(hit.map(|f| f.filename), Some("b.py".to_string()));
        assert_eq!(matcher.fetcher().metrics().get_stats().soft_failures, 1);
    }
}
