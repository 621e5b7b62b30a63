use std::sync::Arc;
use tracing::debug;

use crate::errors::{SearchError, SearchResult};
use crate::gist::{FileRef, PageCursor, PageResult, Snippet};
use crate::metrics::SearchMetrics;
use crate::transport::{GistRecord, ListingTransport};

/// Checks a username before it is used in any request.
///
/// Surrounding whitespace is ignored. Blank names and names that could not
/// form a single URL path segment are rejected.
pub fn validate_username(username: &str) -> SearchResult<&str> {
    let username = username.trim();
    if username.is_empty() {
        return Err(SearchError::invalid_input("empty username"));
    }
    if let Some(bad) = username
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(SearchError::invalid_input(format!(
            "username contains invalid character {:?}",
            bad
        )));
    }
    Ok(username)
}

/// Pages through a user's gist listing
#[derive(Clone)]
pub struct GistLister {
    transport: Arc<dyn ListingTransport>,
    per_page: u32,
    metrics: SearchMetrics,
}

impl GistLister {
    pub fn new(transport: Arc<dyn ListingTransport>, per_page: u32) -> Self {
        Self {
            transport,
            per_page,
            metrics: SearchMetrics::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: SearchMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Lists the page at `cursor` (the first page when `None`).
    ///
    /// Every failure is terminal: not found becomes `UserNotFound`,
    /// throttling becomes `RateLimited`, anything else `Transport`.
    pub async fn list_page(
        &self,
        username: &str,
        cursor: Option<&PageCursor>,
    ) -> SearchResult<PageResult> {
        let username = validate_username(username)?;

        let page = self
            .transport
            .list_gists(username, cursor, self.per_page)
            .await
            .map_err(|e| e.into_search_error(username))?;

        self.metrics.record_page(page.gists.len());
        let next_cursor = page.next.filter(|c| !c.as_str().is_empty());
        debug!(
            "Page for {} has {} gists (more: {})",
            username,
            page.gists.len(),
            next_cursor.is_some()
        );

        Ok(PageResult {
            snippets: page.gists.into_iter().map(snippet_from_record).collect(),
            next_cursor,
        })
    }
}

fn snippet_from_record(record: GistRecord) -> Snippet {
    let human_url = record.html_url.unwrap_or_else(|| record.url.clone());
    let files = record
        .files
        .into_iter()
        .map(|(filename, file)| FileRef::new(filename, file.raw_url, file.size));
    Snippet::new(record.id, record.url, human_url, files)
}
