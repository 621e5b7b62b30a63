//! Error types for gistscout.
//!
//! Errors come in two layers:
//!
//! 1. [`SearchError`] is terminal for a `search` call. Validation failures
//!    and listing failures end up here and become a `SearchOutcome::Failure`.
//! 2. [`ListingError`] and [`FetchError`] are what transports report.
//!    Listing errors are mapped onto [`SearchError`] by the lister; fetch
//!    errors are soft failures that never leave the content path:
//!    the file is logged and treated as non-matching.
//!
//! ```rust,ignore
//! match orchestrator.try_search("acme", "import requests").await {
//!     Ok(matches) => // every matching gist, in discovery order,
//!     Err(SearchError::UserNotFound(user)) => // unknown account,
//!     Err(SearchError::RateLimited(msg)) => // upstream throttling,
//!     Err(e) => // everything else
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for search operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Errors that terminate a search
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("User not found: {0}")]
    UserNotFound(String),
    #[error("Rate limited: {0}")]
    RateLimited(String),
    #[error("Transport error{}: {message}", status_suffix(.status))]
    Transport {
        status: Option<u16>,
        message: String,
    },
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {s})")).unwrap_or_default()
}

/// The failure taxonomy exposed to callers of `search`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    InvalidPattern,
    UserNotFound,
    RateLimited,
    TransportError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::InvalidPattern => "invalid_pattern",
            ErrorKind::UserNotFound => "user_not_found",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::TransportError => "transport_error",
        };
        f.write_str(name)
    }
}

impl SearchError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn invalid_pattern(msg: impl Into<String>) -> Self {
        Self::InvalidPattern(msg.into())
    }

    pub fn user_not_found(username: impl Into<String>) -> Self {
        Self::UserNotFound(username.into())
    }

    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Transport {
            status,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Classifies this error into the public taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            SearchError::InvalidInput(_) | SearchError::ConfigError(_) => ErrorKind::InvalidInput,
            SearchError::InvalidPattern(_) => ErrorKind::InvalidPattern,
            SearchError::UserNotFound(_) => ErrorKind::UserNotFound,
            SearchError::RateLimited(_) => ErrorKind::RateLimited,
            SearchError::Transport { .. } => ErrorKind::TransportError,
        }
    }
}

impl From<config::ConfigError> for SearchError {
    fn from(err: config::ConfigError) -> Self {
        SearchError::ConfigError(err.to_string())
    }
}

/// Failures reported by a listing transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListingError {
    #[error("listing not found")]
    NotFound,
    #[error("rate limit exceeded: {0}")]
    RateLimited(String),
    #[error("unexpected status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("network failure: {0}")]
    Network(String),
    #[error("malformed listing: {0}")]
    Decode(String),
}

impl ListingError {
    /// Maps a transport failure for `username` onto the terminal taxonomy
    pub fn into_search_error(self, username: &str) -> SearchError {
        match self {
            ListingError::NotFound => SearchError::user_not_found(username),
            ListingError::RateLimited(msg) => SearchError::rate_limited(msg),
            ListingError::Status { status, message } => {
                SearchError::transport(Some(status), message)
            }
            ListingError::Network(msg) => SearchError::transport(None, msg),
            ListingError::Decode(msg) => {
                SearchError::transport(None, format!("malformed listing: {msg}"))
            }
        }
    }
}

/// Failures while retrieving a single file's content. Always soft.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("network failure: {0}")]
    Network(String),
    #[error("invalid UTF-8 in {url}: {message}")]
    Encoding { url: String, message: String },
}

impl FetchError {
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn encoding(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Encoding {
            url: url.into(),
            message: message.into(),
        }
    }
}
