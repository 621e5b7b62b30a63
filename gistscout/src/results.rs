//! Search result types.
//!
//! A search yields exactly one [`SearchOutcome`]: either every matching
//! gist in discovery order, or a single error. There is no partial variant;
//! matches gathered before a fatal listing error are dropped.
//!
//! ```rust,ignore
//! match outcome {
//!     SearchOutcome::Success { matches } => {
//!         for m in &matches {
//!             println!("{} {}", m.snippet_url, m.filename);
//!         }
//!     }
//!     SearchOutcome::Failure { kind, message } => eprintln!("{kind}: {message}"),
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorKind, SearchResult};
use crate::gist::{FileRef, Snippet};

/// The first matching file of a matching gist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Gist identifier
    pub snippet_id: String,
    /// Human-facing URL of the gist
    pub snippet_url: String,
    /// Name of the first file, by listing order, that matched
    pub filename: String,
    /// Raw URL of that file
    pub raw_location: String,
}

impl MatchRecord {
    /// Builds the record for `snippet` whose first matching file is `file`
    pub fn new(snippet: &Snippet, file: &FileRef) -> Self {
        Self {
            snippet_id: snippet.id().to_string(),
            snippet_url: snippet.human_url().to_string(),
            filename: file.filename.clone(),
            raw_location: file.raw_location.clone(),
        }
    }
}

/// The terminal result of a search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SearchOutcome {
    Success { matches: Vec<MatchRecord> },
    Failure { kind: ErrorKind, message: String },
}

impl SearchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SearchOutcome::Success { .. })
    }

    /// Matches of a successful search, `None` on failure
    pub fn matches(&self) -> Option<&[MatchRecord]> {
        match self {
            SearchOutcome::Success { matches } => Some(matches),
            SearchOutcome::Failure { .. } => None,
        }
    }

    /// Failure kind, `None` on success
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            SearchOutcome::Success { .. } => None,
            SearchOutcome::Failure { kind, .. } => Some(*kind),
        }
    }
}

impl From<SearchResult<Vec<MatchRecord>>> for SearchOutcome {
    fn from(result: SearchResult<Vec<MatchRecord>>) -> Self {
        match result {
            Ok(matches) => SearchOutcome::Success { matches },
            Err(err) => SearchOutcome::Failure {
                kind: err.kind(),
                message: err.to_string(),
            },
        }
    }
}
