//! Concurrent search over a user's gists.
//!
//! A search runs in four stages:
//!
//! 1. **Validation**: the username and pattern are checked before any
//!    request is made ([`validate_username`], [`validate_pattern`]).
//! 2. **Listing**: [`GistLister`] walks the listing one page at a time,
//!    following the opaque cursor each page returns.
//! 3. **Gist evaluation**: every snippet of a page is evaluated concurrently.
//!    [`GistMatcher`] fans out over the snippet's files and stops at the
//!    first match in listing order.
//! 4. **Content matching**: [`ContentFetcher`] reads a file whole, or as a
//!    stream of independently tested chunks once its declared size reaches
//!    the streaming threshold.
//!
//! ```rust,ignore
//! let orchestrator = SearchOrchestrator::github(SearchConfig::load()?)?;
//! match orchestrator.search("octocat", r"import\s+requests").await {
//!     SearchOutcome::Success { matches } => println!("{} gists", matches.len()),
//!     SearchOutcome::Failure { kind, message } => eprintln!("{kind}: {message}"),
//! }
//! ```
//!
//! # Concurrency
//!
//! Fetches share one semaphore per search, sized by `concurrency_limit`,
//! so the number of in-flight content requests never exceeds it no matter
//! how many snippets and files are pending. Dropping a search future (for
//! example when its deadline fires) cancels every outstanding fetch.
//!
//! # Failures
//!
//! Listing failures are terminal and discard matches found so far. Content
//! failures are soft: the file is logged, counted and treated as not
//! matching.

pub mod engine;
pub mod fetcher;
pub mod gist_matcher;
pub mod lister;
pub mod matcher;

pub use engine::{search, SearchOrchestrator};
pub use fetcher::ContentFetcher;
pub use gist_matcher::GistMatcher;
pub use lister::{validate_username, GistLister};
pub use matcher::{validate_pattern, CompiledPattern};
