pub mod cache;
pub mod config;
pub mod errors;
pub mod gist;
pub mod metrics;
pub mod results;
pub mod search;
pub mod transport;

pub use cache::{ContentCache, MemoryCache};
pub use config::{EncodingMode, SearchConfig, SearchOptions};
pub use errors::{ErrorKind, SearchError, SearchResult};
pub use gist::{FileRef, PageCursor, PageResult, Snippet};
pub use metrics::{SearchMetrics, SearchStats};
pub use results::{MatchRecord, SearchOutcome};
pub use search::{search, SearchOrchestrator};
pub use transport::{GithubClient, MemoryTransport};
