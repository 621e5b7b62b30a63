//! Transport seams for listing gists and fetching file content.
//!
//! The engine only talks to these traits. [`GithubClient`] implements both
//! over HTTP; [`MemoryTransport`] implements both from in-memory fixtures.

mod github;
mod memory;

pub use github::GithubClient;
pub use memory::MemoryTransport;

use async_trait::async_trait;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::errors::{FetchError, ListingError};
use crate::gist::PageCursor;

/// A gist as it appears in a listing response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GistRecord {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub html_url: Option<String>,
    /// Files in document order
    #[serde(deserialize_with = "ordered_files", serialize_with = "serialize_files")]
    pub files: Vec<(String, WireFile)>,
}

/// A file entry of a listed gist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireFile {
    pub raw_url: String,
    #[serde(default)]
    pub size: u64,
}

impl GistRecord {
    /// Builds a record with GitHub-shaped URLs, mostly for fixtures
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            url: format!("https://api.github.com/gists/{id}"),
            html_url: Some(format!("https://gist.github.com/{id}")),
            id,
            files: Vec::new(),
        }
    }

    pub fn with_file(
        mut self,
        filename: impl Into<String>,
        raw_url: impl Into<String>,
        size: u64,
    ) -> Self {
        self.files.push((
            filename.into(),
            WireFile {
                raw_url: raw_url.into(),
                size,
            },
        ));
        self
    }
}

fn ordered_files<'de, D>(deserializer: D) -> Result<Vec<(String, WireFile)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OrderedFiles;

    impl<'de> Visitor<'de> for OrderedFiles {
        type Value = Vec<(String, WireFile)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of filename to file object")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut files = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((name, file)) = map.next_entry::<String, WireFile>()? {
                files.push((name, file));
            }
            Ok(files)
        }
    }

    deserializer.deserialize_map(OrderedFiles)
}

fn serialize_files<S>(files: &[(String, WireFile)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeMap;

    let mut map = serializer.serialize_map(Some(files.len()))?;
    for (name, file) in files {
        map.serialize_entry(name, file)?;
    }
    map.end()
}

/// Raw listing page as returned by a transport
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub gists: Vec<GistRecord>,
    pub next: Option<PageCursor>,
}

/// Lists a user's gists page by page
#[async_trait]
pub trait ListingTransport: Send + Sync {
    /// Fetches the page at `cursor`, or the first page when `cursor` is `None`
    async fn list_gists(
        &self,
        username: &str,
        cursor: Option<&PageCursor>,
        per_page: u32,
    ) -> Result<ListingPage, ListingError>;
}

/// A finite, forward-only sequence of content chunks
#[async_trait]
pub trait ChunkStream: Send {
    /// Next chunk, or `None` once the body is exhausted
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, FetchError>;
}

/// Retrieves file bodies by raw URL
#[async_trait]
pub trait ContentTransport: Send + Sync {
    /// Reads the whole body in one shot
    async fn fetch_body(&self, raw_url: &str) -> Result<Vec<u8>, FetchError>;

    /// Opens the body as a stream of chunks of about `chunk_size` bytes
    async fn open_stream(
        &self,
        raw_url: &str,
        chunk_size: usize,
    ) -> Result<Box<dyn ChunkStream>, FetchError>;
}
