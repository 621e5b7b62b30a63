//! Strongly typed gist listing data.
//!
//! Snippets are built once from a listing page and never mutated. Their
//! files keep listing order, which is also the order they are searched in.

use serde::{Deserialize, Serialize};

/// A single file of a gist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    /// Name of the file within its gist
    pub filename: String,
    /// Direct-fetch URL for the file body
    pub raw_location: String,
    /// Size reported by the listing
    pub declared_size_bytes: u64,
}

impl FileRef {
    pub fn new(
        filename: impl Into<String>,
        raw_location: impl Into<String>,
        declared_size_bytes: u64,
    ) -> Self {
        Self {
            filename: filename.into(),
            raw_location: raw_location.into(),
            declared_size_bytes,
        }
    }
}

/// A published gist: a named collection of files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    id: String,
    listing_url: String,
    human_url: String,
    files: Vec<FileRef>,
}

impl Snippet {
    /// Builds a snippet. Files keep the given order; a later file with an
    /// already-seen name is dropped.
    pub fn new(
        id: impl Into<String>,
        listing_url: impl Into<String>,
        human_url: impl Into<String>,
        files: impl IntoIterator<Item = FileRef>,
    ) -> Self {
        let mut ordered: Vec<FileRef> = Vec::new();
        for file in files {
            if !ordered.iter().any(|f| f.filename == file.filename) {
                ordered.push(file);
            }
        }
        Self {
            id: id.into(),
            listing_url: listing_url.into(),
            human_url: human_url.into(),
            files: ordered,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn listing_url(&self) -> &str {
        &self.listing_url
    }

    pub fn human_url(&self) -> &str {
        &self.human_url
    }

    /// Files in listing order
    pub fn files(&self) -> &[FileRef] {
        &self.files
    }

    /// Whether the gist has no files
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Opaque token for resuming a listing. Only the transport that issued it
/// knows what it contains.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageCursor(String);

impl PageCursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Treats an empty token as "no more pages"
    pub fn non_empty(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        (!token.is_empty()).then_some(Self(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One page of a user's gists
#[derive(Debug, Clone, Default)]
pub struct PageResult {
    pub snippets: Vec<Snippet>,
    pub next_cursor: Option<PageCursor>,
}

impl PageResult {
    pub fn is_last(&self) -> bool {
        self.next_cursor.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_preserves_file_order() {
        let snippet = Snippet::new(
            "g1",
            "https://api.github.com/gists/g1",
            "https://gist.github.com/g1",
            vec![
                FileRef::new("z.py", "https://raw/z.py", 10),
                FileRef::new("a.py", "https://raw/a.py", 20),
                FileRef::new("m.py", "https://raw/m.py", 30),
            ],
        );

        let names: Vec<&str> = snippet.files().iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, vec!["z.py", "a.py", "m.py"]);
        assert_eq!(snippet.files()[1].declared_size_bytes, 20);
        assert_eq!(snippet.listing_url(), "https://api.github.com/gists/g1");
        assert!(!snippet.is_empty());
        assert!(Snippet::new("g2", "u", "h", Vec::new()).is_empty());
    }

    #[test]
    fn test_snippet_drops_duplicate_names() {
        let snippet = Snippet::new(
            "g1",
            "u",
            "h",
            vec![
                FileRef::new("a.py", "https://raw/first", 1),
                FileRef::new("a.py", "https://raw/second", 2),
            ],
        );
        assert_eq!(snippet.files().len(), 1);
        assert_eq!(snippet.files()[0].raw_location, "https://raw/first");
    }

    #[test]
    fn test_page_cursor() {
        assert!(PageCursor::non_empty("").is_none());
        let cursor = PageCursor::non_empty("https://api.github.com/users/acme/gists?page=2").unwrap();
        assert_eq!(cursor.as_str(), "https://api.github.com/users/acme/gists?page=2");

        let page = PageResult::default();
        assert!(page.is_last());
        assert!(page.snippets.is_empty());
    }
}
