use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{SearchError, SearchResult};

/// Declared size at or above which file content is streamed in chunks
pub const DEFAULT_STREAMING_THRESHOLD_BYTES: u64 = 1024 * 1024;

/// Chunk size used when streaming large files
pub const DEFAULT_CHUNK_SIZE_BYTES: usize = 1024 * 1024;

/// Largest page size the listing API accepts
pub const MAX_PER_PAGE: u32 = 100;

/// Configuration for gist searches.
///
/// # Configuration Locations
///
/// Sources are layered in order of increasing precedence:
/// 1. Global `$CONFIG_DIR/gistscout/config.yaml`
/// 2. Local `.gistscout.yaml` in the current directory
/// 3. Custom config file specified via `--config`
/// 4. `GISTSCOUT_*` environment variables (`GISTSCOUT_CACHE__TTL=2h`)
///
/// # Configuration Format
///
/// ```yaml
/// # Listing API root
/// api_base_url: "https://api.github.com"
///
/// # Gists requested per listing page (1-100)
/// per_page: 30
///
/// # Stop after this many pages (omit for no limit)
/// max_pages: 10
///
/// # Simultaneous content fetches
/// concurrency_limit: 16
///
/// # Files at or above this declared size are streamed
/// streaming_threshold_bytes: 1048576
///
/// # Per-request timeout and optional whole-search deadline
/// request_timeout: "30s"
/// deadline: "2m"
///
/// # Invalid UTF-8 handling (lossy, failfast)
/// encoding_mode: "lossy"
///
/// cache:
///   enabled: true
///   ttl: "1day"
///   max_entries: 1024
///
/// # Log level (trace, debug, info, warn, error)
/// log_level: "info"
/// ```
///
/// Values passed on the command line or through [`SearchOptions`] take
/// precedence over file values; see [`SearchConfig::with_options`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Root of the listing API
    pub api_base_url: String,

    /// User-Agent sent with every request
    pub user_agent: String,

    /// Number of gists requested per listing page
    pub per_page: u32,

    /// Optional cap on the number of listing pages walked
    pub max_pages: Option<u32>,

    /// Maximum number of content fetches in flight at once
    pub concurrency_limit: NonZeroUsize,

    /// Declared size at or above which content is streamed in chunks
    pub streaming_threshold_bytes: u64,

    /// Chunk size used by transports in streaming mode
    pub chunk_size_bytes: NonZeroUsize,

    /// Timeout for a single HTTP request
    #[serde(with = "humantime_duration")]
    pub request_timeout: Duration,

    /// Optional deadline for a whole search
    #[serde(with = "humantime_duration_opt")]
    pub deadline: Option<Duration>,

    /// How to treat content that is not valid UTF-8
    pub encoding_mode: EncodingMode,

    /// Content cache settings
    pub cache: CacheConfig,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

/// How to handle invalid UTF-8 sequences in fetched content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingMode {
    /// Treat the file as unreadable (a soft failure)
    FailFast,
    /// Replace invalid sequences with U+FFFD and keep searching
    #[default]
    Lossy,
}

/// Settings for the optional content cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether front-ends should inject a cache
    pub enabled: bool,

    /// How long a cached body stays valid
    #[serde(with = "humantime_duration")]
    pub ttl: Duration,

    /// Maximum number of cached bodies
    pub max_entries: NonZeroUsize,
}

/// Per-call overrides accepted by `search`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub concurrency_limit: Option<NonZeroUsize>,
    pub streaming_threshold_bytes: Option<u64>,
}

fn default_concurrency_limit() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get().saturating_mul(4)).unwrap_or(NonZeroUsize::MIN)
}

fn default_chunk_size() -> NonZeroUsize {
    NonZeroUsize::new(DEFAULT_CHUNK_SIZE_BYTES).unwrap_or(NonZeroUsize::MIN)
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.github.com".to_string(),
            user_agent: concat!("gistscout/", env!("CARGO_PKG_VERSION")).to_string(),
            per_page: 30,
            max_pages: None,
            concurrency_limit: default_concurrency_limit(),
            streaming_threshold_bytes: DEFAULT_STREAMING_THRESHOLD_BYTES,
            chunk_size_bytes: default_chunk_size(),
            request_timeout: Duration::from_secs(30),
            deadline: None,
            encoding_mode: EncodingMode::default(),
            cache: CacheConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl: Duration::from_secs(24 * 60 * 60),
            max_entries: NonZeroUsize::new(1024).unwrap_or(NonZeroUsize::MIN),
        }
    }
}

impl SearchConfig {
    /// Loads configuration from the default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Loads configuration, layering an explicit file over the defaults
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        let optional_files = [
            dirs::config_dir().map(|p| p.join("gistscout/config.yaml")),
            Some(PathBuf::from(".gistscout.yaml")),
        ];
        for path in optional_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        // An explicit file must exist
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("GISTSCOUT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Checks values the type system cannot
    pub fn validate(&self) -> SearchResult<()> {
        if self.per_page == 0 || self.per_page > MAX_PER_PAGE {
            return Err(SearchError::config_error(format!(
                "per_page must be between 1 and {MAX_PER_PAGE}, got {}",
                self.per_page
            )));
        }
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://"))
        {
            return Err(SearchError::config_error(format!(
                "api_base_url must be an http(s) URL, got {:?}",
                self.api_base_url
            )));
        }
        if self.max_pages == Some(0) {
            return Err(SearchError::config_error("max_pages must be at least 1"));
        }
        Ok(())
    }

    /// Applies per-call overrides; set values take precedence
    pub fn with_options(mut self, options: SearchOptions) -> Self {
        if let Some(limit) = options.concurrency_limit {
            self.concurrency_limit = limit;
        }
        if let Some(threshold) = options.streaming_threshold_bytes {
            self.streaming_threshold_bytes = threshold;
        }
        self
    }
}

mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

mod humantime_duration_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&humantime::format_duration(*d).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| humantime::parse_duration(&raw).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_load_config_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let config_content = r#"
            api_base_url: "http://localhost:8080"
            per_page: 50
            max_pages: 3
            concurrency_limit: 4
            streaming_threshold_bytes: 2048
            request_timeout: "5s"
            deadline: "2m"
            encoding_mode: "failfast"
            cache:
              enabled: true
              ttl: "1h"
              max_entries: 10
            log_level: "debug"
        "#;

        let mut file = File::create(&config_path).unwrap();
        file.write_all(config_content.as_bytes()).unwrap();

        let config = SearchConfig::load_from(Some(&config_path)).unwrap();
        assert_eq!(config.api_base_url, "http://localhost:8080");
        assert_eq!(config.per_page, 50);
        assert_eq!(config.max_pages, Some(3));
        assert_eq!(config.concurrency_limit, NonZeroUsize::new(4).unwrap());
        assert_eq!(config.streaming_threshold_bytes, 2048);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.deadline, Some(Duration::from_secs(120)));
        assert_eq!(config.encoding_mode, EncodingMode::FailFast);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl, Duration::from_secs(3600));
        assert_eq!(config.cache.max_entries, NonZeroUsize::new(10).unwrap());
        assert_eq!(config.log_level, "debug");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_values() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let mut file = File::create(&config_path).unwrap();
        file.write_all(b"per_page: 10\n").unwrap();

        let config = SearchConfig::load_from(Some(&config_path)).unwrap();
        assert_eq!(config.per_page, 10);
        assert_eq!(config.api_base_url, "https://api.github.com");
        assert_eq!(config.max_pages, None);
        assert_eq!(config.streaming_threshold_bytes, 1_048_576);
        assert_eq!(config.chunk_size_bytes.get(), 1_048_576);
        assert_eq!(config.deadline, None);
        assert_eq!(config.encoding_mode, EncodingMode::Lossy);
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.ttl, Duration::from_secs(86_400));
        assert_eq!(
            config.concurrency_limit.get(),
            num_cpus::get().saturating_mul(4).max(1)
        );
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_with_options() {
        let base = SearchConfig {
            concurrency_limit: NonZeroUsize::new(8).unwrap(),
            streaming_threshold_bytes: 100,
            ..SearchConfig::default()
        };

        let unchanged = base.clone().with_options(SearchOptions::default());
        assert_eq!(unchanged, base);

        let merged = base.with_options(SearchOptions {
            concurrency_limit: NonZeroUsize::new(2),
            streaming_threshold_bytes: Some(4096),
        });
        assert_eq!(merged.concurrency_limit.get(), 2);
        assert_eq!(merged.streaming_threshold_bytes, 4096);
    }

    #[test]
    fn test_validate() {
        let config = SearchConfig {
            per_page: 0,
            ..SearchConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SearchError::ConfigError(_))
        ));

        let config = SearchConfig {
            per_page: 101,
            ..SearchConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SearchConfig {
            api_base_url: "ftp://example.com".to_string(),
            ..SearchConfig::default()
        };
        assert!(config.validate().is_err());

        assert!(SearchConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let config_content = r#"
            per_page: "many"
            request_timeout: "soon"
        "#;

        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        let mut file = File::create(&config_path).unwrap();
        file.write_all(config_content.as_bytes()).unwrap();

        let result = SearchConfig::load_from(Some(&config_path));
        assert!(result.is_err(), "Expected error loading invalid config");
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = SearchConfig::load_from(Some(Path::new("nonexistent.yaml")));
        assert!(result.is_err());
    }
}
