use regex::Regex;
use std::sync::Arc;

use crate::errors::{SearchError, SearchResult};

const SIMPLE_PATTERN_THRESHOLD: usize = 32;

/// Strategy for pattern matching
#[derive(Debug, Clone)]
enum MatchStrategy {
    Simple(Arc<str>),
    Regex(Arc<Regex>),
}

/// A validated search pattern, cheap to clone across tasks
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    source: Arc<str>,
    strategy: MatchStrategy,
}

impl CompiledPattern {
    /// The pattern as supplied
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the pattern occurs anywhere in `text`
    pub fn is_match(&self, text: &str) -> bool {
        match &self.strategy {
            MatchStrategy::Simple(literal) => text.contains(&**literal),
            MatchStrategy::Regex(regex) => regex.is_match(text),
        }
    }

    /// Whether this pattern is matched as a plain substring
    pub fn is_literal(&self) -> bool {
        matches!(self.strategy, MatchStrategy::Simple(_))
    }
}

/// Determines if a pattern can use plain substring matching
fn is_simple_pattern(pattern: &str) -> bool {
    pattern.len() < SIMPLE_PATTERN_THRESHOLD && regex::escape(pattern) == pattern
}

/// Validates and compiles a search pattern.
///
/// Blank patterns are rejected before the regex engine sees them; syntax
/// errors carry the engine's diagnostic. Pure: no I/O, no shared state.
pub fn validate_pattern(pattern: &str) -> SearchResult<CompiledPattern> {
    if pattern.trim().is_empty() {
        return Err(SearchError::invalid_pattern("empty pattern"));
    }

    let regex = Regex::new(pattern).map_err(|e| SearchError::invalid_pattern(e.to_string()))?;

    let strategy = if is_simple_pattern(pattern) {
        MatchStrategy::Simple(Arc::from(pattern))
    } else {
        MatchStrategy::Regex(Arc::new(regex))
    };

    Ok(CompiledPattern {
        source: Arc::from(pattern),
        strategy,
    })
}
