//! Text extraction strategies, keyed by content type.

use std::collections::HashMap;

use htmd::HtmlToMarkdown;

use crate::error::{Error, Result};

/// Error returned by a strategy for malformed input.
pub type StrategyError = Box<dyn std::error::Error + Send + Sync>;

/// Converts the raw bytes of a structured node into document text.
///
/// Implementations must be pure: no shared state is mutated.
pub trait TextExtractor: Send + Sync {
    /// Extracts readable text from `bytes`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is malformed.
    fn extract(&self, bytes: &[u8]) -> std::result::Result<String, StrategyError>;
}

/// Passes UTF-8 text through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainText;

impl TextExtractor for PlainText {
    fn extract(&self, bytes: &[u8]) -> std::result::Result<String, StrategyError> {
        Ok(std::str::from_utf8(bytes)?.to_string())
    }
}

/// Flattens HTML into Markdown.
///
/// Links survive as `[text](href)` and images as `![alt](src)`, so inline
/// `cid:` references reach the resolution pass intact.
#[derive(Debug, Clone)]
pub struct HtmlToText {
    skip_tags: Vec<&'static str>,
}

impl HtmlToText {
    /// Creates a converter that drops scripts, styles and the document head.
    #[must_use]
    pub fn new() -> Self {
        Self {
            skip_tags: vec!["script", "style", "head"],
        }
    }
}

impl Default for HtmlToText {
    fn default() -> Self {
        Self::new()
    }
}

impl TextExtractor for HtmlToText {
    fn extract(&self, bytes: &[u8]) -> std::result::Result<String, StrategyError> {
        let html = std::str::from_utf8(bytes)?;
        let converter = HtmlToMarkdown::builder()
            .skip_tags(self.skip_tags.clone())
            .build();
        Ok(converter.convert(html)?)
    }
}

/// Maps content type tags to extraction strategies.
#[derive(Default)]
pub struct ExtractorRegistry {
    strategies: HashMap<String, Box<dyn TextExtractor>>,
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tags: Vec<_> = self.strategies.keys().collect();
        tags.sort();
        f.debug_struct("ExtractorRegistry")
            .field("tags", &tags)
            .finish()
    }
}

/// Lowercases a tag and drops any parameters.
fn normalize_tag(tag: &str) -> String {
    tag.split(';').next().unwrap_or(tag).trim().to_lowercase()
}

impl ExtractorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with plain text, Markdown and HTML strategies.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("text/plain", PlainText);
        registry.register("text/markdown", PlainText);
        registry.register("text/html", HtmlToText::new());
        registry.register("application/xhtml+xml", HtmlToText::new());
        registry
    }

    /// Registers (or replaces) the strategy for a content type tag.
    pub fn register(&mut self, tag: &str, strategy: impl TextExtractor + 'static) {
        self.strategies
            .insert(normalize_tag(tag), Box::new(strategy));
    }

    /// Checks whether a strategy exists for the tag.
    #[must_use]
    pub fn supports(&self, tag: &str) -> bool {
        self.strategies.contains_key(&normalize_tag(tag))
    }

    /// Runs the strategy registered for `tag` over `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedContentKind`] if no strategy is registered
    /// and [`Error::ExtractionFailed`] if the strategy rejects its input.
    pub fn extract(&self, tag: &str, bytes: &[u8]) -> Result<String> {
        let tag = normalize_tag(tag);
        let strategy = self
            .strategies
            .get(&tag)
            .ok_or_else(|| Error::UnsupportedContentKind {
                content_type: tag.clone(),
            })?;

        strategy
            .extract(bytes)
            .map_err(|e| Error::ExtractionFailed {
                content_type: tag,
                reason: e.to_string(),
            })
    }
}
