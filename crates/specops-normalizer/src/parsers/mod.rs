//! Document parsers for specification source formats
//!
//! Both formats parse into an order-preserving [`serde_json::Value`] tree so
//! the normalizer sees declaration order regardless of source format:
//! - JSON via serde_json
//! - YAML via serde_yaml

use serde::{Deserialize, Serialize};
use serde_json::Value;
use specops_model::SpecResult;

mod json;
mod yaml;

pub use json::JsonParser;
pub use yaml::YamlParser;

/// Caller's hint about the document format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatHint {
    /// Sniff from content
    #[default]
    Auto,
    Json,
    Yaml,
}

impl FormatHint {
    /// Guess from a file name extension
    #[must_use]
    pub fn from_extension(extension: &str) -> Self {
        match extension.to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            "yaml" | "yml" => Self::Yaml,
            _ => Self::Auto,
        }
    }
}

/// Parser trait for converting document text into a JSON value tree
///
/// Implement this trait to add support for new source formats.
pub trait DocumentParser: Send + Sync + std::fmt::Debug + 'static {
    /// Parse document text
    ///
    /// # Errors
    /// Returns [`specops_model::SpecError::Malformed`] on syntax errors.
    fn parse(&self, content: &str) -> SpecResult<Value>;

    /// Format this parser handles
    fn format(&self) -> FormatHint;

    /// Check if content looks like this parser's format
    fn sniff(&self, content: &str) -> bool;

    /// Parser priority (higher = tried first when sniffing)
    fn priority(&self) -> i32 {
        0
    }
}

/// Registry of document parsers
#[derive(Debug)]
pub struct ParserRegistry {
    parsers: Vec<Box<dyn DocumentParser>>,
}

impl Default for ParserRegistry {
    fn default() -> Self {
        default_parsers()
    }
}

impl ParserRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            parsers: Vec::new(),
        }
    }

    /// Register a parser
    pub fn register<P: DocumentParser>(&mut self, parser: P) {
        self.parsers.push(Box::new(parser));
        // Sort by priority (higher first)
        self.parsers.sort_by_key(|p| std::cmp::Reverse(p.priority()));
    }

    /// Find parser for an explicit hint, or by sniffing for [`FormatHint::Auto`]
    #[must_use]
    pub fn find(&self, hint: FormatHint, content: &str) -> Option<&dyn DocumentParser> {
        let found = match hint {
            FormatHint::Auto => self.parsers.iter().find(|p| p.sniff(content)),
            explicit => self.parsers.iter().find(|p| p.format() == explicit),
        };
        found.map(|p| &**p)
    }

    /// Number of registered parsers
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }
}

/// Create default parser registry with built-in parsers
#[inline]
#[must_use]
pub fn default_parsers() -> ParserRegistry {
    let mut registry = ParserRegistry::new();
    registry.register(JsonParser);
    // YAML is a superset of JSON, so it sniffs last and accepts anything
    registry.register(YamlParser);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_json_before_yaml() {
        let registry = default_parsers();
        let parser = registry.find(FormatHint::Auto, "  {\"openapi\": \"3.0.0\"}").unwrap();
        assert_eq!(parser.format(), FormatHint::Json);
        let parser = registry.find(FormatHint::Auto, "openapi: 3.0.0").unwrap();
        assert_eq!(parser.format(), FormatHint::Yaml);
    }

    #[test]
    fn explicit_hint_wins() {
        let registry = default_parsers();
        let parser = registry.find(FormatHint::Yaml, "{\"a\": 1}").unwrap();
        assert_eq!(parser.format(), FormatHint::Yaml);
    }

    #[test]
    fn hint_from_extension() {
        assert_eq!(FormatHint::from_extension("YML"), FormatHint::Yaml);
        assert_eq!(FormatHint::from_extension("json"), FormatHint::Json);
        assert_eq!(FormatHint::from_extension("txt"), FormatHint::Auto);
    }

    #[test]
    fn empty_registry_finds_nothing() {
        let registry = ParserRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.find(FormatHint::Auto, "{}").is_none());
    }
}
