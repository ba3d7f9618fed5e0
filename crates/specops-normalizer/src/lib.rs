//! SpecOps Normalizer
//!
//! The trusted boundary between specification documents and the canonical
//! [`Specification`] model.
//!
//! # Pipeline
//!
//! ```text
//! bytes → DocumentParser (JSON | YAML) → version detection
//!       → [swagger 2.0 upconversion] → SchemaResolver ($ref registry, cycle cut)
//!       → Specification
//!                ↑___________↓
//!          SpecCache (content-addressed)
//! ```
//!
//! Loading fails fast: a document with any unparsable part, unsupported version
//! marker or dangling `$ref` yields a [`SpecError`] and no partial model.
//!
//! # Example
//!
//! ```rust,ignore
//! use specops_normalizer::{FormatHint, SpecNormalizer};
//!
//! let spec = SpecNormalizer::default().load(bytes, FormatHint::Auto)?;
//! for op in spec.operations() {
//!     println!("{} {}", op.method, op.path);
//! }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
pub mod builder;
pub mod cache;
pub mod parsers;
pub mod resolver;
pub mod swagger2;
pub mod version;

use serde::{Deserialize, Serialize};
use specops_model::{DocumentHash, SourceVersion, SpecError, SpecResult, Specification};

// Re-exports for convenience
pub use cache::{CacheStats, SpecCache, SpecCacheKey};
pub use parsers::{default_parsers, DocumentParser, FormatHint, ParserRegistry};

/// Normalizer settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// How many more times a cyclic reference may be expanded along one path
    pub cycle_expansion_depth: u32,
}

impl NormalizerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With cycle expansion depth
    #[inline]
    #[must_use]
    pub fn with_cycle_expansion_depth(mut self, depth: u32) -> Self {
        self.cycle_expansion_depth = depth;
        self
    }
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            cycle_expansion_depth: 1,
        }
    }
}

/// Loads specification documents into the canonical model
#[derive(Debug, Default)]
pub struct SpecNormalizer {
    config: NormalizerConfig,
    parsers: ParserRegistry,
}

impl SpecNormalizer {
    /// Create normalizer with configuration
    #[inline]
    #[must_use]
    pub fn new(config: NormalizerConfig) -> Self {
        Self {
            config,
            parsers: default_parsers(),
        }
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Cache key a document would be stored under
    #[inline]
    #[must_use]
    pub fn cache_key(&self, document: &[u8]) -> SpecCacheKey {
        SpecCacheKey::new(DocumentHash::compute(document), self.config.cycle_expansion_depth)
    }

    /// Load a document
    ///
    /// # Errors
    /// - [`SpecError::Malformed`] for unparsable or structurally invalid documents
    /// - [`SpecError::UnsupportedVersion`] for unknown version markers
    /// - [`SpecError::UnresolvableReference`] for dangling or external `$ref`s
    pub fn load(&self, document: &[u8], hint: FormatHint) -> SpecResult<Specification> {
        let text = std::str::from_utf8(document)
            .map_err(|e| SpecError::malformed(format!("document is not valid UTF-8: {e}")))?;
        let text = text.trim_start_matches('\u{feff}');

        let parser = self
            .parsers
            .find(hint, text)
            .ok_or_else(|| SpecError::malformed(format!("no parser for format {hint:?}")))?;
        let value = parser.parse(text)?;

        let version = version::detect_version(&value)?;
        let value = match version {
            SourceVersion::Swagger2 => swagger2::upconvert(&value)?,
            SourceVersion::OpenApi30 | SourceVersion::OpenApi31 => value,
        };

        builder::build_specification(
            &value,
            version,
            DocumentHash::compute(document),
            self.config.cycle_expansion_depth,
        )
    }

    /// Load through a cache, sharing models of identical documents
    ///
    /// # Errors
    /// Same as [`Self::load`].
    pub fn load_cached(
        &self,
        cache: &SpecCache,
        document: &[u8],
        hint: FormatHint,
    ) -> SpecResult<std::sync::Arc<Specification>> {
        cache.try_get_or_insert_with(self.cache_key(document), || self.load(document, hint))
    }
}

/// Load a document with default settings
///
/// # Errors
/// See [`SpecNormalizer::load`].
pub fn load(document: &[u8], hint: FormatHint) -> SpecResult<Specification> {
    SpecNormalizer::default().load(document, hint)
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for loading specifications
    pub use crate::{load, FormatHint, NormalizerConfig, SpecCache, SpecNormalizer};
}
