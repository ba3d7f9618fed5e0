//! Session configuration
//!
//! Every field is optional in TOML; missing values fall back to defaults.
//!
//! ```toml
//! [normalizer]
//! cycle_expansion_depth = 2
//!
//! [synthesis]
//! seed = 42
//! malformed_cap = 16
//!
//! [synthesis.server_variables]
//! region = "us"
//!
//! [[synthesis.header_rule]]
//! name = "X-Tenant"
//! value = "${param.header.x-tenant}"
//! scope = { kind = "path_prefix", match = "/v1/" }
//!
//! [coverage]
//! max_evidence_entries = 5000
//!
//! [cache]
//! max_documents = 4
//! ```

use crate::error::{SessionError, SessionResult};
use serde::{Deserialize, Serialize};
use specops_coverage::CoverageConfig;
use specops_matcher::MatcherConfig;
use specops_normalizer::NormalizerConfig;
use specops_synth::SynthesisConfig;
use std::path::Path;

/// Configuration for assessment sessions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Document loading
    pub normalizer: NormalizerConfig,
    /// Traffic matching
    pub matcher: MatcherConfig,
    /// Request synthesis
    pub synthesis: SynthesisConfig,
    /// Coverage tracking
    pub coverage: CoverageConfig,
    /// Shared document cache
    pub cache: CacheConfig,
}

/// Document cache settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Normalized documents kept in memory
    pub max_documents: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_documents: 16 }
    }
}

impl SessionConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With normalizer settings
    #[inline]
    #[must_use]
    pub fn with_normalizer(mut self, normalizer: NormalizerConfig) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// With matcher settings
    #[inline]
    #[must_use]
    pub fn with_matcher(mut self, matcher: MatcherConfig) -> Self {
        self.matcher = matcher;
        self
    }

    /// With synthesis settings
    #[inline]
    #[must_use]
    pub fn with_synthesis(mut self, synthesis: SynthesisConfig) -> Self {
        self.synthesis = synthesis;
        self
    }

    /// With coverage settings
    #[inline]
    #[must_use]
    pub fn with_coverage(mut self, coverage: CoverageConfig) -> Self {
        self.coverage = coverage;
        self
    }

    /// With document cache capacity
    #[inline]
    #[must_use]
    pub fn with_cache_capacity(mut self, max_documents: u64) -> Self {
        self.cache.max_documents = max_documents;
        self
    }

    /// Parse TOML text
    ///
    /// # Errors
    ///
    /// `Config` when the text is not valid TOML or a value has the wrong type.
    pub fn from_toml_str(text: &str) -> SessionResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read a TOML file
    ///
    /// # Errors
    ///
    /// `Io` when the file cannot be read, `Config` when it does not parse.
    pub fn load(path: impl AsRef<Path>) -> SessionResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)
            .map_err(|e| SessionError::config(format!("{}: {e}", path.display())))?;
        tracing::debug!("Loaded session config from {}", path.display());
        Ok(config)
    }

    /// Serialize to TOML
    ///
    /// # Errors
    ///
    /// `Config` if serialization fails.
    pub fn to_toml_string(&self) -> SessionResult<String> {
        toml::to_string_pretty(self).map_err(|e| SessionError::config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.normalizer.cycle_expansion_depth, 1);
        assert!(config.matcher.strip_server_base_paths);
        assert!(config.matcher.validate_parameters);
        assert_eq!(config.synthesis.seed, 0x5EED);
        assert_eq!(config.synthesis.malformed_cap, 32);
        assert_eq!(config.synthesis.max_depth, 8);
        assert_eq!(config.synthesis.oversized_array_len, 64);
        assert_eq!(config.synthesis.oversized_string_len, 4096);
        assert!(config.synthesis.include_optional);
        assert!(config.synthesis.header_rules.is_empty());
        assert_eq!(config.coverage.max_evidence_entries, 10_000);
        assert_eq!(config.cache.max_documents, 16);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = SessionConfig::from_toml_str(
            "[synthesis]\nseed = 42\nmalformed_cap = 4\n\n[matcher]\nvalidate_parameters = false\n",
        )
        .unwrap();
        assert_eq!(config.synthesis.seed, 42);
        assert_eq!(config.synthesis.malformed_cap, 4);
        assert_eq!(config.synthesis.max_depth, 8);
        assert!(!config.matcher.validate_parameters);
        assert!(config.matcher.strip_server_base_paths);
        assert_eq!(config.cache.max_documents, 16);
    }

    #[test]
    fn header_rules_and_server_variables_from_toml() {
        let config = SessionConfig::from_toml_str(
            r#"
[synthesis.server_variables]
region = "us"

[[synthesis.header_rule]]
name = "X-Tenant"
value = "${param.header.x-tenant}"
scope = { kind = "method", match = "POST" }

[coverage]
max_evidence_entries = 5
"#,
        )
        .unwrap();
        assert_eq!(config.synthesis.server_variables["region"], "us");
        let rule = &config.synthesis.header_rules[0];
        assert_eq!(rule.name, "X-Tenant");
        assert_eq!(rule.scope, specops_synth::HeaderScope::Method("POST".into()));
        assert!(rule.enabled && !rule.overwrite);
        assert_eq!(config.coverage.max_evidence_entries, 5);
        assert_eq!(config.synthesis.seed, 0x5EED);
    }

    #[test]
    fn empty_toml_is_default() {
        assert_eq!(SessionConfig::from_toml_str("").unwrap(), SessionConfig::default());
    }

    #[test]
    fn wrong_type_is_config_error() {
        let err = SessionConfig::from_toml_str("[synthesis]\nseed = \"many\"\n").unwrap_err();
        assert!(matches!(err, SessionError::Config(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[normalizer]\ncycle_expansion_depth = 3\n[cache]\nmax_documents = 2").unwrap();
        let config = SessionConfig::load(file.path()).unwrap();
        assert_eq!(config.normalizer.cycle_expansion_depth, 3);
        assert_eq!(config.cache.max_documents, 2);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SessionConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, SessionError::Io(_)));
    }

    #[test]
    fn toml_round_trip() {
        let config = SessionConfig::new()
            .with_synthesis(
                SynthesisConfig::default()
                    .with_seed(9)
                    .with_server_variable("region", "us")
                    .with_header_rule(specops_synth::HeaderRule::new("X-Tenant", "acme").with_overwrite(true)),
            )
            .with_coverage(CoverageConfig::default().with_max_evidence_entries(50))
            .with_cache_capacity(3);
        let text = config.to_toml_string().unwrap();
        assert_eq!(SessionConfig::from_toml_str(&text).unwrap(), config);
    }
}
