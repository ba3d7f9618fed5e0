//! Synthesis settings

use crate::rules::HeaderRule;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Knobs for request synthesis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Seed for every generated value and for malformed-case selection
    pub seed: u64,
    /// Most malformed requests emitted per operation
    pub malformed_cap: usize,
    /// Schema nesting depth past which subtrees are cut
    pub max_depth: usize,
    /// Element count of oversized arrays
    pub oversized_array_len: usize,
    /// Character count of oversized strings
    pub oversized_string_len: usize,
    /// Fill optional parameters and properties in generated requests
    pub include_optional: bool,
    /// Extra headers added to requests in scope, in order
    #[serde(rename = "header_rule")]
    pub header_rules: Vec<HeaderRule>,
    /// Values for server URL variables, replacing their defaults
    pub server_variables: BTreeMap<String, String>,
}

impl SynthesisConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With seed
    #[inline]
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// With malformed cap
    #[inline]
    #[must_use]
    pub fn with_malformed_cap(mut self, cap: usize) -> Self {
        self.malformed_cap = cap;
        self
    }

    /// With max depth
    #[inline]
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// With optional field inclusion
    #[inline]
    #[must_use]
    pub fn with_include_optional(mut self, include: bool) -> Self {
        self.include_optional = include;
        self
    }

    /// With a server variable value
    #[must_use]
    pub fn with_server_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.server_variables.insert(name.into(), value.into());
        self
    }

    /// With one more header rule
    #[must_use]
    pub fn with_header_rule(mut self, rule: HeaderRule) -> Self {
        self.header_rules.push(rule);
        self
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            seed: 0x5EED,
            malformed_cap: 32,
            max_depth: 8,
            oversized_array_len: 64,
            oversized_string_len: 4096,
            include_optional: true,
            server_variables: BTreeMap::new(),
            header_rules: Vec::new(),
        }
    }
}
