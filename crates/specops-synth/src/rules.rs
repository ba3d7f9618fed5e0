//! Custom header rules
//!
//! A [`HeaderRule`] adds one header to every synthesized request in its
//! scope. Values may reference stored parameters as `${param.<key>}`, see
//! [`ParameterStore::interpolate`](crate::store::ParameterStore::interpolate).

use crate::request::is_managed_header;
use crate::store::ParameterStore;
use serde::{Deserialize, Serialize};
use specops_model::OperationEntry;

/// Requests a header rule applies to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "match")]
pub enum HeaderScope {
    #[default]
    All,
    /// Server host, case-insensitive
    Host(String),
    /// Template paths starting with this prefix
    PathPrefix(String),
    /// Operations carrying this tag
    Tag(String),
    /// Operations with this method, case-insensitive
    Method(String),
}

impl HeaderScope {
    /// Whether an operation served from `host` falls in this scope
    #[must_use]
    pub fn covers(&self, entry: &OperationEntry, host: Option<&str>) -> bool {
        match self {
            Self::All => true,
            Self::Host(expected) => host.is_some_and(|h| h.eq_ignore_ascii_case(expected)),
            Self::PathPrefix(prefix) => entry.path.starts_with(prefix.as_str()),
            Self::Tag(tag) => entry.tags.iter().any(|t| t == tag),
            Self::Method(method) => entry.method.as_str().eq_ignore_ascii_case(method),
        }
    }
}

/// Header added to synthesized requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderRule {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub name: String,
    /// May contain `${param.<key>}` placeholders
    pub value: String,
    #[serde(default)]
    pub scope: HeaderScope,
    /// Replace a header the request already carries instead of keeping it
    #[serde(default)]
    pub overwrite: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl HeaderRule {
    /// Enabled rule for every request, not overwriting
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            enabled: true,
            name: name.into(),
            value: value.into(),
            scope: HeaderScope::All,
            overwrite: false,
        }
    }

    /// With scope
    #[inline]
    #[must_use]
    pub fn with_scope(mut self, scope: HeaderScope) -> Self {
        self.scope = scope;
        self
    }

    /// With overwrite
    #[inline]
    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }
}

/// Header a rule resolved to for one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedHeader {
    pub name: String,
    pub value: String,
    pub overwrite: bool,
}

/// Rules in effect for an operation, values interpolated
///
/// Disabled rules and transport-managed headers are skipped.
#[must_use]
pub fn resolve_headers(
    rules: &[HeaderRule],
    entry: &OperationEntry,
    host: Option<&str>,
    store: Option<&ParameterStore>,
) -> Vec<ResolvedHeader> {
    rules
        .iter()
        .filter(|rule| rule.enabled && rule.scope.covers(entry, host))
        .filter(|rule| {
            let managed = is_managed_header(&rule.name);
            if managed {
                tracing::debug!("Header rule for managed header {} ignored", rule.name);
            }
            !managed
        })
        .map(|rule| ResolvedHeader {
            name: rule.name.clone(),
            value: store.map_or_else(|| rule.value.clone(), |s| s.interpolate(&rule.value)),
            overwrite: rule.overwrite,
        })
        .collect()
}

/// Host component of a server URL, without port or credentials
#[must_use]
pub fn host_of(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let authority = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    let host = match authority.strip_prefix('[') {
        Some(v6) => v6.split(']').next()?,
        None => authority.split(':').next()?,
    };
    (!host.is_empty()).then_some(host)
}
