//! Request-to-operation matching
//!
//! Templates are grouped by segment count. Within a group they are kept
//! sorted by `(placeholder count, declaration index)`, so the first template
//! that binds a path is also the most specific one.

use crate::params::check_parameters;
use crate::result::{MatchResult, PathMatch, TemplateRef};
use crate::template::{tokenize, CompiledTemplate};
use serde::{Deserialize, Serialize};
use specops_model::{HttpMethod, ObservedRequest, PathTemplate, Specification};
use std::collections::HashMap;
use std::sync::Arc;

/// Matcher settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Also try each concrete path with a server base path removed
    pub strip_server_base_paths: bool,
    /// Check parameter presence and types on matched requests
    pub validate_parameters: bool,
}

impl MatcherConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With base path stripping
    #[inline]
    #[must_use]
    pub fn with_strip_server_base_paths(mut self, strip: bool) -> Self {
        self.strip_server_base_paths = strip;
        self
    }

    /// With parameter validation
    #[inline]
    #[must_use]
    pub fn with_validate_parameters(mut self, validate: bool) -> Self {
        self.validate_parameters = validate;
        self
    }
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            strip_server_base_paths: true,
            validate_parameters: true,
        }
    }
}

/// Templates indexed for matching
#[derive(Debug, Clone, Default)]
struct TemplateIndex {
    templates: Vec<CompiledTemplate>,
    /// Segment count -> template positions, most specific first
    by_len: HashMap<usize, Vec<usize>>,
}

impl TemplateIndex {
    fn build<'a>(paths: impl IntoIterator<Item = &'a str>) -> Self {
        let templates: Vec<CompiledTemplate> = paths
            .into_iter()
            .enumerate()
            .map(|(index, path)| CompiledTemplate::compile(index, path))
            .collect();
        let mut by_len: HashMap<usize, Vec<usize>> = HashMap::new();
        for (pos, template) in templates.iter().enumerate() {
            by_len.entry(template.len()).or_default().push(pos);
        }
        for group in by_len.values_mut() {
            group.sort_by_key(|pos| templates[*pos].priority());
        }
        Self { templates, by_len }
    }

    fn find(&self, path: &str) -> Option<PathMatch> {
        let tokens = tokenize(path);
        let group = self.by_len.get(&tokens.len())?;
        group.iter().find_map(|pos| {
            let template = &self.templates[*pos];
            template.bind(&tokens).map(|params| PathMatch {
                template: TemplateRef {
                    index: template.index,
                    path: template.path.clone(),
                },
                params,
            })
        })
    }
}

/// Match a concrete path against an ordered template list
///
/// Compiles the templates on every call; hold a [`PathMatcher`] to match
/// many paths against one specification.
#[must_use]
pub fn match_path(templates: &[PathTemplate], path: &str) -> Option<PathMatch> {
    let path = strip_suffixes(path);
    TemplateIndex::build(templates.iter().map(|t| t.path.as_str())).find(path)
}

/// Drop `?query` and `#fragment` from a request target
fn strip_suffixes(target: &str) -> &str {
    let end = target.find(['?', '#']).unwrap_or(target.len());
    &target[..end]
}

/// Binds observed requests to the operations of one specification
#[derive(Debug, Clone)]
pub struct PathMatcher {
    spec: Arc<Specification>,
    config: MatcherConfig,
    index: TemplateIndex,
    base_paths: Vec<String>,
}

impl PathMatcher {
    /// Create matcher, compiling every template
    #[must_use]
    pub fn new(spec: Arc<Specification>, config: MatcherConfig) -> Self {
        let index = TemplateIndex::build(spec.templates.iter().map(|t| t.path.as_str()));
        let base_paths = if config.strip_server_base_paths {
            spec.base_paths()
        } else {
            Vec::new()
        };
        tracing::debug!(
            "Compiled {} templates, {} server base paths",
            index.templates.len(),
            base_paths.len()
        );
        Self {
            spec,
            config,
            index,
            base_paths,
        }
    }

    /// Get specification
    #[inline]
    #[must_use]
    pub fn specification(&self) -> &Arc<Specification> {
        &self.spec
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Match a concrete path, trying it as-is before stripping base paths
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<PathMatch> {
        let path = strip_suffixes(path);
        if let Some(found) = self.index.find(path) {
            return Some(found);
        }
        self.base_paths.iter().find_map(|base| {
            let rest = path.strip_prefix(base.as_str())?;
            if rest.is_empty() {
                self.index.find("/")
            } else if rest.starts_with('/') {
                self.index.find(rest)
            } else {
                None
            }
        })
    }

    /// Match an observed request to at most one operation
    #[must_use]
    pub fn match_request(&self, request: &ObservedRequest) -> MatchResult {
        let mut result = MatchResult {
            method: request.method.clone(),
            path: request.path.clone(),
            origin: request.origin,
            template: None,
            operation: None,
            path_params: Default::default(),
            issues: Vec::new(),
            status: request.status(),
            observed_at: request.observed_at,
        };

        let Some(found) = self.match_path(&request.path) else {
            tracing::debug!("No template matches {} {}", request.method, request.path);
            return result;
        };

        let operation = request.method.parse::<HttpMethod>().ok().and_then(|method| {
            self.spec
                .templates
                .get(found.template.index)
                .and_then(|t| t.operation(method))
        });

        if let Some(operation) = operation {
            result.operation = Some(operation.id);
            if self.config.validate_parameters {
                result.issues =
                    check_parameters(&self.spec.schemas, operation, request, &found.params);
            }
        } else {
            tracing::debug!(
                "Method {} not declared on {}",
                request.method,
                found.template.path
            );
        }
        result.template = Some(found.template);
        result.path_params = found.params;
        result
    }
}
