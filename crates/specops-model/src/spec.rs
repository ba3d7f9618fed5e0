//! Canonical specification model
//!
//! A [`Specification`] is built once per document by the normalizer and is
//! read-only afterwards. Path templates keep declaration order; operations are
//! owned by their template and addressed globally by [`OperationId`].

use crate::hash::DocumentHash;
use crate::method::HttpMethod;
use crate::schema::{SchemaArena, SchemaId};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Document dialect a specification was loaded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceVersion {
    /// Swagger 2.0, upconverted on load
    Swagger2,
    OpenApi30,
    OpenApi31,
}

impl fmt::Display for SourceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Swagger2 => "swagger 2.0",
            Self::OpenApi30 => "openapi 3.0",
            Self::OpenApi31 => "openapi 3.1",
        })
    }
}

/// Document `info` block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiInfo {
    pub title: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Server entry with URL template variables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub variables: IndexMap<String, ServerVariable>,
}

/// Server URL variable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerVariable {
    pub default: String,
    #[serde(default, rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
}

impl Server {
    /// Server with a plain URL
    #[inline]
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            description: None,
            variables: IndexMap::new(),
        }
    }

    /// URL with every `{variable}` replaced by its default
    #[must_use]
    pub fn resolved_url(&self) -> String {
        self.resolved_url_with(&BTreeMap::new())
    }

    /// URL with `{variable}` replaced by its override, else its default
    ///
    /// Overrides are not checked against a variable's `enum`.
    #[must_use]
    pub fn resolved_url_with(&self, overrides: &BTreeMap<String, String>) -> String {
        self.variables
            .iter()
            .fold(self.url.clone(), |url, (name, variable)| {
                let value = overrides.get(name).unwrap_or(&variable.default);
                url.replace(&format!("{{{name}}}"), value)
            })
    }

    /// Path component of the resolved URL, without trailing slash
    ///
    /// `None` when the server is mounted at the root.
    #[must_use]
    pub fn base_path(&self) -> Option<String> {
        let url = self.resolved_url();
        let without_scheme = match url.find("://") {
            Some(pos) => {
                let rest = &url[pos + 3..];
                match rest.find('/') {
                    Some(slash) => &rest[slash..],
                    None => "",
                }
            }
            None => url.as_str(),
        };
        let path = without_scheme
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim_end_matches('/');
        if path.is_empty() || !path.starts_with('/') {
            None
        } else {
            Some(path.to_string())
        }
    }
}

/// Global operation handle, assigned in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(pub usize);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

/// Where a parameter is carried
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParameterLocation {
    /// Parse the `in` keyword
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "path" => Some(Self::Path),
            "query" => Some(Self::Query),
            "header" => Some(Self::Header),
            "cookie" => Some(Self::Cookie),
            _ => None,
        }
    }

    /// Keyword as written in documents
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
            Self::Cookie => "cookie",
        }
    }
}

/// Declared parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub schema: SchemaId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Added for a template placeholder nobody declared
    #[serde(default)]
    pub implicit: bool,
}

impl ParameterSpec {
    /// Key under which operation-level parameters override path-level ones
    #[must_use]
    pub fn key(&self) -> (ParameterLocation, String) {
        let name = match self.location {
            ParameterLocation::Header => self.name.to_ascii_lowercase(),
            _ => self.name.clone(),
        };
        (self.location, name)
    }
}

/// Media type entry of a body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
}

/// Declared request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBodySpec {
    pub required: bool,
    pub content: IndexMap<String, MediaSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Declared response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSpec {
    pub description: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub content: IndexMap<String, MediaSpec>,
}

/// Where an API key is carried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyLocation {
    Header,
    Query,
    Cookie,
}

/// Declared security scheme
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SecurityScheme {
    ApiKey {
        name: String,
        #[serde(rename = "in")]
        location: ApiKeyLocation,
    },
    Http {
        scheme: String,
        #[serde(rename = "bearerFormat", skip_serializing_if = "Option::is_none")]
        bearer_format: Option<String>,
    },
    #[serde(rename = "oauth2")]
    OAuth2 { flows: Vec<String> },
    OpenIdConnect {
        #[serde(rename = "openIdConnectUrl")]
        url: String,
    },
}

/// Scheme name to required scopes; all entries must be satisfied together
pub type SecurityRequirement = IndexMap<String, Vec<String>>;

/// One HTTP method on one path template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationEntry {
    pub id: OperationId,
    pub method: HttpMethod,
    /// Template path this operation belongs to
    pub path: String,
    /// Index of the owning template
    pub template: usize,
    pub operation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub deprecated: bool,
    pub parameters: Vec<ParameterSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBodySpec>,
    #[serde(default)]
    pub responses: IndexMap<String, ResponseSpec>,
    /// Alternatives; any one satisfies the operation
    #[serde(default)]
    pub security: Vec<SecurityRequirement>,
}

impl OperationEntry {
    /// Parameters in one location
    pub fn parameters_in(
        &self,
        location: ParameterLocation,
    ) -> impl Iterator<Item = &ParameterSpec> + '_ {
        self.parameters.iter().filter(move |p| p.location == location)
    }

    /// Find parameter by location and name (header names case-insensitive)
    #[must_use]
    pub fn parameter(&self, location: ParameterLocation, name: &str) -> Option<&ParameterSpec> {
        self.parameters_in(location).find(|p| match location {
            ParameterLocation::Header => p.name.eq_ignore_ascii_case(name),
            _ => p.name == name,
        })
    }

    /// `METHOD /path` label
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// Declared path with its operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathTemplate {
    pub path: String,
    pub placeholders: Vec<String>,
    pub operations: Vec<OperationEntry>,
}

impl PathTemplate {
    /// Operation declared for a method
    #[must_use]
    pub fn operation(&self, method: HttpMethod) -> Option<&OperationEntry> {
        self.operations.iter().find(|op| op.method == method)
    }
}

/// Extract `{placeholder}` names from a template path, in order
///
/// # Errors
/// Returns the offending text on unbalanced or empty braces.
pub fn placeholder_names(path: &str) -> Result<Vec<String>, String> {
    let mut names = Vec::new();
    let mut rest = path;
    while let Some(open) = rest.find(['{', '}']) {
        if rest.as_bytes()[open] == b'}' {
            return Err(format!("unbalanced '}}' in {path}"));
        }
        let after = &rest[open + 1..];
        let close = after
            .find('}')
            .ok_or_else(|| format!("unclosed '{{' in {path}"))?;
        let name = &after[..close];
        if name.is_empty() || name.contains(['{', '/']) {
            return Err(format!("invalid placeholder '{{{name}}}' in {path}"));
        }
        names.push(name.to_string());
        rest = &after[close + 1..];
    }
    Ok(names)
}

/// Normalized, reference-resolved specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Specification {
    pub version: SourceVersion,
    pub info: ApiInfo,
    pub servers: Vec<Server>,
    pub templates: Vec<PathTemplate>,
    pub schemas: SchemaArena,
    /// Named component schemas
    pub components: IndexMap<String, SchemaId>,
    pub security_schemes: IndexMap<String, SecurityScheme>,
    /// Document-wide security requirements
    pub security: Vec<SecurityRequirement>,
    pub hash: DocumentHash,
}

impl Specification {
    /// Every operation in declaration order
    pub fn operations(&self) -> impl Iterator<Item = &OperationEntry> + '_ {
        self.templates.iter().flat_map(|t| t.operations.iter())
    }

    /// Number of declared operations
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.templates.iter().map(|t| t.operations.len()).sum()
    }

    /// Look up operation by handle
    #[must_use]
    pub fn operation(&self, id: OperationId) -> Option<&OperationEntry> {
        self.operations().find(|op| op.id == id)
    }

    /// Look up operation by its `operationId`
    #[must_use]
    pub fn operation_by_name(&self, operation_id: &str) -> Option<&OperationEntry> {
        self.operations().find(|op| op.operation_id == operation_id)
    }

    /// Base paths of all servers, longest first, deduplicated
    #[must_use]
    pub fn base_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.servers.iter().filter_map(Server::base_path).collect();
        paths.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        paths.dedup();
        paths
    }
}
