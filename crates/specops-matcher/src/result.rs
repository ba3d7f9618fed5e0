//! Match results

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use specops_model::{OperationId, ParameterLocation, RequestOrigin};

/// Template a concrete path resolved to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateRef {
    /// Declaration index
    pub index: usize,
    /// Template path as declared
    pub path: String,
}

/// Successful path match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatch {
    pub template: TemplateRef,
    /// Placeholder bindings in template order, percent-decoded
    pub params: IndexMap<String, String>,
}

/// Problem found checking a parameter of a matched request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterIssue {
    pub name: String,
    pub location: ParameterLocation,
    pub kind: IssueKind,
}

/// Parameter issue kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "issue")]
pub enum IssueKind {
    /// Required parameter absent
    Missing,
    /// Value does not parse as the declared type
    TypeMismatch { expected: String, value: String },
}

/// Outcome category of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Bound to an operation
    Matched,
    /// Path matched a template that does not declare the method
    MethodNotDeclared,
    /// No template matched
    Unmatched,
}

/// Binding of one observed request to at most one operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Request method as observed
    pub method: String,
    /// Concrete path as observed, query removed
    pub path: String,
    #[serde(default)]
    pub origin: RequestOrigin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<TemplateRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<OperationId>,
    #[serde(default)]
    pub path_params: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ParameterIssue>,
    /// Correlated response status, if the host supplied one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,
}

impl MatchResult {
    /// Outcome category
    #[inline]
    #[must_use]
    pub fn kind(&self) -> MatchKind {
        match (&self.template, self.operation) {
            (_, Some(_)) => MatchKind::Matched,
            (Some(_), None) => MatchKind::MethodNotDeclared,
            (None, None) => MatchKind::Unmatched,
        }
    }

    /// Whether the request was bound to an operation
    #[inline]
    #[must_use]
    pub fn is_matched(&self) -> bool {
        self.operation.is_some()
    }

    /// Whether the request came from synthesis
    #[inline]
    #[must_use]
    pub fn is_synthesized(&self) -> bool {
        self.origin.is_synthesized()
    }
}
