//! Synthesized request descriptors and their rendering

use crate::rules::ResolvedHeader;
use crate::strategy::{is_json_like, Mutation};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use specops_model::{
    DocumentHash, FieldLocation, FieldPath, HttpMethod, MediaSpec, ObservedRequest, OperationId,
    ParameterLocation, RequestOrigin, SynthesisStrategy, ITEM_SEGMENT,
};
use std::collections::HashSet;

/// Headers owned by the HTTP client; never emitted from parameters
static MANAGED_HEADERS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ["host", "content-length", "transfer-encoding", "connection"].into_iter().collect());

/// Whether a header is set by the transport rather than the request author
#[must_use]
pub fn is_managed_header(name: &str) -> bool {
    MANAGED_HEADERS.contains(name.to_ascii_lowercase().as_str())
}

/// Encoded request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "encoding", content = "data")]
pub enum Payload {
    Json(Value),
    Form(Vec<(String, String)>),
    Multipart {
        boundary: String,
        parts: Vec<(String, String)>,
    },
    Raw(String),
}

impl Payload {
    /// Wire text of this payload
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Json(value) => value.to_string(),
            Self::Form(pairs) => pairs
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&"),
            Self::Multipart { boundary, parts } => {
                let mut text = String::new();
                for (name, value) in parts {
                    text.push_str(&format!(
                        "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                    ));
                }
                text.push_str(&format!("--{boundary}--\r\n"));
                text
            }
            Self::Raw(text) => text.clone(),
        }
    }
}

/// Body with its content type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesizedBody {
    pub content_type: String,
    pub payload: Payload,
}

/// Request descriptor produced by synthesis; never sent by this crate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesizedRequest {
    pub operation: OperationId,
    pub operation_id: String,
    pub strategy: SynthesisStrategy,
    /// What this variant exercises
    pub label: String,
    /// Field the variant targets
    pub target: FieldPath,
    pub method: HttpMethod,
    /// Resolved URL of the first declared server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Concrete path, placeholders substituted
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<SynthesizedBody>,
}

impl SynthesizedRequest {
    /// Path plus encoded query string
    #[must_use]
    pub fn url(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{query}", self.path)
    }

    /// Base URL joined with [`Self::url`]; just the latter without a server
    #[must_use]
    pub fn full_url(&self) -> String {
        match &self.base_url {
            Some(base) => format!("{}{}", base.trim_end_matches('/'), self.url()),
            None => self.url(),
        }
    }

    /// First header value with this name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Observed form, tagged with the strategy that produced it
    #[must_use]
    pub fn to_observed(&self) -> ObservedRequest {
        let mut request = ObservedRequest::new(self.method.as_str(), &self.path)
            .with_origin(RequestOrigin::Synthesized(self.strategy));
        request.query = self.query.clone();
        request.headers = self.headers.clone();
        if let Some(body) = &self.body {
            request = request
                .with_header("Content-Type", body.content_type.clone())
                .with_body(body.payload.to_text());
        }
        request
    }
}

/// Parameter values and body prior to rendering
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestDraft {
    /// Keyed by location and declared name, in insertion order
    pub params: IndexMap<(ParameterLocation, String), Value>,
    pub body: Option<Value>,
    pub raw_body: Option<String>,
}

impl RequestDraft {
    /// Apply one mutation; `false` when its target does not exist in this draft
    pub fn apply(&mut self, mutation: &Mutation, target: &FieldPath) -> bool {
        match mutation {
            Mutation::Baseline => true,
            Mutation::SetParam { location, name, value } => {
                self.params.insert((*location, name.clone()), value.clone());
                true
            }
            Mutation::OmitParam { location, name } => {
                self.params.shift_remove(&(*location, name.clone())).is_some()
            }
            Mutation::SetBody { value } => {
                let segments = target.segments();
                if segments.is_empty() {
                    self.body = Some(value.clone());
                    return true;
                }
                self.body
                    .as_mut()
                    .is_some_and(|body| set_at(body, segments, value.clone()))
            }
            Mutation::OmitBody => self
                .body
                .as_mut()
                .is_some_and(|body| remove_at(body, target.segments())),
            Mutation::AddBodyProperty { name, value } => self
                .body
                .as_mut()
                .and_then(|body| navigate(body, target.segments()))
                .and_then(Value::as_object_mut)
                .map(|object| object.insert(name.clone(), value.clone()))
                .is_some(),
            Mutation::RawBody { text } => {
                self.raw_body = Some(text.clone());
                true
            }
        }
    }
}

/// Walk body segments; `[]` steps into the first array element
fn navigate<'v>(value: &'v mut Value, segments: &[String]) -> Option<&'v mut Value> {
    let mut current = value;
    for segment in segments {
        current = if segment == ITEM_SEGMENT {
            current.as_array_mut()?.first_mut()?
        } else {
            current.as_object_mut()?.get_mut(segment)?
        };
    }
    Some(current)
}

fn set_at(body: &mut Value, segments: &[String], value: Value) -> bool {
    let Some((last, parents)) = segments.split_last() else {
        *body = value;
        return true;
    };
    let Some(parent) = navigate(body, parents) else {
        return false;
    };
    if last == ITEM_SEGMENT {
        match parent.as_array_mut().and_then(|items| items.first_mut()) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    } else {
        match parent.as_object_mut() {
            Some(object) => {
                object.insert(last.clone(), value);
                true
            }
            None => false,
        }
    }
}

fn remove_at(body: &mut Value, segments: &[String]) -> bool {
    let Some((last, parents)) = segments.split_last() else {
        return false;
    };
    navigate(body, parents)
        .and_then(Value::as_object_mut)
        .and_then(|object| object.remove(last))
        .is_some()
}

/// Text form of a parameter value; arrays join with `,`
#[must_use]
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(items) => items.iter().map(value_text).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

/// Preference order of request media types, lower first
#[must_use]
pub fn media_rank(media_type: &str) -> u8 {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if is_json_like(&essence) {
        0
    } else if essence == "application/x-www-form-urlencoded" {
        1
    } else if essence.starts_with("multipart/") {
        2
    } else if essence.starts_with("text/") {
        3
    } else {
        4
    }
}

/// Best-ranked media entry, first declared among equals
#[must_use]
pub fn choose_media(content: &IndexMap<String, MediaSpec>) -> Option<(&String, &MediaSpec)> {
    content.iter().min_by_key(|(media_type, _)| media_rank(media_type))
}

fn object_pairs(value: &Value) -> Vec<(String, String)> {
    match value {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), value_text(v))).collect(),
        other => vec![("value".to_string(), value_text(other))],
    }
}

/// Per-operation rendering context
#[derive(Debug, Clone)]
pub struct RequestRenderer {
    pub operation: OperationId,
    pub operation_id: String,
    pub strategy: SynthesisStrategy,
    pub method: HttpMethod,
    pub path: String,
    pub media_type: Option<String>,
    pub boundary: String,
    pub base_url: Option<String>,
    /// Headers from rules, applied after parameters
    pub extra_headers: Vec<ResolvedHeader>,
}

impl RequestRenderer {
    /// Create renderer; the multipart boundary derives from the operation id
    #[must_use]
    pub fn new(
        operation: OperationId,
        operation_id: impl Into<String>,
        strategy: SynthesisStrategy,
        method: HttpMethod,
        path: impl Into<String>,
        media_type: Option<String>,
    ) -> Self {
        let operation_id = operation_id.into();
        let boundary = format!("specops-{}", DocumentHash::compute(operation_id.as_bytes()).short());
        Self {
            operation,
            operation_id,
            strategy,
            method,
            path: path.into(),
            media_type,
            boundary,
            base_url: None,
            extra_headers: Vec::new(),
        }
    }

    /// With server base URL
    #[inline]
    #[must_use]
    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = base_url;
        self
    }

    /// With rule headers
    #[inline]
    #[must_use]
    pub fn with_extra_headers(mut self, headers: Vec<ResolvedHeader>) -> Self {
        self.extra_headers = headers;
        self
    }

    /// Render one draft into a request descriptor
    #[must_use]
    pub fn render(&self, draft: &RequestDraft, label: String, target: FieldPath) -> SynthesizedRequest {
        let mut path = self.path.clone();
        let mut query = Vec::new();
        let mut headers = Vec::new();
        let mut cookies = Vec::new();

        for ((location, name), value) in &draft.params {
            let text = value_text(value);
            match location {
                ParameterLocation::Path => {
                    path = path.replace(&format!("{{{name}}}"), &urlencoding::encode(&text));
                }
                ParameterLocation::Query => query.push((name.clone(), text)),
                ParameterLocation::Header => {
                    if is_managed_header(name) {
                        tracing::debug!("Skipping managed header {} for {}", name, self.operation_id);
                    } else {
                        headers.push((name.clone(), text));
                    }
                }
                ParameterLocation::Cookie => cookies.push(format!("{name}={text}")),
            }
        }
        if !cookies.is_empty() {
            headers.push(("Cookie".to_string(), cookies.join("; ")));
        }
        self.apply_extra_headers(&mut headers, &target);

        SynthesizedRequest {
            operation: self.operation,
            operation_id: self.operation_id.clone(),
            strategy: self.strategy,
            label,
            target,
            method: self.method,
            base_url: self.base_url.clone(),
            path,
            query,
            headers,
            body: self.render_body(draft),
        }
    }

    /// A rule never restores a header the variant deliberately targets
    fn apply_extra_headers(&self, headers: &mut Vec<(String, String)>, target: &FieldPath) {
        for extra in &self.extra_headers {
            let targeted = target.location() == FieldLocation::Header
                && target.segments().first().is_some_and(|n| n.eq_ignore_ascii_case(&extra.name));
            if targeted {
                continue;
            }
            match headers.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(&extra.name)) {
                Some(existing) if extra.overwrite => existing.1 = extra.value.clone(),
                Some(_) => {}
                None => headers.push((extra.name.clone(), extra.value.clone())),
            }
        }
    }

    fn render_body(&self, draft: &RequestDraft) -> Option<SynthesizedBody> {
        let media_type = self
            .media_type
            .clone()
            .unwrap_or_else(|| "application/json".to_string());
        if let Some(text) = &draft.raw_body {
            return Some(SynthesizedBody {
                content_type: media_type,
                payload: Payload::Raw(text.clone()),
            });
        }
        let body = draft.body.as_ref()?;
        let body = match media_rank(&media_type) {
            0 => SynthesizedBody {
                content_type: media_type,
                payload: Payload::Json(body.clone()),
            },
            1 => SynthesizedBody {
                content_type: media_type,
                payload: Payload::Form(object_pairs(body)),
            },
            2 => SynthesizedBody {
                content_type: format!("multipart/form-data; boundary={}", self.boundary),
                payload: Payload::Multipart {
                    boundary: self.boundary.clone(),
                    parts: object_pairs(body),
                },
            },
            _ => SynthesizedBody {
                content_type: media_type,
                payload: Payload::Raw(value_text(body)),
            },
        };
        Some(body)
    }
}

/// Empty JSON object
#[must_use]
pub(crate) fn empty_object() -> Value {
    Value::Object(Map::new())
}
