//! Observed traffic records
//!
//! The host proxy hands the core already-parsed requests. Both passive traffic
//! and the replayed results of synthesized requests arrive as
//! [`ObservedRequest`]; [`RequestOrigin`] tells them apart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Generation policy of a synthesized request
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisStrategy {
    /// Values satisfying every constraint
    Valid,
    /// Values at and just past each constraint's limits
    Boundary,
    /// Type mismatches, oversized values and injection payloads
    Malformed,
}

impl SynthesisStrategy {
    /// All strategies
    pub const ALL: [SynthesisStrategy; 3] = [Self::Valid, Self::Boundary, Self::Malformed];

    /// Lowercase name
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Boundary => "boundary",
            Self::Malformed => "malformed",
        }
    }
}

impl fmt::Display for SynthesisStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SynthesisStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown synthesis strategy: '{s}'"))
    }
}

/// Where an observed request came from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestOrigin {
    /// Captured from real client traffic
    #[default]
    Passive,
    /// Produced by the synthesizer and executed by the host
    Synthesized(SynthesisStrategy),
}

impl RequestOrigin {
    /// Whether the request carries a synthesis tag
    #[inline]
    #[must_use]
    pub const fn is_synthesized(self) -> bool {
        matches!(self, Self::Synthesized(_))
    }
}

/// Response correlated with an observed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedResponse {
    pub status: u16,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl ObservedResponse {
    /// Response with a status and nothing else
    #[inline]
    #[must_use]
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: None,
        }
    }
}

/// A single request seen on the wire (or about to be)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedRequest {
    /// Uppercase method name, possibly outside the declarable set
    pub method: String,
    /// Path without query string
    pub path: String,
    #[serde(default)]
    pub query: Vec<(String, String)>,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ObservedResponse>,
    #[serde(default)]
    pub origin: RequestOrigin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<DateTime<Utc>>,
}

impl ObservedRequest {
    /// Create request from a method and a request target
    ///
    /// A `?query` suffix is split off and decoded into [`Self::query`]; a
    /// `#fragment` is dropped.
    #[must_use]
    pub fn new(method: impl AsRef<str>, target: impl AsRef<str>) -> Self {
        let target = target.as_ref();
        let target = target.split('#').next().unwrap_or_default();
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (target, Vec::new()),
        };
        Self {
            method: method.as_ref().trim().to_ascii_uppercase(),
            path: path.to_string(),
            query,
            headers: Vec::new(),
            body: None,
            response: None,
            origin: RequestOrigin::Passive,
            observed_at: None,
        }
    }

    /// With header
    #[inline]
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// With query pair
    #[inline]
    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// With body
    #[inline]
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// With origin
    #[inline]
    #[must_use]
    pub fn with_origin(mut self, origin: RequestOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// With correlated response
    #[inline]
    #[must_use]
    pub fn with_response(mut self, response: ObservedResponse) -> Self {
        self.response = Some(response);
        self
    }

    /// With observation time
    #[inline]
    #[must_use]
    pub fn observed_at(mut self, at: DateTime<Utc>) -> Self {
        self.observed_at = Some(at);
        self
    }

    /// First header value with this name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// First query value with this name
    #[must_use]
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Cookies from every `Cookie` header, in order
    #[must_use]
    pub fn cookies(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case("cookie"))
            .flat_map(|(_, v)| v.split(';'))
            .filter_map(|pair| {
                let pair = pair.trim();
                if pair.is_empty() {
                    return None;
                }
                Some(match pair.split_once('=') {
                    Some((name, value)) => (name.trim().to_string(), value.trim().to_string()),
                    None => (pair.to_string(), String::new()),
                })
            })
            .collect()
    }

    /// Response status, if a response was correlated
    #[inline]
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status)
    }
}

/// Decode an `application/x-www-form-urlencoded` query string
#[must_use]
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(name), decode_component(value))
        })
        .collect()
}

fn decode_component(text: &str) -> String {
    let spaced = text.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn new_splits_query_and_fragment() {
        let req = ObservedRequest::new("get", "/users?limit=10&name=a%20b+c#top");
        assert_eq!(req.method, "GET");
        assert_eq!(req.path, "/users");
        assert_eq!(
            req.query,
            vec![
                ("limit".to_string(), "10".to_string()),
                ("name".to_string(), "a b c".to_string()),
            ]
        );
    }

    #[test]
    fn header_lookup_ignores_case() {
        let req = ObservedRequest::new("GET", "/").with_header("X-Trace-Id", "abc");
        assert_eq!(req.header("x-trace-id"), Some("abc"));
        assert_eq!(req.header("missing"), None);
    }

    #[test]
    fn cookies_parsed_from_all_cookie_headers() {
        let req = ObservedRequest::new("GET", "/")
            .with_header("Cookie", "session=abc; theme=dark")
            .with_header("cookie", "flag");
        assert_eq!(
            req.cookies(),
            vec![
                ("session".to_string(), "abc".to_string()),
                ("theme".to_string(), "dark".to_string()),
                ("flag".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn origin_defaults_to_passive() {
        let req = ObservedRequest::new("GET", "/");
        assert_eq!(req.origin, RequestOrigin::Passive);
        assert!(!req.origin.is_synthesized());
        let tagged = req.with_origin(RequestOrigin::Synthesized(SynthesisStrategy::Boundary));
        assert!(tagged.origin.is_synthesized());
    }

    #[test]
    fn strategy_parse() {
        assert_eq!("Malformed".parse::<SynthesisStrategy>(), Ok(SynthesisStrategy::Malformed));
        assert!("fuzz".parse::<SynthesisStrategy>().is_err());
    }

    #[test]
    fn deserializes_minimal_json_record() {
        let req: ObservedRequest =
            serde_json::from_str(r#"{"method":"GET","path":"/users/42"}"#).unwrap();
        assert_eq!(req.path, "/users/42");
        assert_eq!(req.origin, RequestOrigin::Passive);
        assert!(req.query.is_empty());
    }
}
