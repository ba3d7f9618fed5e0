//! Compiled path templates
//!
//! A template is split on `/` into segments once, at matcher construction.
//! Matching a concrete path is then a segment-by-segment comparison against
//! every template of the same length.

use indexmap::IndexMap;
use regex::Regex;
use smallvec::SmallVec;
use specops_model::placeholder_names;
use std::borrow::Cow;

/// One `/`-separated piece of a template
#[derive(Debug, Clone)]
pub enum Segment {
    /// Must equal the concrete token exactly
    Literal(String),
    /// `{name}`: binds any non-empty token
    Placeholder(String),
    /// Literal text around placeholders, e.g. `{name}.json`
    Mixed { regex: Regex, names: Vec<String> },
}

impl Segment {
    /// Parse one template segment
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if let Some(name) = raw.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
            if !name.is_empty() && !name.contains(['{', '}']) {
                return Self::Placeholder(name.to_string());
            }
        }
        if !raw.contains('{') {
            return Self::Literal(raw.to_string());
        }
        match Self::mixed(raw) {
            Some(segment) => segment,
            None => {
                tracing::warn!("Cannot compile template segment '{}', matching literally", raw);
                Self::Literal(raw.to_string())
            }
        }
    }

    fn mixed(raw: &str) -> Option<Self> {
        let names = placeholder_names(raw).ok()?;
        let mut pattern = String::from("^");
        let mut rest = raw;
        while let Some(open) = rest.find('{') {
            pattern.push_str(&regex::escape(&rest[..open]));
            let close = rest[open..].find('}')? + open;
            pattern.push_str("(.+?)");
            rest = &rest[close + 1..];
        }
        pattern.push_str(&regex::escape(rest));
        pattern.push('$');
        let regex = Regex::new(&pattern).ok()?;
        Some(Self::Mixed { regex, names })
    }

    /// Whether this segment binds a value
    #[inline]
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        !matches!(self, Self::Literal(_))
    }

    /// Match one decoded token, pushing bindings on success
    fn bind(&self, token: &str, bindings: &mut IndexMap<String, String>) -> bool {
        match self {
            Self::Literal(literal) => literal == token,
            Self::Placeholder(name) => {
                if token.is_empty() {
                    return false;
                }
                bindings.insert(name.clone(), token.to_string());
                true
            }
            Self::Mixed { regex, names } => {
                let Some(captures) = regex.captures(token) else {
                    return false;
                };
                for (name, value) in names.iter().zip(captures.iter().skip(1)) {
                    let value = value.map_or("", |m| m.as_str());
                    bindings.insert(name.clone(), value.to_string());
                }
                true
            }
        }
    }
}

/// Template compiled for matching
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    /// Declaration index in the specification
    pub index: usize,
    /// Template path as declared
    pub path: String,
    segments: SmallVec<[Segment; 8]>,
    placeholder_count: usize,
}

impl CompiledTemplate {
    /// Compile a declared template path
    #[must_use]
    pub fn compile(index: usize, path: &str) -> Self {
        let segments: SmallVec<[Segment; 8]> = split_segments(path).map(Segment::parse).collect();
        let placeholder_count = segments.iter().filter(|s| s.is_placeholder()).count();
        Self {
            index,
            path: path.to_string(),
            segments,
            placeholder_count,
        }
    }

    /// Number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether this is the root template `/`
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of binding segments, mixed segments included
    #[inline]
    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        self.placeholder_count
    }

    /// Tie-break key: fewer placeholders first, then declaration order
    #[inline]
    #[must_use]
    pub fn priority(&self) -> (usize, usize) {
        (self.placeholder_count, self.index)
    }

    /// Segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Match decoded path tokens, returning the placeholder bindings
    #[must_use]
    pub fn bind(&self, tokens: &[Cow<'_, str>]) -> Option<IndexMap<String, String>> {
        if tokens.len() != self.segments.len() {
            return None;
        }
        let mut bindings = IndexMap::new();
        for (segment, token) in self.segments.iter().zip(tokens) {
            if !segment.bind(token, &mut bindings) {
                return None;
            }
        }
        Some(bindings)
    }
}

/// Segments of a path: leading `/` and one trailing `/` dropped
fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    let path = path.strip_prefix('/').unwrap_or(path);
    let path = path.strip_suffix('/').unwrap_or(path);
    path.split('/').filter(move |_| !path.is_empty())
}

/// Split and percent-decode a concrete path
#[must_use]
pub fn tokenize(path: &str) -> Vec<Cow<'_, str>> {
    split_segments(path)
        .map(|token| urlencoding::decode(token).unwrap_or(Cow::Borrowed(token)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_are_classified() {
        let t = CompiledTemplate::compile(0, "/users/{id}/files/{name}.json");
        assert_eq!(t.len(), 4);
        assert_eq!(t.placeholder_count(), 2);
        assert!(matches!(t.segments()[0], Segment::Literal(_)));
        assert!(matches!(t.segments()[1], Segment::Placeholder(_)));
        assert!(matches!(t.segments()[3], Segment::Mixed { .. }));
    }

    #[test]
    fn root_template_has_no_segments() {
        assert!(CompiledTemplate::compile(0, "/").is_empty());
        assert!(tokenize("/").is_empty());
    }

    #[test]
    fn trailing_slash_is_ignored() {
        assert_eq!(tokenize("/users/42/"), tokenize("/users/42"));
    }

    #[test]
    fn binds_decoded_tokens() {
        let t = CompiledTemplate::compile(0, "/users/{id}");
        let bindings = t.bind(&tokenize("/users/j%C3%B6rg")).unwrap();
        assert_eq!(bindings["id"], "jörg");
    }

    #[test]
    fn empty_token_does_not_bind_placeholder() {
        let t = CompiledTemplate::compile(0, "/a/{id}/b");
        assert!(t.bind(&tokenize("/a//b")).is_none());
    }

    #[test]
    fn mixed_segment_binds_around_literals() {
        let t = CompiledTemplate::compile(0, "/files/{name}.{ext}");
        let bindings = t.bind(&tokenize("/files/report.v2.pdf")).unwrap();
        assert_eq!(bindings["name"], "report");
        assert_eq!(bindings["ext"], "v2.pdf");
        assert!(t.bind(&tokenize("/files/report")).is_none());
    }

    #[test]
    fn regex_metacharacters_stay_literal() {
        let t = CompiledTemplate::compile(0, "/v1.0/{id}+x");
        assert!(t.bind(&tokenize("/v1.0/7+x")).is_some());
        assert!(t.bind(&tokenize("/v1x0/7+x")).is_none());
    }
}
