//! Field paths for addressing values within a request
//!
//! Provides [`FieldPath`] for naming the exact request field a synthesized
//! variant targets, e.g. `body.items[].quantity` or `query.limit`.

use crate::spec::ParameterLocation;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Segment marking "any element of the enclosing array"
pub const ITEM_SEGMENT: &str = "[]";

/// Part of the request a field lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldLocation {
    Path,
    Query,
    Header,
    Cookie,
    Body,
}

impl FieldLocation {
    /// Prefix used in the textual form
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Path => "path",
            Self::Query => "query",
            Self::Header => "header",
            Self::Cookie => "cookie",
            Self::Body => "body",
        }
    }
}

impl From<ParameterLocation> for FieldLocation {
    fn from(location: ParameterLocation) -> Self {
        match location {
            ParameterLocation::Path => Self::Path,
            ParameterLocation::Query => Self::Query,
            ParameterLocation::Header => Self::Header,
            ParameterLocation::Cookie => Self::Cookie,
        }
    }
}

/// Path to a field within a request
///
/// # Examples
/// - `body` → the whole request body
/// - `body.items[].quantity` → `quantity` of every element of `items`
/// - `header.X-Trace-Id` → a header parameter
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldPath {
    location: FieldLocation,
    segments: Vec<String>,
}

impl FieldPath {
    /// Root of a request location
    #[inline]
    #[must_use]
    pub fn root(location: FieldLocation) -> Self {
        Self {
            location,
            segments: Vec::new(),
        }
    }

    /// Root of the request body
    #[inline]
    #[must_use]
    pub fn body() -> Self {
        Self::root(FieldLocation::Body)
    }

    /// Path naming a parameter
    #[inline]
    #[must_use]
    pub fn parameter(location: ParameterLocation, name: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            segments: vec![name.into()],
        }
    }

    /// Request location this path starts in
    #[inline]
    #[must_use]
    pub const fn location(&self) -> FieldLocation {
        self.location
    }

    /// Path segments below the location
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments below the location
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Append a property name, returning new path
    #[inline]
    #[must_use]
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut new = self.clone();
        new.segments.push(name.into());
        new
    }

    /// Append the array-element marker, returning new path
    #[inline]
    #[must_use]
    pub fn item(&self) -> Self {
        self.child(ITEM_SEGMENT)
    }

    /// Get parent path (if not a location root)
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            None
        } else {
            Some(Self {
                location: self.location,
                segments: self.segments[..self.segments.len() - 1].to_vec(),
            })
        }
    }

    /// Last segment that is a property name (skips item markers)
    #[must_use]
    pub fn last_name(&self) -> Option<&str> {
        self.segments
            .iter()
            .rev()
            .map(String::as_str)
            .find(|s| *s != ITEM_SEGMENT)
    }

    /// Check if this path is a prefix of another
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.location == other.location
            && self.segments.len() <= other.segments.len()
            && self.segments == other.segments[..self.segments.len()]
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.location.as_str())?;
        for segment in &self.segments {
            if segment == ITEM_SEGMENT {
                f.write_str(ITEM_SEGMENT)?;
            } else {
                write!(f, ".{segment}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = FieldPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (head, rest) = match s.find(['.', '[']) {
            Some(pos) => (&s[..pos], &s[pos..]),
            None => (s, ""),
        };
        let location = match head {
            "path" => FieldLocation::Path,
            "query" => FieldLocation::Query,
            "header" => FieldLocation::Header,
            "cookie" => FieldLocation::Cookie,
            "body" => FieldLocation::Body,
            other => return Err(FieldPathError::UnknownLocation(other.to_string())),
        };

        let mut path = Self::root(location);
        let mut remaining = rest;
        while !remaining.is_empty() {
            if let Some(after) = remaining.strip_prefix(ITEM_SEGMENT) {
                path.segments.push(ITEM_SEGMENT.to_string());
                remaining = after;
            } else if let Some(after) = remaining.strip_prefix('.') {
                let end = after.find(['.', '[']).unwrap_or(after.len());
                if end == 0 {
                    return Err(FieldPathError::EmptySegment);
                }
                path.segments.push(after[..end].to_string());
                remaining = &after[end..];
            } else {
                return Err(FieldPathError::InvalidSegment(remaining.to_string()));
            }
        }
        Ok(path)
    }
}

impl Serialize for FieldPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Field path parsing errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldPathError {
    /// Path does not start with a known request location
    #[error("unknown field location: '{0}'")]
    UnknownLocation(String),

    /// Empty segment between dots
    #[error("empty field path segment")]
    EmptySegment,

    /// Unparsable remainder
    #[error("invalid field path segment: '{0}'")]
    InvalidSegment(String),
}
