//! Schema node arena
//!
//! Resolved schemas live in a [`SchemaArena`] and are addressed by
//! [`SchemaId`] handles. Repeated references to one component share a handle;
//! cyclic references are cut with a [`SchemaNode::Reference`] node that points
//! back into the arena instead of unrolling the cycle.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Handle to a schema in a [`SchemaArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaId(pub usize);

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "schema#{}", self.0)
    }
}

/// A schema: structural node plus annotations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub meta: SchemaMeta,
    pub node: SchemaNode,
}

impl Schema {
    /// Schema accepting any value
    #[inline]
    #[must_use]
    pub fn any() -> Self {
        Self::primitive(PrimitiveKind::Any)
    }

    /// Unconstrained primitive of the given kind
    #[inline]
    #[must_use]
    pub fn primitive(kind: PrimitiveKind) -> Self {
        Self {
            meta: SchemaMeta::default(),
            node: SchemaNode::Primitive {
                kind,
                format: None,
                constraints: Constraints::default(),
            },
        }
    }

    /// Attach metadata
    #[inline]
    #[must_use]
    pub fn with_meta(mut self, meta: SchemaMeta) -> Self {
        self.meta = meta;
        self
    }
}

/// Annotations that do not change a schema's structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub write_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Structural variant of a schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaNode {
    /// Scalar value with its declared constraints
    Primitive {
        #[serde(rename = "type")]
        kind: PrimitiveKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        format: Option<String>,
        constraints: Constraints,
    },

    /// Object with named properties
    Object {
        properties: IndexMap<String, SchemaId>,
        required: IndexSet<String>,
        additional: AdditionalProperties,
        #[serde(skip_serializing_if = "Option::is_none")]
        min_properties: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max_properties: Option<u64>,
    },

    /// Homogeneous array
    Array {
        #[serde(skip_serializing_if = "Option::is_none")]
        items: Option<SchemaId>,
        #[serde(skip_serializing_if = "Option::is_none")]
        min_items: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max_items: Option<u64>,
        #[serde(default)]
        unique_items: bool,
    },

    /// oneOf / anyOf / allOf composition
    Union {
        #[serde(rename = "union")]
        kind: UnionKind,
        branches: Vec<SchemaId>,
    },

    /// Back-edge of a reference cycle, expanded at most `max_expansions` times
    /// along any one path
    Reference {
        pointer: String,
        target: SchemaId,
        max_expansions: u32,
    },
}

impl SchemaNode {
    /// Short name of the node's type, used in diagnostics
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Primitive { kind, .. } => kind.as_str(),
            Self::Object { .. } => "object",
            Self::Array { .. } => "array",
            Self::Union { kind, .. } => kind.as_str(),
            Self::Reference { .. } => "reference",
        }
    }
}

/// Scalar type of a primitive node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    String,
    Integer,
    Number,
    Boolean,
    Null,
    /// No type declared
    Any,
}

impl PrimitiveKind {
    /// Name as written in documents
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Null => "null",
            Self::Any => "any",
        }
    }

    /// Integer or number
    #[inline]
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Number)
    }
}

/// Which union keyword produced a [`SchemaNode::Union`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnionKind {
    OneOf,
    AnyOf,
    AllOf,
}

impl UnionKind {
    /// Keyword as written in documents
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneOf => "oneOf",
            Self::AnyOf => "anyOf",
            Self::AllOf => "allOf",
        }
    }
}

/// `additionalProperties` policy of an object
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdditionalProperties {
    /// Absent or `true`
    #[default]
    Allowed,
    /// `false`
    Forbidden,
    /// Values must match a schema
    Schema(SchemaId),
}

/// Value constraints declared on a primitive
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(default)]
    pub exclusive_minimum: bool,
    #[serde(default)]
    pub exclusive_maximum: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enumeration: Vec<Value>,
}

impl Constraints {
    /// No constraint declared
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Append-only store of resolved schemas
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaArena {
    schemas: Vec<Schema>,
}

impl SchemaArena {
    /// Create empty arena
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a schema, returning its handle
    pub fn push(&mut self, schema: Schema) -> SchemaId {
        self.schemas.push(schema);
        SchemaId(self.schemas.len() - 1)
    }

    /// Replace a previously reserved slot
    ///
    /// Returns `false` if the handle does not belong to this arena.
    pub fn set(&mut self, id: SchemaId, schema: Schema) -> bool {
        match self.schemas.get_mut(id.0) {
            Some(slot) => {
                *slot = schema;
                true
            }
            None => false,
        }
    }

    /// Look up a schema
    #[inline]
    #[must_use]
    pub fn get(&self, id: SchemaId) -> Option<&Schema> {
        self.schemas.get(id.0)
    }

    /// Number of stored schemas
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Check if arena is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Follow reference nodes until a structural node is reached
    ///
    /// Gives up after `len()` hops, which only a malformed arena can reach.
    #[must_use]
    pub fn resolve(&self, id: SchemaId) -> Option<&Schema> {
        let mut current = self.get(id)?;
        for _ in 0..=self.schemas.len() {
            match &current.node {
                SchemaNode::Reference { target, .. } => current = self.get(*target)?,
                _ => return Some(current),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_get() {
        let mut arena = SchemaArena::new();
        let id = arena.push(Schema::primitive(PrimitiveKind::String));
        assert_eq!(id, SchemaId(0));
        assert_eq!(arena.get(id).unwrap().node.type_name(), "string");
        assert!(arena.get(SchemaId(5)).is_none());
    }

    #[test]
    fn set_replaces_reserved_slot() {
        let mut arena = SchemaArena::new();
        let id = arena.push(Schema::any());
        assert!(arena.set(id, Schema::primitive(PrimitiveKind::Integer)));
        assert_eq!(arena.get(id).unwrap().node.type_name(), "integer");
        assert!(!arena.set(SchemaId(9), Schema::any()));
    }

    #[test]
    fn resolve_follows_reference_chain() {
        let mut arena = SchemaArena::new();
        let target = arena.push(Schema::primitive(PrimitiveKind::Boolean));
        let reference = arena.push(Schema {
            meta: SchemaMeta::default(),
            node: SchemaNode::Reference {
                pointer: "#/components/schemas/Flag".to_string(),
                target,
                max_expansions: 1,
            },
        });
        assert_eq!(arena.resolve(reference).unwrap().node.type_name(), "boolean");
    }

    #[test]
    fn resolve_gives_up_on_self_loop() {
        let mut arena = SchemaArena::new();
        let id = arena.push(Schema::any());
        arena.set(
            id,
            Schema {
                meta: SchemaMeta::default(),
                node: SchemaNode::Reference {
                    pointer: "#/loop".to_string(),
                    target: id,
                    max_expansions: 1,
                },
            },
        );
        assert!(arena.resolve(id).is_none());
    }

    #[test]
    fn constraints_empty() {
        assert!(Constraints::default().is_empty());
        let c = Constraints {
            min_length: Some(3),
            ..Constraints::default()
        };
        assert!(!c.is_empty());
    }
}
