//! Materialized schema shapes
//!
//! Synthesis never walks the schema arena directly. Each parameter and body
//! schema is first materialized into a finite [`Shape`] tree:
//!
//! - `allOf` branches are merged into one shape, intersecting constraints;
//! - `oneOf` / `anyOf` become a [`ShapeKind::Choice`] of branch shapes;
//! - cyclic references expand at most `max_expansions` times along one path,
//!   and any subtree deeper than `max_depth` is cut to [`ShapeKind::Truncated`].
//!
//! Constraint sets that admit no value are rejected here, so generators only
//! ever see satisfiable shapes.

use crate::error::{SynthResult, SynthesisError};
use crate::values::{integer_value, is_multiple, number_value};
use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use specops_model::{
    AdditionalProperties, Constraints, FieldPath, PrimitiveKind, SchemaArena, SchemaId, SchemaMeta,
    SchemaNode, UnionKind,
};
use std::collections::HashMap;

/// Finite, reference-free view of a schema
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub meta: SchemaMeta,
    pub kind: ShapeKind,
}

/// Shape variants
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeKind {
    Scalar {
        kind: PrimitiveKind,
        format: Option<String>,
        constraints: Constraints,
    },
    Object {
        properties: IndexMap<String, Shape>,
        required: IndexSet<String>,
        additional: Additional,
    },
    Array {
        items: Option<Box<Shape>>,
        min_items: Option<u64>,
        max_items: Option<u64>,
    },
    /// `oneOf` / `anyOf` branches
    Choice(Vec<Shape>),
    /// Cut by the cycle or depth limit
    Truncated,
}

/// Extra-property policy of an object shape
#[derive(Debug, Clone, PartialEq)]
pub enum Additional {
    Allowed,
    Forbidden,
    Schema(Box<Shape>),
}

impl Shape {
    fn new(meta: SchemaMeta, kind: ShapeKind) -> Self {
        Self { meta, kind }
    }

    /// Cut subtree
    #[must_use]
    pub fn truncated() -> Self {
        Self::new(SchemaMeta::default(), ShapeKind::Truncated)
    }

    /// Whether this subtree was cut
    #[inline]
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        matches!(self.kind, ShapeKind::Truncated)
    }

    /// Short type label for case descriptions
    #[must_use]
    pub fn type_label(&self) -> &'static str {
        match &self.kind {
            ShapeKind::Scalar { kind, .. } => kind.as_str(),
            ShapeKind::Object { .. } => "object",
            ShapeKind::Array { .. } => "array",
            ShapeKind::Choice(_) => "union",
            ShapeKind::Truncated => "truncated",
        }
    }
}

/// Materializes arena schemas into shapes
#[derive(Debug)]
pub struct ShapeBuilder<'a> {
    arena: &'a SchemaArena,
    max_depth: usize,
    /// Live expansion count per cyclic pointer along the current path
    expansions: HashMap<String, u32>,
}

impl<'a> ShapeBuilder<'a> {
    /// Create builder
    #[must_use]
    pub fn new(arena: &'a SchemaArena, max_depth: usize) -> Self {
        Self {
            arena,
            max_depth,
            expansions: HashMap::new(),
        }
    }

    /// Materialize the schema at `id`, reporting problems against `field`
    ///
    /// # Errors
    /// - conflicting constraints in one schema or across `allOf` branches
    /// - [`SynthesisError::UnsupportedSchemaShape`] for unmergeable patterns
    ///   or dangling handles
    pub fn build(&mut self, id: SchemaId, field: &FieldPath) -> SynthResult<Shape> {
        self.build_at(id, field, 0)
    }

    fn build_at(&mut self, id: SchemaId, field: &FieldPath, depth: usize) -> SynthResult<Shape> {
        if depth > self.max_depth {
            return Ok(Shape::truncated());
        }
        let schema = self
            .arena
            .get(id)
            .ok_or_else(|| SynthesisError::unsupported(field, format!("dangling {id}")))?;
        let meta = schema.meta.clone();

        match &schema.node {
            SchemaNode::Primitive {
                kind,
                format,
                constraints,
            } => {
                check_constraints(constraints, field)?;
                check_admissible(*kind, constraints, field)?;
                Ok(Shape::new(
                    meta,
                    ShapeKind::Scalar {
                        kind: *kind,
                        format: format.clone(),
                        constraints: constraints.clone(),
                    },
                ))
            }
            SchemaNode::Object {
                properties,
                required,
                additional,
                ..
            } => {
                let mut props = IndexMap::with_capacity(properties.len());
                for (name, prop) in properties {
                    props.insert(name.clone(), self.build_at(*prop, &field.child(name), depth + 1)?);
                }
                let additional = match additional {
                    AdditionalProperties::Allowed => Additional::Allowed,
                    AdditionalProperties::Forbidden => Additional::Forbidden,
                    AdditionalProperties::Schema(extra) => Additional::Schema(Box::new(
                        self.build_at(*extra, &field.child("*"), depth + 1)?,
                    )),
                };
                Ok(Shape::new(
                    meta,
                    ShapeKind::Object {
                        properties: props,
                        required: required.clone(),
                        additional,
                    },
                ))
            }
            SchemaNode::Array {
                items,
                min_items,
                max_items,
                ..
            } => {
                if let (Some(min), Some(max)) = (min_items, max_items) {
                    if min > max {
                        return Err(SynthesisError::conflict(
                            field,
                            format!("minItems {min} exceeds maxItems {max}"),
                        ));
                    }
                }
                let items = match items {
                    Some(items) => Some(Box::new(self.build_at(*items, &field.item(), depth + 1)?)),
                    None => None,
                };
                Ok(Shape::new(
                    meta,
                    ShapeKind::Array {
                        items,
                        min_items: *min_items,
                        max_items: *max_items,
                    },
                ))
            }
            SchemaNode::Union { kind, branches } => {
                let mut shapes = Vec::with_capacity(branches.len());
                for branch in branches {
                    shapes.push(self.build_at(*branch, field, depth + 1)?);
                }
                match kind {
                    UnionKind::AllOf => {
                        let mut merged = shapes
                            .into_iter()
                            .try_fold(None::<Shape>, |acc, next| -> SynthResult<_> {
                                Ok(Some(match acc {
                                    None => next,
                                    Some(acc) => merge(acc, next, field)?,
                                }))
                            })?
                            .unwrap_or_else(|| Shape::new(SchemaMeta::default(), any_scalar()));
                        merged.meta = overlay_meta(meta, merged.meta);
                        Ok(merged)
                    }
                    UnionKind::OneOf | UnionKind::AnyOf => {
                        Ok(Shape::new(meta, ShapeKind::Choice(shapes)))
                    }
                }
            }
            SchemaNode::Reference {
                pointer,
                target,
                max_expansions,
            } => {
                let used = self.expansions.get(pointer).copied().unwrap_or(0);
                if used >= *max_expansions {
                    tracing::debug!("Cycle at {} cut after {} expansions", field, used);
                    return Ok(Shape::truncated());
                }
                self.expansions.insert(pointer.clone(), used + 1);
                let built = self.build_at(*target, field, depth + 1);
                self.expansions.insert(pointer.clone(), used);
                built
            }
        }
    }
}

fn any_scalar() -> ShapeKind {
    ShapeKind::Scalar {
        kind: PrimitiveKind::Any,
        format: None,
        constraints: Constraints::default(),
    }
}

/// Metadata of an `allOf` wrapper takes precedence over its merged branches
fn overlay_meta(outer: SchemaMeta, inner: SchemaMeta) -> SchemaMeta {
    SchemaMeta {
        example: outer.example.or(inner.example),
        default: outer.default.or(inner.default),
        nullable: outer.nullable || inner.nullable,
        read_only: outer.read_only || inner.read_only,
        write_only: outer.write_only || inner.write_only,
        description: outer.description.or(inner.description),
    }
}

fn merge_meta(a: SchemaMeta, b: SchemaMeta) -> SchemaMeta {
    SchemaMeta {
        example: a.example.or(b.example),
        default: a.default.or(b.default),
        nullable: a.nullable && b.nullable,
        read_only: a.read_only || b.read_only,
        write_only: a.write_only || b.write_only,
        description: a.description.or(b.description),
    }
}

/// Merge two `allOf` branch shapes into one
///
/// # Errors
/// Conflicts when the branches admit no common value.
pub fn merge(a: Shape, b: Shape, field: &FieldPath) -> SynthResult<Shape> {
    let meta = merge_meta(a.meta.clone(), b.meta.clone());
    let kind = match (a.kind, b.kind) {
        (ShapeKind::Truncated, other) | (other, ShapeKind::Truncated) => other,

        (ShapeKind::Choice(branches), other) | (other, ShapeKind::Choice(branches)) => {
            let other = Shape::new(SchemaMeta::default(), other);
            let mut merged = Vec::with_capacity(branches.len());
            let mut first_error = None;
            for branch in branches {
                match merge(branch, other.clone(), field) {
                    Ok(shape) => merged.push(shape),
                    Err(e) => {
                        first_error.get_or_insert(e);
                    }
                }
            }
            match (merged.is_empty(), first_error) {
                (true, Some(e)) => return Err(e),
                _ => ShapeKind::Choice(merged),
            }
        }

        (
            ShapeKind::Scalar {
                kind: PrimitiveKind::Any,
                ..
            },
            other @ (ShapeKind::Object { .. } | ShapeKind::Array { .. }),
        )
        | (
            other @ (ShapeKind::Object { .. } | ShapeKind::Array { .. }),
            ShapeKind::Scalar {
                kind: PrimitiveKind::Any,
                ..
            },
        ) => other,

        (
            ShapeKind::Scalar {
                kind: ka,
                format: fa,
                constraints: ca,
            },
            ShapeKind::Scalar {
                kind: kb,
                format: fb,
                constraints: cb,
            },
        ) => {
            let kind = merge_kind(ka, kb).ok_or_else(|| {
                SynthesisError::conflict(field, format!("type {} vs {}", ka.as_str(), kb.as_str()))
            })?;
            let format = match (fa, fb) {
                (Some(x), Some(y)) if x != y => {
                    return Err(SynthesisError::conflict(field, format!("format {x} vs {y}")))
                }
                (x, y) => x.or(y),
            };
            let constraints = merge_constraints(ca, cb, field)?;
            check_admissible(kind, &constraints, field)?;
            ShapeKind::Scalar {
                kind,
                format,
                constraints,
            }
        }

        (
            ShapeKind::Object {
                properties: pa,
                required: ra,
                additional: aa,
            },
            ShapeKind::Object {
                properties: pb,
                required: rb,
                additional: ab,
            },
        ) => {
            let mut properties = pa;
            for (name, shape) in pb {
                let merged = match properties.shift_remove(&name) {
                    Some(existing) => merge(existing, shape, &field.child(&name))?,
                    None => shape,
                };
                properties.insert(name, merged);
            }
            let mut required = ra;
            required.extend(rb);
            let additional = match (aa, ab) {
                (Additional::Forbidden, _) | (_, Additional::Forbidden) => Additional::Forbidden,
                (Additional::Schema(s), _) | (_, Additional::Schema(s)) => Additional::Schema(s),
                (Additional::Allowed, Additional::Allowed) => Additional::Allowed,
            };
            ShapeKind::Object {
                properties,
                required,
                additional,
            }
        }

        (
            ShapeKind::Array {
                items: ia,
                min_items: mina,
                max_items: maxa,
            },
            ShapeKind::Array {
                items: ib,
                min_items: minb,
                max_items: maxb,
            },
        ) => {
            let items = match (ia, ib) {
                (Some(x), Some(y)) => Some(Box::new(merge(*x, *y, &field.item())?)),
                (x, y) => x.or(y),
            };
            let min_items = mina.max(minb);
            let max_items = match (maxa, maxb) {
                (Some(x), Some(y)) => Some(x.min(y)),
                (x, y) => x.or(y),
            };
            if let (Some(min), Some(max)) = (min_items, max_items) {
                if min > max {
                    return Err(SynthesisError::conflict(
                        field,
                        format!("empty item count range {min}..={max}"),
                    ));
                }
            }
            ShapeKind::Array {
                items,
                min_items,
                max_items,
            }
        }

        (x, y) => {
            return Err(SynthesisError::conflict(
                field,
                format!(
                    "type {} vs {}",
                    Shape::new(SchemaMeta::default(), x).type_label(),
                    Shape::new(SchemaMeta::default(), y).type_label()
                ),
            ))
        }
    };
    Ok(Shape::new(meta, kind))
}

fn merge_kind(a: PrimitiveKind, b: PrimitiveKind) -> Option<PrimitiveKind> {
    use PrimitiveKind::{Any, Integer, Number};
    match (a, b) {
        (x, y) if x == y => Some(x),
        (Any, other) | (other, Any) => Some(other),
        (Integer, Number) | (Number, Integer) => Some(Integer),
        _ => None,
    }
}

/// Intersect two constraint sets; the tighter bound wins
fn merge_constraints(a: Constraints, b: Constraints, field: &FieldPath) -> SynthResult<Constraints> {
    let (minimum, exclusive_minimum) = tighter(
        (a.minimum, a.exclusive_minimum),
        (b.minimum, b.exclusive_minimum),
        |x, y| x > y,
    );
    let (maximum, exclusive_maximum) = tighter(
        (a.maximum, a.exclusive_maximum),
        (b.maximum, b.exclusive_maximum),
        |x, y| x < y,
    );

    let multiple_of = match (a.multiple_of, b.multiple_of) {
        (Some(x), Some(y)) => {
            let (small, large) = if x <= y { (x, y) } else { (y, x) };
            if small > 0.0 && is_multiple(large, small) {
                Some(large)
            } else {
                Some(x * y)
            }
        }
        (x, y) => x.or(y),
    };

    let pattern = match (a.pattern, b.pattern) {
        (Some(x), Some(y)) if x != y => {
            return Err(SynthesisError::unsupported(
                field,
                format!("cannot combine patterns '{x}' and '{y}'"),
            ))
        }
        (x, y) => x.or(y),
    };

    let enumeration = match (a.enumeration.is_empty(), b.enumeration.is_empty()) {
        (false, false) => {
            let common: Vec<Value> = a
                .enumeration
                .into_iter()
                .filter(|v| b.enumeration.contains(v))
                .collect();
            if common.is_empty() {
                return Err(SynthesisError::conflict(field, "disjoint enums"));
            }
            common
        }
        (true, _) => b.enumeration,
        (false, true) => a.enumeration,
    };

    let merged = Constraints {
        minimum,
        maximum,
        exclusive_minimum,
        exclusive_maximum,
        multiple_of,
        min_length: a.min_length.max(b.min_length),
        max_length: match (a.max_length, b.max_length) {
            (Some(x), Some(y)) => Some(x.min(y)),
            (x, y) => x.or(y),
        },
        pattern,
        enumeration,
    };
    check_constraints(&merged, field)?;
    Ok(merged)
}

/// Pick the tighter of two optional bounds; on a tie exclusivity wins
fn tighter(
    a: (Option<f64>, bool),
    b: (Option<f64>, bool),
    stricter: impl Fn(f64, f64) -> bool,
) -> (Option<f64>, bool) {
    match (a, b) {
        ((Some(x), ex), (Some(y), ey)) => {
            if stricter(x, y) {
                (Some(x), ex)
            } else if stricter(y, x) {
                (Some(y), ey)
            } else {
                (Some(x), ex || ey)
            }
        }
        ((Some(x), ex), (None, _)) => (Some(x), ex),
        ((None, _), (Some(y), ey)) => (Some(y), ey),
        ((None, _), (None, _)) => (None, false),
    }
}

/// Reject constraint sets no value satisfies
fn check_constraints(c: &Constraints, field: &FieldPath) -> SynthResult<()> {
    if let (Some(min), Some(max)) = (c.minimum, c.maximum) {
        let empty = min > max || (min == max && (c.exclusive_minimum || c.exclusive_maximum));
        if empty {
            return Err(SynthesisError::conflict(
                field,
                format!("empty numeric range {min}..{max}"),
            ));
        }
    }
    if let (Some(min), Some(max)) = (c.min_length, c.max_length) {
        if min > max {
            return Err(SynthesisError::conflict(
                field,
                format!("minLength {min} exceeds maxLength {max}"),
            ));
        }
    }
    if let Some(m) = c.multiple_of {
        if m <= 0.0 {
            return Err(SynthesisError::conflict(field, format!("multipleOf {m} is not positive")));
        }
    }
    Ok(())
}

/// Numeric ranges must hold at least one multiple of `multipleOf`
fn check_admissible(kind: PrimitiveKind, c: &Constraints, field: &FieldPath) -> SynthResult<()> {
    if !c.enumeration.is_empty() || (c.multiple_of.is_none() && kind != PrimitiveKind::Integer) {
        return Ok(());
    }
    let admissible = match kind {
        PrimitiveKind::Integer => integer_value(c).is_some(),
        PrimitiveKind::Number => number_value(c).is_some(),
        _ => true,
    };
    if admissible {
        Ok(())
    } else {
        Err(SynthesisError::conflict(
            field,
            format!(
                "no {} in {}..{} is a multiple of {}",
                kind.as_str(),
                c.minimum.map_or_else(|| "-inf".to_string(), |v| v.to_string()),
                c.maximum.map_or_else(|| "inf".to_string(), |v| v.to_string()),
                c.multiple_of.unwrap_or(1.0)
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use specops_model::Schema;

    fn string_with(constraints: Constraints) -> Schema {
        Schema {
            meta: SchemaMeta::default(),
            node: SchemaNode::Primitive {
                kind: PrimitiveKind::String,
                format: None,
                constraints,
            },
        }
    }

    fn all_of(arena: &mut SchemaArena, branches: Vec<SchemaId>) -> SchemaId {
        arena.push(Schema {
            meta: SchemaMeta::default(),
            node: SchemaNode::Union {
                kind: UnionKind::AllOf,
                branches,
            },
        })
    }

    #[test]
    fn all_of_takes_tighter_length() {
        let mut arena = SchemaArena::new();
        let a = arena.push(string_with(Constraints {
            min_length: Some(3),
            ..Constraints::default()
        }));
        let b = arena.push(Schema {
            meta: SchemaMeta::default(),
            node: SchemaNode::Primitive {
                kind: PrimitiveKind::Any,
                format: None,
                constraints: Constraints {
                    min_length: Some(5),
                    ..Constraints::default()
                },
            },
        });
        let id = all_of(&mut arena, vec![a, b]);
        let shape = ShapeBuilder::new(&arena, 8).build(id, &FieldPath::body()).unwrap();
        let ShapeKind::Scalar { kind, constraints, .. } = shape.kind else {
            panic!("expected scalar");
        };
        assert_eq!(kind, PrimitiveKind::String);
        assert_eq!(constraints.min_length, Some(5));
    }

    #[test]
    fn all_of_type_conflict() {
        let mut arena = SchemaArena::new();
        let a = arena.push(Schema::primitive(PrimitiveKind::String));
        let b = arena.push(Schema::primitive(PrimitiveKind::Integer));
        let id = all_of(&mut arena, vec![a, b]);
        let err = ShapeBuilder::new(&arena, 8)
            .build(id, &FieldPath::body().child("value"))
            .unwrap_err();
        assert!(err.is_conflict());
        assert!(err.to_string().contains("body.value"));
    }

    #[test]
    fn disjoint_enums_and_empty_ranges_conflict() {
        let field = FieldPath::body();
        let a = Constraints {
            enumeration: vec!["a".into()],
            ..Constraints::default()
        };
        let b = Constraints {
            enumeration: vec!["b".into()],
            ..Constraints::default()
        };
        assert!(merge_constraints(a, b, &field).unwrap_err().is_conflict());

        let low = Constraints {
            maximum: Some(5.0),
            ..Constraints::default()
        };
        let high = Constraints {
            minimum: Some(5.0),
            exclusive_minimum: true,
            ..Constraints::default()
        };
        assert!(merge_constraints(low, high, &field).unwrap_err().is_conflict());
    }

    #[test]
    fn multiple_of_combines() {
        let field = FieldPath::body();
        let merged = merge_constraints(
            Constraints {
                multiple_of: Some(2.0),
                ..Constraints::default()
            },
            Constraints {
                multiple_of: Some(6.0),
                ..Constraints::default()
            },
            &field,
        )
        .unwrap();
        assert_eq!(merged.multiple_of, Some(6.0));

        let merged = merge_constraints(
            Constraints {
                multiple_of: Some(4.0),
                ..Constraints::default()
            },
            Constraints {
                multiple_of: Some(6.0),
                ..Constraints::default()
            },
            &field,
        )
        .unwrap();
        assert_eq!(merged.multiple_of, Some(24.0));
    }

    #[test]
    fn fractional_multiples_merge_within_tolerance() {
        let merged = merge_constraints(
            Constraints {
                multiple_of: Some(0.1),
                ..Constraints::default()
            },
            Constraints {
                multiple_of: Some(0.3),
                ..Constraints::default()
            },
            &FieldPath::body(),
        )
        .unwrap();
        assert_eq!(merged.multiple_of, Some(0.3));
    }

    #[test]
    fn range_without_a_multiple_conflicts() {
        let mut arena = SchemaArena::new();
        let id = arena.push(Schema {
            meta: SchemaMeta::default(),
            node: SchemaNode::Primitive {
                kind: PrimitiveKind::Integer,
                format: None,
                constraints: Constraints {
                    minimum: Some(5.0),
                    maximum: Some(7.0),
                    multiple_of: Some(4.0),
                    ..Constraints::default()
                },
            },
        });
        let err = ShapeBuilder::new(&arena, 8)
            .build(id, &FieldPath::body().child("qty"))
            .unwrap_err();
        assert!(err.is_conflict());
        assert!(err.to_string().contains("body.qty"));

        let mut arena = SchemaArena::new();
        let range = arena.push(Schema {
            meta: SchemaMeta::default(),
            node: SchemaNode::Primitive {
                kind: PrimitiveKind::Integer,
                format: None,
                constraints: Constraints {
                    minimum: Some(5.0),
                    maximum: Some(7.0),
                    ..Constraints::default()
                },
            },
        });
        let step = arena.push(Schema {
            meta: SchemaMeta::default(),
            node: SchemaNode::Primitive {
                kind: PrimitiveKind::Number,
                format: None,
                constraints: Constraints {
                    multiple_of: Some(4.0),
                    ..Constraints::default()
                },
            },
        });
        let id = all_of(&mut arena, vec![range, step]);
        assert!(ShapeBuilder::new(&arena, 8)
            .build(id, &FieldPath::body())
            .unwrap_err()
            .is_conflict());
    }

    #[test]
    fn different_patterns_are_unsupported() {
        let err = merge_constraints(
            Constraints {
                pattern: Some("^a".into()),
                ..Constraints::default()
            },
            Constraints {
                pattern: Some("^b".into()),
                ..Constraints::default()
            },
            &FieldPath::body(),
        )
        .unwrap_err();
        assert!(matches!(err, SynthesisError::UnsupportedSchemaShape { .. }));
    }

    #[test]
    fn self_reference_is_cut() {
        let mut arena = SchemaArena::new();
        let node = arena.push(Schema::any());
        let back = arena.push(Schema {
            meta: SchemaMeta::default(),
            node: SchemaNode::Reference {
                pointer: "#/components/schemas/Node".into(),
                target: node,
                max_expansions: 1,
            },
        });
        let mut properties = IndexMap::new();
        properties.insert("next".to_string(), back);
        arena.set(
            node,
            Schema {
                meta: SchemaMeta::default(),
                node: SchemaNode::Object {
                    properties,
                    required: IndexSet::new(),
                    additional: AdditionalProperties::Allowed,
                    min_properties: None,
                    max_properties: None,
                },
            },
        );

        let shape = ShapeBuilder::new(&arena, 16).build(node, &FieldPath::body()).unwrap();
        // node -> next (one expansion) -> next (cut)
        let ShapeKind::Object { properties, .. } = &shape.kind else {
            panic!("expected object");
        };
        let ShapeKind::Object { properties: inner, .. } = &properties["next"].kind else {
            panic!("expected one expansion");
        };
        assert!(inner["next"].is_truncated());
    }

    #[test]
    fn depth_limit_cuts_subtree() {
        let mut arena = SchemaArena::new();
        let leaf = arena.push(Schema::primitive(PrimitiveKind::String));
        let mut id = leaf;
        for _ in 0..4 {
            id = arena.push(Schema {
                meta: SchemaMeta::default(),
                node: SchemaNode::Array {
                    items: Some(id),
                    min_items: None,
                    max_items: None,
                    unique_items: false,
                },
            });
        }
        let shape = ShapeBuilder::new(&arena, 2).build(id, &FieldPath::body()).unwrap();
        let ShapeKind::Array { items: Some(a), .. } = &shape.kind else { panic!() };
        let ShapeKind::Array { items: Some(b), .. } = &a.kind else { panic!() };
        let ShapeKind::Array { items: Some(c), .. } = &b.kind else { panic!() };
        assert!(c.is_truncated());
    }
}
