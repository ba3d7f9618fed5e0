//! Presence and type checks for the parameters of a matched request
//!
//! Only the shape of each value is checked: whether a required parameter is
//! there and whether its text parses as the declared type. Bounds, patterns
//! and formats are left to the target service.

use crate::result::{IssueKind, ParameterIssue};
use indexmap::IndexMap;
use specops_model::{
    ObservedRequest, OperationEntry, ParameterLocation, PrimitiveKind, SchemaArena, SchemaId,
    SchemaNode, UnionKind,
};

/// Nesting limit for unions and arrays inside a parameter schema
const MAX_CHECK_DEPTH: usize = 8;

/// Check every declared parameter of `operation` against `request`
#[must_use]
pub fn check_parameters(
    arena: &SchemaArena,
    operation: &OperationEntry,
    request: &ObservedRequest,
    path_params: &IndexMap<String, String>,
) -> Vec<ParameterIssue> {
    let cookies = request.cookies();
    let mut issues = Vec::new();

    for param in &operation.parameters {
        let value = match param.location {
            ParameterLocation::Path => path_params.get(&param.name).map(String::as_str),
            ParameterLocation::Query => request.query_value(&param.name),
            ParameterLocation::Header => request.header(&param.name),
            ParameterLocation::Cookie => cookies
                .iter()
                .find(|(name, _)| *name == param.name)
                .map(|(_, value)| value.as_str()),
        };

        let kind = match value {
            None if param.required => Some(IssueKind::Missing),
            None => None,
            Some(value) => check_value(arena, param.schema, value, 0).err().map(|expected| {
                IssueKind::TypeMismatch {
                    expected,
                    value: value.to_string(),
                }
            }),
        };
        if let Some(kind) = kind {
            issues.push(ParameterIssue {
                name: param.name.clone(),
                location: param.location,
                kind,
            });
        }
    }
    issues
}

/// Check one textual value, returning the expected type name on mismatch
///
/// # Errors
/// Returns the expected type name when `value` does not fit the schema.
pub fn check_value(arena: &SchemaArena, id: SchemaId, value: &str, depth: usize) -> Result<(), String> {
    let Some(schema) = arena.resolve(id) else {
        return Ok(());
    };
    if depth > MAX_CHECK_DEPTH {
        return Ok(());
    }
    if schema.meta.nullable && value == "null" {
        return Ok(());
    }

    match &schema.node {
        SchemaNode::Primitive {
            kind, constraints, ..
        } => {
            let ok = match kind {
                PrimitiveKind::Integer => is_integer(value),
                PrimitiveKind::Number => value.parse::<f64>().is_ok_and(f64::is_finite),
                PrimitiveKind::Boolean => {
                    value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false")
                }
                PrimitiveKind::Null => value.is_empty() || value == "null",
                PrimitiveKind::String => {
                    let strings: Vec<&str> = constraints
                        .enumeration
                        .iter()
                        .filter_map(serde_json::Value::as_str)
                        .collect();
                    if strings.is_empty() || strings.len() != constraints.enumeration.len() {
                        true
                    } else {
                        return if strings.contains(&value) {
                            Ok(())
                        } else {
                            Err(format!("one of [{}]", strings.join(", ")))
                        };
                    }
                }
                PrimitiveKind::Any => true,
            };
            if ok {
                Ok(())
            } else {
                Err(kind.as_str().to_string())
            }
        }
        SchemaNode::Array { items, .. } => match items {
            Some(items) => value
                .split(',')
                .try_for_each(|item| check_value(arena, *items, item.trim(), depth + 1))
                .map_err(|expected| format!("array of {expected}")),
            None => Ok(()),
        },
        SchemaNode::Union { kind, branches } => {
            let mut results = branches
                .iter()
                .map(|branch| check_value(arena, *branch, value, depth + 1));
            match kind {
                UnionKind::AllOf => results.try_for_each(|r| r),
                UnionKind::OneOf | UnionKind::AnyOf => {
                    let mut expected = Vec::new();
                    for result in results {
                        match result {
                            Ok(()) => return Ok(()),
                            Err(e) => expected.push(e),
                        }
                    }
                    if expected.is_empty() {
                        Ok(())
                    } else {
                        Err(expected.join(" | "))
                    }
                }
            }
        }
        SchemaNode::Object { .. } | SchemaNode::Reference { .. } => Ok(()),
    }
}

fn is_integer(value: &str) -> bool {
    value.parse::<i64>().is_ok()
        || value.parse::<u64>().is_ok()
        || value
            .parse::<f64>()
            .is_ok_and(|n| n.is_finite() && n.fract() == 0.0 && value.contains(['e', 'E']))
}

#[cfg(test)]
mod tests {
    use super::*;
    use specops_model::{Constraints, Schema};

    fn arena_with(node: SchemaNode) -> (SchemaArena, SchemaId) {
        let mut arena = SchemaArena::new();
        let id = arena.push(Schema {
            meta: Default::default(),
            node,
        });
        (arena, id)
    }

    fn primitive(kind: PrimitiveKind) -> SchemaNode {
        SchemaNode::Primitive {
            kind,
            format: None,
            constraints: Constraints::default(),
        }
    }

    #[test]
    fn integer_values() {
        let (arena, id) = arena_with(primitive(PrimitiveKind::Integer));
        assert!(check_value(&arena, id, "42", 0).is_ok());
        assert!(check_value(&arena, id, "-7", 0).is_ok());
        assert!(check_value(&arena, id, "1e3", 0).is_ok());
        assert_eq!(check_value(&arena, id, "4.5", 0), Err("integer".to_string()));
        assert_eq!(check_value(&arena, id, "abc", 0), Err("integer".to_string()));
    }

    #[test]
    fn boolean_and_number_values() {
        let (arena, id) = arena_with(primitive(PrimitiveKind::Boolean));
        assert!(check_value(&arena, id, "TRUE", 0).is_ok());
        assert!(check_value(&arena, id, "yes", 0).is_err());

        let (arena, id) = arena_with(primitive(PrimitiveKind::Number));
        assert!(check_value(&arena, id, "3.25", 0).is_ok());
        assert!(check_value(&arena, id, "NaN", 0).is_err());
    }

    #[test]
    fn string_enum_membership() {
        let (arena, id) = arena_with(SchemaNode::Primitive {
            kind: PrimitiveKind::String,
            format: None,
            constraints: Constraints {
                enumeration: vec!["asc".into(), "desc".into()],
                ..Constraints::default()
            },
        });
        assert!(check_value(&arena, id, "asc", 0).is_ok());
        assert_eq!(
            check_value(&arena, id, "up", 0),
            Err("one of [asc, desc]".to_string())
        );
    }

    #[test]
    fn array_items_checked_individually() {
        let mut arena = SchemaArena::new();
        let item = arena.push(Schema::primitive(PrimitiveKind::Integer));
        let id = arena.push(Schema {
            meta: Default::default(),
            node: SchemaNode::Array {
                items: Some(item),
                min_items: None,
                max_items: None,
                unique_items: false,
            },
        });
        assert!(check_value(&arena, id, "1, 2,3", 0).is_ok());
        assert_eq!(
            check_value(&arena, id, "1,x", 0),
            Err("array of integer".to_string())
        );
    }

    #[test]
    fn one_of_accepts_any_branch() {
        let mut arena = SchemaArena::new();
        let a = arena.push(Schema::primitive(PrimitiveKind::Integer));
        let b = arena.push(Schema::primitive(PrimitiveKind::Boolean));
        let id = arena.push(Schema {
            meta: Default::default(),
            node: SchemaNode::Union {
                kind: UnionKind::OneOf,
                branches: vec![a, b],
            },
        });
        assert!(check_value(&arena, id, "false", 0).is_ok());
        assert_eq!(
            check_value(&arena, id, "x", 0),
            Err("integer | boolean".to_string())
        );
    }
}
