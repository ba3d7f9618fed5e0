//! `$ref` resolution into the schema arena
//!
//! Every internal reference goes through one registry keyed by canonical JSON
//! pointer, so a component referenced from ten places is built once and shared.
//! A reference met again while its own target is still being built closes a
//! cycle; it becomes a [`SchemaNode::Reference`] back-edge instead of being
//! unrolled.

use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value};
use specops_model::{
    AdditionalProperties, Constraints, PrimitiveKind, Schema, SchemaArena, SchemaId, SchemaMeta,
    SchemaNode, SpecError, SpecResult, UnionKind,
};
use std::collections::HashMap;

/// Hop limit when following non-schema `$ref` chains
const MAX_REF_HOPS: usize = 32;

/// Builds arena schemas from document JSON, resolving references on the way
#[derive(Debug)]
pub struct SchemaResolver<'doc> {
    root: &'doc Value,
    arena: SchemaArena,
    registry: HashMap<String, SchemaId>,
    in_progress: Vec<String>,
    cycle_expansion_depth: u32,
    cycles_detected: usize,
}

impl<'doc> SchemaResolver<'doc> {
    /// Create resolver over a (v3) document
    #[must_use]
    pub fn new(root: &'doc Value, cycle_expansion_depth: u32) -> Self {
        Self {
            root,
            arena: SchemaArena::new(),
            registry: HashMap::new(),
            in_progress: Vec::new(),
            cycle_expansion_depth,
            cycles_detected: 0,
        }
    }

    /// Number of reference cycles cut so far
    #[inline]
    #[must_use]
    pub fn cycles_detected(&self) -> usize {
        self.cycles_detected
    }

    /// Consume resolver, yielding the built arena
    #[must_use]
    pub fn into_arena(self) -> SchemaArena {
        self.arena
    }

    /// Look up a JSON value by `#/...` pointer
    ///
    /// # Errors
    /// Returns [`SpecError::UnresolvableReference`] for external or missing targets.
    pub fn lookup(&self, reference: &str) -> SpecResult<&'doc Value> {
        let pointer = canonical_pointer(reference)?;
        self.root
            .pointer(&pointer)
            .ok_or_else(|| SpecError::unresolvable(reference))
    }

    /// Follow `$ref` chains on a non-schema object (parameter, body, response)
    ///
    /// # Errors
    /// Returns [`SpecError::UnresolvableReference`] for dangling or looping refs.
    pub fn follow(&self, value: &'doc Value) -> SpecResult<&'doc Value> {
        let mut current = value;
        for _ in 0..MAX_REF_HOPS {
            match current.get("$ref").and_then(Value::as_str) {
                Some(reference) => current = self.lookup(reference)?,
                None => return Ok(current),
            }
        }
        let reference = value.get("$ref").and_then(Value::as_str).unwrap_or("$ref");
        Err(SpecError::unresolvable(format!("{reference} (reference loop)")))
    }

    /// Resolve a reference string to a shared schema handle
    ///
    /// # Errors
    /// Returns [`SpecError::UnresolvableReference`] for external or missing targets.
    pub fn resolve_ref(&mut self, reference: &str) -> SpecResult<SchemaId> {
        let pointer = format!("#{}", canonical_pointer(reference)?);
        if let Some(id) = self.registry.get(&pointer) {
            if !self.in_progress.contains(&pointer) {
                return Ok(*id);
            }
            let target = *id;
            self.cycles_detected += 1;
            tracing::debug!("Reference cycle detected at {}", pointer);
            return Ok(self.arena.push(Schema {
                meta: SchemaMeta::default(),
                node: SchemaNode::Reference {
                    pointer,
                    target,
                    max_expansions: self.cycle_expansion_depth,
                },
            }));
        }

        let target = self.lookup(&pointer)?;
        // Reserve the slot first so self-references can point at it.
        let id = self.arena.push(Schema::any());
        self.registry.insert(pointer.clone(), id);
        self.in_progress.push(pointer);
        let built = self.schema_of(target);
        self.in_progress.pop();
        let schema = built?;
        self.arena.set(id, schema);
        Ok(id)
    }

    /// Build a schema value (inline or `$ref`) into the arena
    ///
    /// # Errors
    /// Propagates reference and structure errors.
    pub fn build(&mut self, value: &Value) -> SpecResult<SchemaId> {
        if let Some(reference) = value.get("$ref").and_then(Value::as_str) {
            return self.resolve_ref(reference);
        }
        let schema = self.schema_of(value)?;
        Ok(self.arena.push(schema))
    }

    /// Unconstrained string schema, for implicit parameters
    pub fn implicit_string(&mut self) -> SchemaId {
        self.arena.push(Schema::primitive(PrimitiveKind::String))
    }

    fn schema_of(&mut self, value: &Value) -> SpecResult<Schema> {
        if let Some(reference) = value.get("$ref").and_then(Value::as_str) {
            // A component that is itself just an alias of another.
            let target = self.resolve_ref(reference)?;
            return Ok(Schema {
                meta: SchemaMeta::default(),
                node: SchemaNode::Union {
                    kind: UnionKind::AllOf,
                    branches: vec![target],
                },
            });
        }
        let Some(map) = value.as_object() else {
            // `true`, `false` and non-object junk accept anything
            return Ok(Schema::any());
        };

        let mut meta = meta_of(map);
        let types = declared_types(map);
        if types.iter().any(|t| t == "null") {
            meta.nullable = true;
        }

        for (keyword, kind) in [("allOf", UnionKind::AllOf), ("oneOf", UnionKind::OneOf), ("anyOf", UnionKind::AnyOf)] {
            let Some(branches) = map.get(keyword) else {
                continue;
            };
            let branches = branches.as_array().ok_or_else(|| {
                SpecError::malformed(format!("'{keyword}' must be an array"))
            })?;
            let mut ids = Vec::with_capacity(branches.len() + 1);
            for branch in branches {
                ids.push(self.build(branch)?);
            }
            if kind == UnionKind::AllOf && has_structure(map) {
                // Sibling keywords form one more allOf branch.
                let mut rest = map.clone();
                rest.remove("allOf");
                rest.remove("example");
                rest.remove("default");
                let sibling = self.schema_of(&Value::Object(rest))?;
                ids.push(self.arena.push(sibling));
            }
            return Ok(Schema {
                meta,
                node: SchemaNode::Union { kind, branches: ids },
            });
        }

        let primary = types
            .iter()
            .map(String::as_str)
            .find(|t| *t != "null")
            .map(str::to_string)
            .or_else(|| infer_type(map));
        let node = match primary.as_deref() {
            Some("object") => self.object_node(map)?,
            Some("array") => {
                let items = match map.get("items") {
                    Some(items) if items.is_object() => Some(self.build(items)?),
                    _ => None,
                };
                SchemaNode::Array {
                    items,
                    min_items: map.get("minItems").and_then(Value::as_u64),
                    max_items: map.get("maxItems").and_then(Value::as_u64),
                    unique_items: map.get("uniqueItems").and_then(Value::as_bool).unwrap_or(false),
                }
            }
            other => SchemaNode::Primitive {
                kind: match other {
                    Some("string") => PrimitiveKind::String,
                    Some("integer") => PrimitiveKind::Integer,
                    Some("number") => PrimitiveKind::Number,
                    Some("boolean") => PrimitiveKind::Boolean,
                    Some("null") => PrimitiveKind::Null,
                    None => PrimitiveKind::Any,
                    Some(unknown) => {
                        return Err(SpecError::malformed(format!("unknown schema type '{unknown}'")))
                    }
                },
                format: map.get("format").and_then(Value::as_str).map(str::to_string),
                constraints: constraints_of(map),
            },
        };
        Ok(Schema { meta, node })
    }

    fn object_node(&mut self, map: &Map<String, Value>) -> SpecResult<SchemaNode> {
        let mut properties = IndexMap::new();
        if let Some(props) = map.get("properties") {
            let props = props
                .as_object()
                .ok_or_else(|| SpecError::malformed("'properties' must be an object"))?;
            for (name, prop) in props {
                properties.insert(name.clone(), self.build(prop)?);
            }
        }
        let additional = match map.get("additionalProperties") {
            Some(Value::Bool(false)) => AdditionalProperties::Forbidden,
            Some(schema @ Value::Object(_)) => AdditionalProperties::Schema(self.build(schema)?),
            _ => AdditionalProperties::Allowed,
        };
        Ok(SchemaNode::Object {
            properties,
            required: required_of(map),
            additional,
            min_properties: map.get("minProperties").and_then(Value::as_u64),
            max_properties: map.get("maxProperties").and_then(Value::as_u64),
        })
    }
}

/// Turn a `#/a/b` reference into a JSON pointer (`/a/b`), percent-decoded
fn canonical_pointer(reference: &str) -> SpecResult<String> {
    let fragment = reference
        .strip_prefix('#')
        .ok_or_else(|| SpecError::unresolvable(reference))?;
    let decoded = urlencoding::decode(fragment).map_err(|_| SpecError::unresolvable(reference))?;
    if !decoded.is_empty() && !decoded.starts_with('/') {
        return Err(SpecError::unresolvable(reference));
    }
    Ok(decoded.into_owned())
}

fn declared_types(map: &Map<String, Value>) -> Vec<String> {
    match map.get("type") {
        Some(Value::String(t)) => vec![t.clone()],
        Some(Value::Array(list)) => list
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn infer_type(map: &Map<String, Value>) -> Option<String> {
    if map.contains_key("properties") || map.contains_key("additionalProperties") {
        return Some("object".to_string());
    }
    if map.contains_key("items") {
        return Some("array".to_string());
    }
    let first = map.get("enum").and_then(Value::as_array).and_then(|e| e.first());
    match first {
        Some(Value::String(_)) => Some("string".to_string()),
        Some(Value::Bool(_)) => Some("boolean".to_string()),
        Some(Value::Number(n)) if n.is_f64() => Some("number".to_string()),
        Some(Value::Number(_)) => Some("integer".to_string()),
        _ => None,
    }
}

fn has_structure(map: &Map<String, Value>) -> bool {
    ["type", "properties", "required", "additionalProperties"]
        .iter()
        .any(|k| map.contains_key(*k))
}

fn required_of(map: &Map<String, Value>) -> IndexSet<String> {
    map.get("required")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn meta_of(map: &Map<String, Value>) -> SchemaMeta {
    let example = map.get("example").cloned().or_else(|| {
        map.get("examples")
            .and_then(Value::as_array)
            .and_then(|e| e.first())
            .cloned()
    });
    SchemaMeta {
        example,
        default: map.get("default").cloned(),
        nullable: map.get("nullable").and_then(Value::as_bool).unwrap_or(false),
        read_only: map.get("readOnly").and_then(Value::as_bool).unwrap_or(false),
        write_only: map.get("writeOnly").and_then(Value::as_bool).unwrap_or(false),
        description: map
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

fn constraints_of(map: &Map<String, Value>) -> Constraints {
    let mut c = Constraints {
        minimum: map.get("minimum").and_then(Value::as_f64),
        maximum: map.get("maximum").and_then(Value::as_f64),
        multiple_of: map.get("multipleOf").and_then(Value::as_f64),
        min_length: map.get("minLength").and_then(Value::as_u64),
        max_length: map.get("maxLength").and_then(Value::as_u64),
        pattern: map.get("pattern").and_then(Value::as_str).map(str::to_string),
        enumeration: map
            .get("enum")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        ..Constraints::default()
    };
    // 3.0 spells exclusivity as a flag, 3.1 as the bound itself.
    match map.get("exclusiveMinimum") {
        Some(Value::Bool(b)) => c.exclusive_minimum = *b,
        Some(Value::Number(n)) => {
            c.minimum = n.as_f64();
            c.exclusive_minimum = true;
        }
        _ => {}
    }
    match map.get("exclusiveMaximum") {
        Some(Value::Bool(b)) => c.exclusive_maximum = *b,
        Some(Value::Number(n)) => {
            c.maximum = n.as_f64();
            c.exclusive_maximum = true;
        }
        _ => {}
    }
    c
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn shared_reference_builds_once() {
        let doc = json!({"components": {"schemas": {"Id": {"type": "integer", "minimum": 1}}}});
        let mut resolver = SchemaResolver::new(&doc, 1);
        let a = resolver.resolve_ref("#/components/schemas/Id").unwrap();
        let b = resolver.resolve_ref("#/components/schemas/Id").unwrap();
        assert_eq!(a, b);
        let arena = resolver.into_arena();
        assert_eq!(arena.len(), 1);
        assert!(matches!(
            &arena.get(a).unwrap().node,
            SchemaNode::Primitive { kind: PrimitiveKind::Integer, constraints, .. } if constraints.minimum == Some(1.0)
        ));
    }

    #[test]
    fn self_reference_becomes_back_edge() {
        let doc = json!({"components": {"schemas": {"Node": {
            "type": "object",
            "properties": {"children": {"type": "array", "items": {"$ref": "#/components/schemas/Node"}}}
        }}}});
        let mut resolver = SchemaResolver::new(&doc, 2);
        let node = resolver.resolve_ref("#/components/schemas/Node").unwrap();
        assert_eq!(resolver.cycles_detected(), 1);
        let arena = resolver.into_arena();

        let SchemaNode::Object { properties, .. } = &arena.get(node).unwrap().node else {
            panic!("expected object");
        };
        let SchemaNode::Array { items: Some(items), .. } = &arena.get(properties["children"]).unwrap().node else {
            panic!("expected array");
        };
        assert!(matches!(
            &arena.get(*items).unwrap().node,
            SchemaNode::Reference { target, max_expansions: 2, .. } if *target == node
        ));
    }

    #[test]
    fn missing_reference_fails() {
        let doc = json!({});
        let mut resolver = SchemaResolver::new(&doc, 1);
        assert_eq!(
            resolver.resolve_ref("#/components/schemas/Nope"),
            Err(SpecError::unresolvable("#/components/schemas/Nope"))
        );
    }

    #[test]
    fn external_reference_fails() {
        let doc = json!({});
        let mut resolver = SchemaResolver::new(&doc, 1);
        assert!(matches!(
            resolver.resolve_ref("other.yaml#/Pet"),
            Err(SpecError::UnresolvableReference { .. })
        ));
    }

    #[test]
    fn escaped_pointer_segments() {
        let doc = json!({"components": {"schemas": {"a/b": {"type": "string"}}}});
        let mut resolver = SchemaResolver::new(&doc, 1);
        assert!(resolver.resolve_ref("#/components/schemas/a~1b").is_ok());
    }

    #[test]
    fn openapi31_type_array_and_exclusive_bound() {
        let doc = json!({"type": ["integer", "null"], "exclusiveMinimum": 0});
        let mut resolver = SchemaResolver::new(&doc, 1);
        let id = resolver.build(&doc).unwrap();
        let arena = resolver.into_arena();
        let schema = arena.get(id).unwrap();
        assert!(schema.meta.nullable);
        assert!(matches!(
            &schema.node,
            SchemaNode::Primitive { kind: PrimitiveKind::Integer, constraints, .. }
                if constraints.minimum == Some(0.0) && constraints.exclusive_minimum
        ));
    }

    #[test]
    fn all_of_with_sibling_properties() {
        let doc = json!({
            "components": {"schemas": {"Base": {"type": "object", "properties": {"id": {"type": "integer"}}}}},
            "schema": {
                "allOf": [{"$ref": "#/components/schemas/Base"}],
                "type": "object",
                "properties": {"name": {"type": "string"}},
                "required": ["name"]
            }
        });
        let mut resolver = SchemaResolver::new(&doc, 1);
        let id = resolver.build(&doc["schema"]).unwrap();
        let arena = resolver.into_arena();
        let SchemaNode::Union { kind: UnionKind::AllOf, branches } = &arena.get(id).unwrap().node else {
            panic!("expected allOf");
        };
        assert_eq!(branches.len(), 2);
        assert!(matches!(
            &arena.get(branches[1]).unwrap().node,
            SchemaNode::Object { required, .. } if required.contains("name")
        ));
    }

    #[test]
    fn follow_parameter_reference() {
        let doc = json!({
            "components": {"parameters": {"Limit": {"name": "limit", "in": "query"}}},
            "param": {"$ref": "#/components/parameters/Limit"}
        });
        let resolver = SchemaResolver::new(&doc, 1);
        let param = resolver.follow(&doc["param"]).unwrap();
        assert_eq!(param["name"], json!("limit"));
    }

    #[test]
    fn enum_infers_type() {
        let doc = json!({"enum": ["a", "b"]});
        let mut resolver = SchemaResolver::new(&doc, 1);
        let id = resolver.build(&doc).unwrap();
        let arena = resolver.into_arena();
        assert_eq!(arena.get(id).unwrap().node.type_name(), "string");
    }
}
