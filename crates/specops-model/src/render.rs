//! Re-serialization of the canonical model
//!
//! [`Specification::to_document`] renders an OpenAPI 3.0 JSON document.
//! Shared schemas are inlined at every use; cycle back-edges become `$ref`
//! entries into `components.schemas`, which is always emitted in full.

use crate::schema::{AdditionalProperties, Schema, SchemaArena, SchemaId, SchemaNode};
use crate::spec::{
    MediaSpec, OperationEntry, ParameterSpec, SecurityRequirement, SecurityScheme, Specification,
};
use indexmap::IndexMap;
use serde_json::{json, Map, Value};

const COMPONENT_SCHEMA_PREFIX: &str = "#/components/schemas/";

impl Specification {
    /// Render the model as an OpenAPI 3.0 document
    #[must_use]
    pub fn to_document(&self) -> Value {
        let mut doc = Map::new();
        doc.insert("openapi".into(), json!("3.0.3"));

        let mut info = Map::new();
        info.insert("title".into(), json!(self.info.title));
        info.insert("version".into(), json!(self.info.version));
        if let Some(description) = &self.info.description {
            info.insert("description".into(), json!(description));
        }
        doc.insert("info".into(), Value::Object(info));

        if !self.servers.is_empty() {
            let servers = self
                .servers
                .iter()
                .map(|s| serde_json::to_value(s).unwrap_or(Value::Null))
                .collect();
            doc.insert("servers".into(), Value::Array(servers));
        }

        let mut paths = Map::new();
        for template in &self.templates {
            let mut item = Map::new();
            for op in &template.operations {
                item.insert(op.method.document_key().into(), self.render_operation(op));
            }
            paths.insert(template.path.clone(), Value::Object(item));
        }
        doc.insert("paths".into(), Value::Object(paths));

        let mut components = Map::new();
        if !self.components.is_empty() {
            let schemas: Map<String, Value> = self
                .components
                .iter()
                .map(|(name, id)| (name.clone(), render_schema(&self.schemas, *id)))
                .collect();
            components.insert("schemas".into(), Value::Object(schemas));
        }
        if !self.security_schemes.is_empty() {
            let schemes: Map<String, Value> = self
                .security_schemes
                .iter()
                .map(|(name, scheme)| (name.clone(), render_security_scheme(scheme)))
                .collect();
            components.insert("securitySchemes".into(), Value::Object(schemes));
        }
        if !components.is_empty() {
            doc.insert("components".into(), Value::Object(components));
        }
        if !self.security.is_empty() {
            doc.insert("security".into(), render_security(&self.security));
        }

        Value::Object(doc)
    }

    fn render_operation(&self, op: &OperationEntry) -> Value {
        let mut out = Map::new();
        out.insert("operationId".into(), json!(op.operation_id));
        if let Some(summary) = &op.summary {
            out.insert("summary".into(), json!(summary));
        }
        if !op.tags.is_empty() {
            out.insert("tags".into(), json!(op.tags));
        }
        if op.deprecated {
            out.insert("deprecated".into(), json!(true));
        }
        if !op.parameters.is_empty() {
            let params = op
                .parameters
                .iter()
                .map(|p| self.render_parameter(p))
                .collect();
            out.insert("parameters".into(), Value::Array(params));
        }
        if let Some(body) = &op.request_body {
            let mut rb = Map::new();
            if let Some(description) = &body.description {
                rb.insert("description".into(), json!(description));
            }
            rb.insert("required".into(), json!(body.required));
            rb.insert("content".into(), self.render_content(&body.content));
            out.insert("requestBody".into(), Value::Object(rb));
        }

        let mut responses = Map::new();
        for (code, response) in &op.responses {
            let mut r = Map::new();
            r.insert("description".into(), json!(response.description));
            if !response.content.is_empty() {
                r.insert("content".into(), self.render_content(&response.content));
            }
            responses.insert(code.clone(), Value::Object(r));
        }
        if responses.is_empty() {
            responses.insert("default".into(), json!({"description": "default response"}));
        }
        out.insert("responses".into(), Value::Object(responses));
        out.insert("security".into(), render_security(&op.security));
        Value::Object(out)
    }

    fn render_parameter(&self, param: &ParameterSpec) -> Value {
        let mut out = Map::new();
        out.insert("name".into(), json!(param.name));
        out.insert("in".into(), json!(param.location.as_str()));
        out.insert("required".into(), json!(param.required));
        if let Some(description) = &param.description {
            out.insert("description".into(), json!(description));
        }
        out.insert("schema".into(), render_schema(&self.schemas, param.schema));
        if let Some(example) = &param.example {
            out.insert("example".into(), example.clone());
        }
        Value::Object(out)
    }

    fn render_content(&self, content: &IndexMap<String, MediaSpec>) -> Value {
        let media: Map<String, Value> = content
            .iter()
            .map(|(media_type, spec)| {
                let mut m = Map::new();
                if let Some(schema) = spec.schema {
                    m.insert("schema".into(), render_schema(&self.schemas, schema));
                }
                if let Some(example) = &spec.example {
                    m.insert("example".into(), example.clone());
                }
                (media_type.clone(), Value::Object(m))
            })
            .collect();
        Value::Object(media)
    }
}

/// Render one schema (and everything below it) as document JSON
#[must_use]
pub fn render_schema(arena: &SchemaArena, id: SchemaId) -> Value {
    let Some(schema) = arena.get(id) else {
        return json!({});
    };
    let Schema { meta, node } = schema;
    let mut out = Map::new();

    match node {
        SchemaNode::Primitive {
            kind,
            format,
            constraints: c,
        } => {
            if *kind != crate::schema::PrimitiveKind::Any {
                out.insert("type".into(), json!(kind.as_str()));
            }
            if let Some(format) = format {
                out.insert("format".into(), json!(format));
            }
            if let Some(min) = c.minimum {
                out.insert("minimum".into(), number(min));
                if c.exclusive_minimum {
                    out.insert("exclusiveMinimum".into(), json!(true));
                }
            }
            if let Some(max) = c.maximum {
                out.insert("maximum".into(), number(max));
                if c.exclusive_maximum {
                    out.insert("exclusiveMaximum".into(), json!(true));
                }
            }
            if let Some(m) = c.multiple_of {
                out.insert("multipleOf".into(), number(m));
            }
            if let Some(n) = c.min_length {
                out.insert("minLength".into(), json!(n));
            }
            if let Some(n) = c.max_length {
                out.insert("maxLength".into(), json!(n));
            }
            if let Some(p) = &c.pattern {
                out.insert("pattern".into(), json!(p));
            }
            if !c.enumeration.is_empty() {
                out.insert("enum".into(), Value::Array(c.enumeration.clone()));
            }
        }
        SchemaNode::Object {
            properties,
            required,
            additional,
            min_properties,
            max_properties,
        } => {
            out.insert("type".into(), json!("object"));
            if !properties.is_empty() {
                let props: Map<String, Value> = properties
                    .iter()
                    .map(|(name, prop)| (name.clone(), render_schema(arena, *prop)))
                    .collect();
                out.insert("properties".into(), Value::Object(props));
            }
            if !required.is_empty() {
                out.insert("required".into(), json!(required.iter().collect::<Vec<_>>()));
            }
            match additional {
                AdditionalProperties::Allowed => {}
                AdditionalProperties::Forbidden => {
                    out.insert("additionalProperties".into(), json!(false));
                }
                AdditionalProperties::Schema(inner) => {
                    out.insert("additionalProperties".into(), render_schema(arena, *inner));
                }
            }
            if let Some(n) = min_properties {
                out.insert("minProperties".into(), json!(n));
            }
            if let Some(n) = max_properties {
                out.insert("maxProperties".into(), json!(n));
            }
        }
        SchemaNode::Array {
            items,
            min_items,
            max_items,
            unique_items,
        } => {
            out.insert("type".into(), json!("array"));
            let items = items.map_or_else(|| json!({}), |i| render_schema(arena, i));
            out.insert("items".into(), items);
            if let Some(n) = min_items {
                out.insert("minItems".into(), json!(n));
            }
            if let Some(n) = max_items {
                out.insert("maxItems".into(), json!(n));
            }
            if *unique_items {
                out.insert("uniqueItems".into(), json!(true));
            }
        }
        SchemaNode::Union { kind, branches } => {
            let rendered = branches.iter().map(|b| render_schema(arena, *b)).collect();
            out.insert(kind.as_str().into(), Value::Array(rendered));
        }
        SchemaNode::Reference { pointer, .. } => {
            if pointer.starts_with(COMPONENT_SCHEMA_PREFIX) {
                return json!({ "$ref": pointer });
            }
            return json!({});
        }
    }

    if let Some(example) = &meta.example {
        out.insert("example".into(), example.clone());
    }
    if let Some(default) = &meta.default {
        out.insert("default".into(), default.clone());
    }
    if meta.nullable {
        out.insert("nullable".into(), json!(true));
    }
    if meta.read_only {
        out.insert("readOnly".into(), json!(true));
    }
    if meta.write_only {
        out.insert("writeOnly".into(), json!(true));
    }
    if let Some(description) = &meta.description {
        out.insert("description".into(), json!(description));
    }
    Value::Object(out)
}

fn render_security_scheme(scheme: &SecurityScheme) -> Value {
    match scheme {
        SecurityScheme::OAuth2 { flows } => {
            let flows: Map<String, Value> = flows
                .iter()
                .map(|flow| (flow.clone(), json!({ "scopes": {} })))
                .collect();
            json!({ "type": "oauth2", "flows": flows })
        }
        other => serde_json::to_value(other).unwrap_or(Value::Null),
    }
}

fn render_security(requirements: &[SecurityRequirement]) -> Value {
    Value::Array(
        requirements
            .iter()
            .map(|req| serde_json::to_value(req).unwrap_or(Value::Null))
            .collect(),
    )
}

#[allow(clippy::cast_possible_truncation)]
fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        json!(n as i64)
    } else {
        json!(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Constraints, PrimitiveKind, SchemaMeta};

    #[test]
    fn primitive_with_constraints() {
        let mut arena = SchemaArena::new();
        let id = arena.push(Schema {
            meta: SchemaMeta {
                example: Some(json!(5)),
                ..SchemaMeta::default()
            },
            node: SchemaNode::Primitive {
                kind: PrimitiveKind::Integer,
                format: Some("int32".to_string()),
                constraints: Constraints {
                    minimum: Some(1.0),
                    maximum: Some(100.0),
                    ..Constraints::default()
                },
            },
        });
        assert_eq!(
            render_schema(&arena, id),
            json!({"type": "integer", "format": "int32", "minimum": 1, "maximum": 100, "example": 5})
        );
    }

    #[test]
    fn reference_renders_as_component_ref() {
        let mut arena = SchemaArena::new();
        let target = arena.push(Schema::any());
        let id = arena.push(Schema {
            meta: SchemaMeta::default(),
            node: SchemaNode::Reference {
                pointer: "#/components/schemas/Node".to_string(),
                target,
                max_expansions: 1,
            },
        });
        assert_eq!(render_schema(&arena, id), json!({"$ref": "#/components/schemas/Node"}));
    }

    #[test]
    fn number_keeps_fractions() {
        assert_eq!(number(2.0), json!(2));
        assert_eq!(number(0.5), json!(0.5));
    }
}
