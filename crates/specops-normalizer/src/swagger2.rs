//! Swagger 2.0 → OpenAPI 3 structural upconversion
//!
//! Works purely on the JSON tree. The output is an OpenAPI 3.0 document that
//! the normal v3 path loads; nothing downstream knows the source was v2.
//!
//! Parameter and response `$ref`s are inlined during conversion because a v2
//! body parameter has no v3 parameter counterpart. Schema `$ref`s are rewritten
//! from `#/definitions/` to `#/components/schemas/`.

use serde_json::{json, Map, Value};
use specops_model::{SpecError, SpecResult};

const DEFINITIONS_PREFIX: &str = "#/definitions/";
const SCHEMAS_PREFIX: &str = "#/components/schemas/";
const METHOD_KEYS: [&str; 7] = ["get", "put", "post", "delete", "options", "head", "patch"];
const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
const MULTIPART: &str = "multipart/form-data";

/// Keys that move from a v2 non-body parameter into its v3 `schema`
const SCHEMA_KEYS: [&str; 16] = [
    "type",
    "format",
    "items",
    "enum",
    "default",
    "maximum",
    "exclusiveMaximum",
    "minimum",
    "exclusiveMinimum",
    "maxLength",
    "minLength",
    "pattern",
    "maxItems",
    "minItems",
    "uniqueItems",
    "multipleOf",
];

/// Convert a Swagger 2.0 document into an OpenAPI 3.0 document
///
/// # Errors
/// - [`SpecError::Malformed`] for structurally invalid v2 documents
/// - [`SpecError::UnresolvableReference`] for dangling parameter/response refs
pub fn upconvert(document: &Value) -> SpecResult<Value> {
    let root = document
        .as_object()
        .ok_or_else(|| SpecError::malformed("document root is not an object"))?;
    let converter = Converter { root };

    let mut out = Map::new();
    out.insert("openapi".into(), json!("3.0.3"));
    out.insert(
        "info".into(),
        root.get("info").cloned().unwrap_or_else(|| json!({})),
    );
    out.insert("servers".into(), Value::Array(converter.servers()));
    tracing::debug!("Upconverting swagger 2.0 document");

    let mut paths = Map::new();
    if let Some(source) = root.get("paths") {
        let source = source
            .as_object()
            .ok_or_else(|| SpecError::malformed("'paths' is not an object"))?;
        for (path, item) in source {
            paths.insert(path.clone(), converter.path_item(path, item)?);
        }
    }
    out.insert("paths".into(), Value::Object(paths));

    let mut components = Map::new();
    if let Some(definitions) = root.get("definitions") {
        components.insert("schemas".into(), rewrite_refs(definitions.clone()));
    }
    if let Some(schemes) = root.get("securityDefinitions").and_then(Value::as_object) {
        let converted: Map<String, Value> = schemes
            .iter()
            .map(|(name, scheme)| (name.clone(), convert_security_scheme(scheme)))
            .collect();
        components.insert("securitySchemes".into(), Value::Object(converted));
    }
    out.insert("components".into(), Value::Object(components));

    if let Some(security) = root.get("security") {
        out.insert("security".into(), security.clone());
    }
    if let Some(tags) = root.get("tags") {
        out.insert("tags".into(), tags.clone());
    }
    Ok(Value::Object(out))
}

struct Converter<'a> {
    root: &'a Map<String, Value>,
}

impl Converter<'_> {
    fn servers(&self) -> Vec<Value> {
        let base_path = self
            .root
            .get("basePath")
            .and_then(Value::as_str)
            .unwrap_or("");
        let Some(host) = self.root.get("host").and_then(Value::as_str) else {
            let url = if base_path.is_empty() { "/" } else { base_path };
            return vec![json!({ "url": url })];
        };
        let schemes: Vec<&str> = self
            .root
            .get("schemes")
            .and_then(Value::as_array)
            .map(|s| s.iter().filter_map(Value::as_str).collect())
            .filter(|s: &Vec<&str>| !s.is_empty())
            .unwrap_or_else(|| vec!["https"]);
        schemes
            .into_iter()
            .map(|scheme| json!({ "url": format!("{scheme}://{host}{base_path}") }))
            .collect()
    }

    fn string_list(&self, op: Option<&Map<String, Value>>, key: &str) -> Vec<String> {
        op.and_then(|o| o.get(key))
            .or_else(|| self.root.get(key))
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn resolve_local<'v>(&'v self, value: &'v Value, section: &str) -> SpecResult<&'v Value> {
        let Some(reference) = value.get("$ref").and_then(Value::as_str) else {
            return Ok(value);
        };
        let prefix = format!("#/{section}/");
        let name = reference
            .strip_prefix(&prefix)
            .ok_or_else(|| SpecError::unresolvable(reference))?;
        self.root
            .get(section)
            .and_then(|s| s.get(name))
            .ok_or_else(|| SpecError::unresolvable(reference))
    }

    fn path_item(&self, path: &str, item: &Value) -> SpecResult<Value> {
        let item = item
            .as_object()
            .ok_or_else(|| SpecError::malformed(format!("path item {path} is not an object")))?;

        let mut shared = Vec::new();
        if let Some(params) = item.get("parameters").and_then(Value::as_array) {
            for param in params {
                shared.push(self.resolve_local(param, "parameters")?.clone());
            }
        }

        let mut out = Map::new();
        let mut shared_plain = Vec::new();
        for param in &shared {
            if !is_body_like(param) {
                shared_plain.push(convert_parameter(param));
            }
        }
        if !shared_plain.is_empty() {
            out.insert("parameters".into(), Value::Array(shared_plain));
        }

        for (key, op) in item {
            if !METHOD_KEYS.contains(&key.as_str()) {
                continue;
            }
            let op = op.as_object().ok_or_else(|| {
                SpecError::malformed(format!("operation {key} {path} is not an object"))
            })?;
            out.insert(key.clone(), self.operation(op, &shared)?);
        }
        Ok(Value::Object(out))
    }

    fn operation(&self, op: &Map<String, Value>, shared: &[Value]) -> SpecResult<Value> {
        let mut out = Map::new();
        for key in ["operationId", "summary", "description", "tags", "deprecated", "security"] {
            if let Some(value) = op.get(key) {
                out.insert(key.into(), value.clone());
            }
        }

        let mut own = Vec::new();
        if let Some(params) = op.get("parameters").and_then(Value::as_array) {
            for param in params {
                own.push(self.resolve_local(param, "parameters")?.clone());
            }
        }

        // Body-like parameters declared on the path item still apply here.
        let mut body_params: Vec<&Value> = shared.iter().filter(|p| is_body_like(p)).collect();
        body_params.retain(|p| !own.iter().any(|o| same_parameter(o, p)));
        body_params.extend(own.iter().filter(|p| is_body_like(p)));

        let plain: Vec<Value> = own
            .iter()
            .filter(|p| !is_body_like(p))
            .map(convert_parameter)
            .collect();
        if !plain.is_empty() {
            out.insert("parameters".into(), Value::Array(plain));
        }

        let consumes = self.string_list(Some(op), "consumes");
        if let Some(body) = request_body(&body_params, &consumes) {
            out.insert("requestBody".into(), body);
        }

        let produces = self.string_list(Some(op), "produces");
        let mut responses = Map::new();
        if let Some(source) = op.get("responses").and_then(Value::as_object) {
            for (code, response) in source {
                let response = self.resolve_local(response, "responses")?;
                responses.insert(code.clone(), convert_response(response, &produces));
            }
        }
        out.insert("responses".into(), Value::Object(responses));
        Ok(Value::Object(out))
    }
}

fn is_body_like(param: &Value) -> bool {
    matches!(
        param.get("in").and_then(Value::as_str),
        Some("body" | "formData")
    )
}

fn same_parameter(a: &Value, b: &Value) -> bool {
    a.get("in") == b.get("in") && a.get("name") == b.get("name")
}

fn convert_parameter(param: &Value) -> Value {
    let Some(source) = param.as_object() else {
        return param.clone();
    };
    let mut out = Map::new();
    let mut schema = Map::new();
    for (key, value) in source {
        if SCHEMA_KEYS.contains(&key.as_str()) {
            schema.insert(key.clone(), rewrite_refs(value.clone()));
        } else if key == "x-example" {
            out.insert("example".into(), value.clone());
        } else if key != "collectionFormat" && key != "allowEmptyValue" {
            out.insert(key.clone(), value.clone());
        }
    }
    if schema.get("type").and_then(Value::as_str) == Some("file") {
        schema.insert("type".into(), json!("string"));
        schema.insert("format".into(), json!("binary"));
    }
    out.insert("schema".into(), Value::Object(schema));
    Value::Object(out)
}

fn request_body(params: &[&Value], consumes: &[String]) -> Option<Value> {
    if let Some(body) = params
        .iter()
        .find(|p| p.get("in").and_then(Value::as_str) == Some("body"))
    {
        let schema = rewrite_refs(body.get("schema").cloned().unwrap_or_else(|| json!({})));
        let media_types: Vec<String> = if consumes.is_empty() {
            vec!["application/json".to_string()]
        } else {
            consumes
                .iter()
                .filter(|m| m.as_str() != FORM_URLENCODED && m.as_str() != MULTIPART)
                .cloned()
                .collect()
        };
        let media_types = if media_types.is_empty() {
            vec!["application/json".to_string()]
        } else {
            media_types
        };
        let content: Map<String, Value> = media_types
            .into_iter()
            .map(|m| (m, json!({ "schema": schema.clone() })))
            .collect();
        let mut out = Map::new();
        if let Some(description) = body.get("description") {
            out.insert("description".into(), description.clone());
        }
        out.insert(
            "required".into(),
            body.get("required").cloned().unwrap_or(json!(false)),
        );
        out.insert("content".into(), Value::Object(content));
        return Some(Value::Object(out));
    }

    let form: Vec<&&Value> = params
        .iter()
        .filter(|p| p.get("in").and_then(Value::as_str) == Some("formData"))
        .collect();
    if form.is_empty() {
        return None;
    }

    let mut properties = Map::new();
    let mut required = Vec::new();
    let mut has_file = false;
    for param in &form {
        let Some(name) = param.get("name").and_then(Value::as_str) else {
            continue;
        };
        let converted = convert_parameter(param);
        let schema = converted.get("schema").cloned().unwrap_or_else(|| json!({}));
        has_file |= schema.get("format").and_then(Value::as_str) == Some("binary")
            && param.get("type").and_then(Value::as_str) == Some("file");
        properties.insert(name.to_string(), schema);
        if param.get("required").and_then(Value::as_bool).unwrap_or(false) {
            required.push(json!(name));
        }
    }

    let media = if has_file || consumes.iter().any(|m| m == MULTIPART) {
        MULTIPART
    } else {
        FORM_URLENCODED
    };
    let mut schema = Map::new();
    schema.insert("type".into(), json!("object"));
    schema.insert("properties".into(), Value::Object(properties));
    let any_required = !required.is_empty();
    if any_required {
        schema.insert("required".into(), Value::Array(required));
    }
    Some(json!({
        "required": any_required,
        "content": { media: { "schema": Value::Object(schema) } }
    }))
}

fn convert_response(response: &Value, produces: &[String]) -> Value {
    let mut out = Map::new();
    out.insert(
        "description".into(),
        response.get("description").cloned().unwrap_or(json!("")),
    );
    if let Some(schema) = response.get("schema") {
        let schema = rewrite_refs(schema.clone());
        let examples = response.get("examples").and_then(Value::as_object);
        let media_types = if produces.is_empty() {
            vec!["application/json".to_string()]
        } else {
            produces.to_vec()
        };
        let content: Map<String, Value> = media_types
            .into_iter()
            .map(|m| {
                let mut media = Map::new();
                media.insert("schema".into(), schema.clone());
                if let Some(example) = examples.and_then(|e| e.get(&m)) {
                    media.insert("example".into(), example.clone());
                }
                (m, Value::Object(media))
            })
            .collect();
        out.insert("content".into(), Value::Object(content));
    }
    Value::Object(out)
}

fn convert_security_scheme(scheme: &Value) -> Value {
    match scheme.get("type").and_then(Value::as_str) {
        Some("basic") => json!({ "type": "http", "scheme": "basic" }),
        Some("oauth2") => {
            let flow = match scheme.get("flow").and_then(Value::as_str) {
                Some("implicit") => "implicit",
                Some("password") => "password",
                Some("application") => "clientCredentials",
                _ => "authorizationCode",
            };
            let mut body = Map::new();
            for key in ["authorizationUrl", "tokenUrl"] {
                if let Some(v) = scheme.get(key) {
                    body.insert(key.into(), v.clone());
                }
            }
            body.insert(
                "scopes".into(),
                scheme.get("scopes").cloned().unwrap_or_else(|| json!({})),
            );
            json!({ "type": "oauth2", "flows": { flow: Value::Object(body) } })
        }
        _ => scheme.clone(),
    }
}

/// Rewrite `#/definitions/` schema refs to their v3 location, recursively
fn rewrite_refs(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, v)| {
                    let v = match (key.as_str(), v) {
                        ("$ref", Value::String(r)) => match r.strip_prefix(DEFINITIONS_PREFIX) {
                            Some(name) => Value::String(format!("{SCHEMAS_PREFIX}{name}")),
                            None => Value::String(r),
                        },
                        ("x-nullable", other) => other,
                        (_, other) => rewrite_refs(other),
                    };
                    let key = if key == "x-nullable" { "nullable".to_string() } else { key };
                    (key, v)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(rewrite_refs).collect()),
        other => other,
    }
}
