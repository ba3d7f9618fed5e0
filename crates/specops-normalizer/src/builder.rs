//! OpenAPI 3 document → canonical [`Specification`]

use crate::resolver::SchemaResolver;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use specops_model::{
    placeholder_names, ApiInfo, ApiKeyLocation, DocumentHash, HttpMethod, MediaSpec,
    OperationEntry, OperationId, ParameterLocation, ParameterSpec, PathTemplate, RequestBodySpec,
    ResponseSpec, SecurityRequirement, SecurityScheme, Server, ServerVariable, SourceVersion,
    SpecError, SpecResult, Specification,
};
use std::collections::HashSet;

/// Build the canonical model from a v3 document tree
///
/// # Errors
/// Fails fast on the first structural or reference error; no partial model.
pub fn build_specification(
    document: &Value,
    version: SourceVersion,
    hash: DocumentHash,
    cycle_expansion_depth: u32,
) -> SpecResult<Specification> {
    let root = document
        .as_object()
        .ok_or_else(|| SpecError::malformed("document root is not an object"))?;
    let mut builder = SpecBuilder {
        resolver: SchemaResolver::new(document, cycle_expansion_depth),
        next_operation: 0,
        declared_ids: HashSet::new(),
        generated_ids: HashSet::new(),
    };

    let info = info_of(root.get("info"));
    let servers = servers_of(root.get("servers"))?;
    let security_schemes = security_schemes_of(
        root.get("components")
            .and_then(|c| c.get("securitySchemes")),
        &builder.resolver,
    )?;
    let security = security_of(root.get("security"))?;

    let mut components = IndexMap::new();
    if let Some(schemas) = root
        .get("components")
        .and_then(|c| c.get("schemas"))
        .and_then(Value::as_object)
    {
        for name in schemas.keys() {
            let pointer = format!(
                "#/components/schemas/{}",
                name.replace('~', "~0").replace('/', "~1")
            );
            components.insert(name.clone(), builder.resolver.resolve_ref(&pointer)?);
        }
    }

    let mut templates = Vec::new();
    if let Some(paths) = root.get("paths") {
        let paths = paths
            .as_object()
            .ok_or_else(|| SpecError::malformed("'paths' is not an object"))?;
        for (path, item) in paths {
            let template = builder.template(templates.len(), path, item, &security)?;
            templates.push(template);
        }
    }

    disambiguate_generated_ids(&mut templates, &builder.declared_ids, &builder.generated_ids);

    let cycles = builder.resolver.cycles_detected();
    let spec = Specification {
        version,
        info,
        servers,
        templates,
        schemas: builder.resolver.into_arena(),
        components,
        security_schemes,
        security,
        hash,
    };
    tracing::info!(
        "Loaded {} '{}': {} templates, {} operations, {} reference cycles",
        spec.version,
        spec.info.title,
        spec.templates.len(),
        spec.operation_count(),
        cycles
    );
    Ok(spec)
}

struct SpecBuilder<'doc> {
    resolver: SchemaResolver<'doc>,
    next_operation: usize,
    /// operationIds written in the document
    declared_ids: HashSet<String>,
    /// Operations whose id was derived from method and path
    generated_ids: HashSet<OperationId>,
}

impl<'doc> SpecBuilder<'doc> {
    fn template(
        &mut self,
        index: usize,
        path: &str,
        item: &'doc Value,
        global_security: &[SecurityRequirement],
    ) -> SpecResult<PathTemplate> {
        if !path.starts_with('/') {
            return Err(SpecError::malformed(format!(
                "path '{path}' does not start with '/'"
            )));
        }
        let placeholders = placeholder_names(path).map_err(SpecError::Malformed)?;
        let mut seen = HashSet::new();
        if let Some(dup) = placeholders.iter().find(|p| !seen.insert(p.as_str())) {
            return Err(SpecError::malformed(format!(
                "duplicate placeholder '{{{dup}}}' in {path}"
            )));
        }

        let item = self.resolver.follow(item)?;
        let item = item
            .as_object()
            .ok_or_else(|| SpecError::malformed(format!("path item {path} is not an object")))?;
        let shared = self.parameters(item.get("parameters"), path)?;

        let mut operations = Vec::new();
        for (key, op) in item {
            let Some(method) = HttpMethod::ALL.into_iter().find(|m| m.document_key() == key.as_str()) else {
                continue;
            };
            let op = op.as_object().ok_or_else(|| {
                SpecError::malformed(format!("operation {key} {path} is not an object"))
            })?;
            let entry = self.operation(index, path, method, op, &shared, &placeholders, global_security)?;
            operations.push(entry);
        }

        Ok(PathTemplate {
            path: path.to_string(),
            placeholders,
            operations,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn operation(
        &mut self,
        template: usize,
        path: &str,
        method: HttpMethod,
        op: &'doc Map<String, Value>,
        shared: &[ParameterSpec],
        placeholders: &[String],
        global_security: &[SecurityRequirement],
    ) -> SpecResult<OperationEntry> {
        let own = self.parameters(op.get("parameters"), path)?;
        let mut merged: IndexMap<(ParameterLocation, String), ParameterSpec> = shared
            .iter()
            .map(|p| (p.key(), p.clone()))
            .collect();
        for param in own {
            // Operation-level declaration wins on (in, name).
            merged.insert(param.key(), param);
        }

        for name in placeholders {
            let key = (ParameterLocation::Path, name.clone());
            if !merged.contains_key(&key) {
                let schema = self.resolver.implicit_string();
                merged.insert(
                    key,
                    ParameterSpec {
                        name: name.clone(),
                        location: ParameterLocation::Path,
                        required: true,
                        schema,
                        example: None,
                        description: None,
                        implicit: true,
                    },
                );
            }
        }
        for param in merged.values() {
            if param.location == ParameterLocation::Path && !placeholders.contains(&param.name) {
                tracing::warn!(
                    "Path parameter '{}' has no placeholder in {} {}",
                    param.name,
                    method,
                    path
                );
            }
        }

        let request_body = match op.get("requestBody") {
            Some(body) => Some(self.request_body(body)?),
            None => None,
        };

        let mut responses = IndexMap::new();
        if let Some(source) = op.get("responses").and_then(Value::as_object) {
            for (code, response) in source {
                responses.insert(code.clone(), self.response(response)?);
            }
        }

        let security = match op.get("security") {
            Some(value) => security_of(Some(value))?,
            None => global_security.to_vec(),
        };

        let id = OperationId(self.next_operation);
        self.next_operation += 1;
        let operation_id = match op.get("operationId").and_then(Value::as_str) {
            Some(declared) => {
                if !self.declared_ids.insert(declared.to_string()) {
                    return Err(SpecError::malformed(format!(
                        "duplicate operationId '{declared}' on {method} {path}"
                    )));
                }
                declared.to_string()
            }
            None => {
                self.generated_ids.insert(id);
                generated_operation_id(method, path)
            }
        };
        Ok(OperationEntry {
            id,
            method,
            path: path.to_string(),
            template,
            operation_id,
            summary: op.get("summary").and_then(Value::as_str).map(str::to_string),
            tags: op
                .get("tags")
                .and_then(Value::as_array)
                .map(|t| t.iter().filter_map(Value::as_str).map(str::to_string).collect())
                .unwrap_or_default(),
            deprecated: op.get("deprecated").and_then(Value::as_bool).unwrap_or(false),
            parameters: merged.into_values().collect(),
            request_body,
            responses,
            security,
        })
    }

    fn parameters(&mut self, list: Option<&'doc Value>, path: &str) -> SpecResult<Vec<ParameterSpec>> {
        let Some(list) = list else {
            return Ok(Vec::new());
        };
        let list = list
            .as_array()
            .ok_or_else(|| SpecError::malformed(format!("parameters of {path} is not an array")))?;

        let mut out = Vec::with_capacity(list.len());
        for raw in list {
            let param = self.resolver.follow(raw)?;
            let name = param
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| SpecError::malformed(format!("parameter without name in {path}")))?;
            let keyword = param.get("in").and_then(Value::as_str).unwrap_or_default();
            let Some(location) = ParameterLocation::from_keyword(keyword) else {
                tracing::warn!("Skipping parameter '{}' with location '{}' in {}", name, keyword, path);
                continue;
            };

            let schema_value = param.get("schema").or_else(|| {
                param
                    .get("content")
                    .and_then(Value::as_object)
                    .and_then(|c| c.values().next())
                    .and_then(|m| m.get("schema"))
            });
            let schema = match schema_value {
                Some(s) => self.resolver.build(s)?,
                None => self.resolver.implicit_string(),
            };
            let example = param.get("example").cloned().or_else(|| {
                param
                    .get("examples")
                    .and_then(Value::as_object)
                    .and_then(|e| e.values().next())
                    .and_then(|e| e.get("value"))
                    .cloned()
            });

            out.push(ParameterSpec {
                name: name.to_string(),
                location,
                required: location == ParameterLocation::Path
                    || param.get("required").and_then(Value::as_bool).unwrap_or(false),
                schema,
                example,
                description: param
                    .get("description")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                implicit: false,
            });
        }
        Ok(out)
    }

    fn request_body(&mut self, raw: &'doc Value) -> SpecResult<RequestBodySpec> {
        let body = self.resolver.follow(raw)?;
        Ok(RequestBodySpec {
            required: body.get("required").and_then(Value::as_bool).unwrap_or(false),
            content: self.content(body.get("content"))?,
            description: body
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    fn response(&mut self, raw: &'doc Value) -> SpecResult<ResponseSpec> {
        let response = self.resolver.follow(raw)?;
        Ok(ResponseSpec {
            description: response
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            content: self.content(response.get("content"))?,
        })
    }

    fn content(&mut self, content: Option<&'doc Value>) -> SpecResult<IndexMap<String, MediaSpec>> {
        let mut out = IndexMap::new();
        let Some(content) = content.and_then(Value::as_object) else {
            return Ok(out);
        };
        for (media_type, media) in content {
            let schema = match media.get("schema") {
                Some(s) => Some(self.resolver.build(s)?),
                None => None,
            };
            let example = media.get("example").cloned().or_else(|| {
                media
                    .get("examples")
                    .and_then(Value::as_object)
                    .and_then(|e| e.values().next())
                    .and_then(|e| e.get("value"))
                    .cloned()
            });
            out.insert(media_type.clone(), MediaSpec { schema, example });
        }
        Ok(out)
    }
}

/// Suffix derived ids that collide with another id: `get_a`, `get_a_2`, ...
fn disambiguate_generated_ids(
    templates: &mut [PathTemplate],
    declared: &HashSet<String>,
    generated: &HashSet<OperationId>,
) {
    let mut taken = declared.clone();
    for op in templates.iter_mut().flat_map(|t| t.operations.iter_mut()) {
        if !generated.contains(&op.id) {
            continue;
        }
        let base = op.operation_id.clone();
        let mut candidate = base.clone();
        let mut n = 2;
        while taken.contains(&candidate) {
            candidate = format!("{base}_{n}");
            n += 1;
        }
        if candidate != base {
            tracing::debug!("Derived operationId {} taken, using {}", base, candidate);
            op.operation_id = candidate.clone();
        }
        taken.insert(candidate);
    }
}

/// `<method>_<path>` with every non-alphanumeric run collapsed to `_`
fn generated_operation_id(method: HttpMethod, path: &str) -> String {
    let mut id = method.document_key().to_string();
    let mut pending = true;
    for c in path.chars() {
        if c.is_ascii_alphanumeric() {
            if pending {
                id.push('_');
                pending = false;
            }
            id.push(c);
        } else {
            pending = true;
        }
    }
    id
}

fn info_of(info: Option<&Value>) -> ApiInfo {
    let text = |key: &str| {
        info.and_then(|i| i.get(key))
            .and_then(Value::as_str)
            .map(str::to_string)
    };
    ApiInfo {
        title: text("title").unwrap_or_default(),
        version: text("version").unwrap_or_default(),
        description: text("description"),
    }
}

fn servers_of(servers: Option<&Value>) -> SpecResult<Vec<Server>> {
    let Some(list) = servers.and_then(Value::as_array) else {
        return Ok(vec![Server::new("/")]);
    };
    let mut out = Vec::with_capacity(list.len());
    for server in list {
        let url = server
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| SpecError::malformed("server without url"))?;
        let mut variables = IndexMap::new();
        if let Some(vars) = server.get("variables").and_then(Value::as_object) {
            for (name, var) in vars {
                let default = match var.get("default") {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => {
                        return Err(SpecError::malformed(format!(
                            "server variable '{name}' has no default"
                        )))
                    }
                };
                let enum_values = var
                    .get("enum")
                    .and_then(Value::as_array)
                    .map(|e| e.iter().filter_map(Value::as_str).map(str::to_string).collect())
                    .unwrap_or_default();
                variables.insert(name.clone(), ServerVariable { default, enum_values });
            }
        }
        out.push(Server {
            url: url.to_string(),
            description: server
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
            variables,
        });
    }
    if out.is_empty() {
        out.push(Server::new("/"));
    }
    Ok(out)
}

fn security_schemes_of(
    schemes: Option<&Value>,
    resolver: &SchemaResolver<'_>,
) -> SpecResult<IndexMap<String, SecurityScheme>> {
    let mut out = IndexMap::new();
    let Some(schemes) = schemes.and_then(Value::as_object) else {
        return Ok(out);
    };
    for (name, raw) in schemes {
        let scheme = resolver.follow(raw)?;
        let kind = scheme.get("type").and_then(Value::as_str).unwrap_or_default();
        let text = |key: &str| scheme.get(key).and_then(Value::as_str).map(str::to_string);
        let parsed = match kind {
            "apiKey" => {
                let location = match scheme.get("in").and_then(Value::as_str) {
                    Some("header") => ApiKeyLocation::Header,
                    Some("query") => ApiKeyLocation::Query,
                    Some("cookie") => ApiKeyLocation::Cookie,
                    other => {
                        return Err(SpecError::malformed(format!(
                            "apiKey scheme '{name}' has invalid location {other:?}"
                        )))
                    }
                };
                SecurityScheme::ApiKey {
                    name: text("name").ok_or_else(|| {
                        SpecError::malformed(format!("apiKey scheme '{name}' has no name"))
                    })?,
                    location,
                }
            }
            "http" => SecurityScheme::Http {
                scheme: text("scheme").unwrap_or_else(|| "bearer".to_string()).to_ascii_lowercase(),
                bearer_format: text("bearerFormat"),
            },
            "oauth2" => SecurityScheme::OAuth2 {
                flows: scheme
                    .get("flows")
                    .and_then(Value::as_object)
                    .map(|f| f.keys().cloned().collect())
                    .unwrap_or_default(),
            },
            "openIdConnect" => SecurityScheme::OpenIdConnect {
                url: text("openIdConnectUrl").unwrap_or_default(),
            },
            other => {
                tracing::warn!("Skipping security scheme '{}' of unknown type '{}'", name, other);
                continue;
            }
        };
        out.insert(name.clone(), parsed);
    }
    Ok(out)
}

fn security_of(security: Option<&Value>) -> SpecResult<Vec<SecurityRequirement>> {
    let Some(security) = security else {
        return Ok(Vec::new());
    };
    serde_json::from_value(security.clone())
        .map_err(|e| SpecError::malformed(format!("invalid security requirement: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_sanitized() {
        assert_eq!(generated_operation_id(HttpMethod::Get, "/users/{id}"), "get_users_id");
        assert_eq!(
            generated_operation_id(HttpMethod::Post, "/v1/order-items/{itemId}/notes"),
            "post_v1_order_items_itemId_notes"
        );
        assert_eq!(generated_operation_id(HttpMethod::Get, "/"), "get");
    }

    fn load_json(document: serde_json::Value) -> SpecResult<Specification> {
        build_specification(&document, SourceVersion::OpenApi30, DocumentHash::compute(b"test"), 1)
    }

    #[test]
    fn duplicate_declared_operation_id_is_malformed() {
        let err = load_json(serde_json::json!({
            "openapi": "3.0.3",
            "info": {"title": "t", "version": "1"},
            "paths": {
                "/a": {"get": {"operationId": "fetch", "responses": {}}},
                "/b": {"get": {"operationId": "fetch", "responses": {}}}
            }
        }))
        .unwrap_err();
        assert!(matches!(&err, SpecError::Malformed(m) if m.contains("duplicate operationId 'fetch'")));
    }

    #[test]
    fn colliding_derived_ids_get_suffixes() {
        let spec = load_json(serde_json::json!({
            "openapi": "3.0.3",
            "info": {"title": "t", "version": "1"},
            "paths": {
                "/a-b": {"get": {"responses": {}}},
                "/a_b": {"get": {"responses": {}}},
                "/a.b": {"get": {"responses": {}}},
                "/c": {"get": {"operationId": "get_c_x", "responses": {}}},
                "/c/x": {"get": {"responses": {}}}
            }
        }))
        .unwrap();
        let ids: Vec<&str> = spec.operations().map(|op| op.operation_id.as_str()).collect();
        assert_eq!(ids, vec!["get_a_b", "get_a_b_2", "get_a_b_3", "get_c_x", "get_c_x_2"]);
    }

    #[test]
    fn servers_default_to_root() {
        let servers = servers_of(None).unwrap();
        assert_eq!(servers, vec![Server::new("/")]);
    }

    #[test]
    fn server_variable_without_default_is_malformed() {
        let value = serde_json::json!([{"url": "https://{host}", "variables": {"host": {}}}]);
        assert!(matches!(servers_of(Some(&value)), Err(SpecError::Malformed(_))));
    }
}
