use pretty_assertions::assert_eq;
use proptest::prelude::*;
use specops_model::{
    HttpMethod, ParameterLocation, PrimitiveKind, SchemaNode, SourceVersion, SpecError,
};
use specops_normalizer::{load, FormatHint, NormalizerConfig, SpecNormalizer};

const USERS_YAML: &str = r"
openapi: 3.0.3
info:
  title: Users
  version: '1.0'
servers:
  - url: https://api.example.test/v1
paths:
  /users/{id}:
    parameters:
      - name: id
        in: path
        required: true
        schema: {type: string}
      - name: X-Tenant
        in: header
        schema: {type: string}
    get:
      operationId: getUser
      parameters:
        - name: id
          in: path
          required: true
          schema: {type: integer, minimum: 1}
      responses:
        '200':
          description: ok
          content:
            application/json:
              schema: {$ref: '#/components/schemas/User'}
    delete:
      responses:
        204: {description: gone}
  /users/{id}/avatar/{size}:
    get:
      parameters:
        - name: id
          in: path
          schema: {type: integer}
      responses: {}
components:
  schemas:
    User:
      type: object
      required: [id]
      properties:
        id: {type: integer, readOnly: true}
        email: {type: string, format: email}
";

#[test]
fn loads_v3_yaml() {
    let spec = load(USERS_YAML.as_bytes(), FormatHint::Auto).unwrap();
    assert_eq!(spec.version, SourceVersion::OpenApi30);
    assert_eq!(spec.info.title, "Users");
    assert_eq!(spec.templates.len(), 2);
    assert_eq!(spec.operation_count(), 3);
    assert_eq!(spec.base_paths(), vec!["/v1".to_string()]);
    assert!(spec.components.contains_key("User"));
}

#[test]
fn operation_parameters_override_path_parameters() {
    let spec = load(USERS_YAML.as_bytes(), FormatHint::Yaml).unwrap();
    let get = spec.operation_by_name("getUser").unwrap();
    let id = get.parameter(ParameterLocation::Path, "id").unwrap();
    let schema = spec.schemas.get(id.schema).unwrap();
    assert!(matches!(
        schema.node,
        SchemaNode::Primitive { kind: PrimitiveKind::Integer, .. }
    ));
    // Path-level header parameter is inherited
    assert!(get.parameter(ParameterLocation::Header, "x-tenant").is_some());
}

#[test]
fn missing_operation_id_is_generated() {
    let spec = load(USERS_YAML.as_bytes(), FormatHint::Yaml).unwrap();
    let delete = spec
        .operations()
        .find(|op| op.method == HttpMethod::Delete)
        .unwrap();
    assert_eq!(delete.operation_id, "delete_users_id");
    assert!(delete.responses.contains_key("204"));
}

#[test]
fn undeclared_placeholder_gets_implicit_parameter() {
    let spec = load(USERS_YAML.as_bytes(), FormatHint::Yaml).unwrap();
    let avatar = &spec.templates[1].operations[0];
    let size = avatar.parameter(ParameterLocation::Path, "size").unwrap();
    assert!(size.implicit);
    assert!(size.required);
    // Declared path params are required even without `required: true`
    assert!(avatar.parameter(ParameterLocation::Path, "id").unwrap().required);
}

#[test]
fn duplicate_placeholder_is_malformed() {
    let doc = r#"{"openapi": "3.0.0", "info": {"title": "t", "version": "1"},
        "paths": {"/a/{id}/b/{id}": {"get": {"responses": {}}}}}"#;
    let err = load(doc.as_bytes(), FormatHint::Json).unwrap_err();
    assert!(matches!(err, SpecError::Malformed(msg) if msg.contains("duplicate placeholder")));
}

#[test]
fn dangling_reference_fails_without_partial_model() {
    let doc = r##"{"openapi": "3.0.0", "info": {"title": "t", "version": "1"},
        "paths": {"/a": {"get": {"responses": {"200": {"description": "ok",
            "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Gone"}}}}}}}}}"##;
    assert_eq!(
        load(doc.as_bytes(), FormatHint::Json).unwrap_err(),
        SpecError::unresolvable("#/components/schemas/Gone")
    );
}

#[test]
fn unsupported_and_unparsable_documents() {
    assert!(matches!(
        load(br#"{"openapi": "2.5"}"#, FormatHint::Json),
        Err(SpecError::UnsupportedVersion(_))
    ));
    assert!(matches!(
        load(b"openapi: [3.0", FormatHint::Auto),
        Err(SpecError::Malformed(_))
    ));
    assert!(matches!(load(&[0xff, 0xfe, 0x00], FormatHint::Auto), Err(SpecError::Malformed(_))));
}

#[test]
fn swagger2_upconverts_end_to_end() {
    let doc = r##"{
        "swagger": "2.0",
        "info": {"title": "Pets", "version": "1"},
        "host": "pets.example.test",
        "basePath": "/api",
        "paths": {
            "/pets": {
                "post": {
                    "parameters": [{"in": "body", "name": "pet", "required": true,
                                    "schema": {"$ref": "#/definitions/Pet"}}],
                    "responses": {"201": {"description": "created"}}
                }
            }
        },
        "definitions": {"Pet": {"type": "object", "properties": {"name": {"type": "string"}}}}
    }"##;
    let spec = load(doc.as_bytes(), FormatHint::Auto).unwrap();
    assert_eq!(spec.version, SourceVersion::Swagger2);
    assert_eq!(spec.base_paths(), vec!["/api".to_string()]);
    let op = spec.operations().next().unwrap();
    let body = op.request_body.as_ref().unwrap();
    assert!(body.required);
    let media = &body.content["application/json"];
    assert_eq!(media.schema, Some(spec.components["Pet"]));
}

#[test]
fn cyclic_schema_loads_with_configured_depth() {
    let doc = r"
openapi: 3.1.0
info: {title: Tree, version: '1'}
paths:
  /nodes:
    post:
      requestBody:
        content:
          application/json:
            schema: {$ref: '#/components/schemas/Node'}
      responses: {}
components:
  schemas:
    Node:
      type: object
      properties:
        name: {type: string}
        parent: {$ref: '#/components/schemas/Node'}
";
    let normalizer = SpecNormalizer::new(NormalizerConfig::new().with_cycle_expansion_depth(3));
    let spec = normalizer.load(doc.as_bytes(), FormatHint::Yaml).unwrap();
    let node = spec.components["Node"];
    let SchemaNode::Object { properties, .. } = &spec.schemas.get(node).unwrap().node else {
        panic!("expected object");
    };
    assert!(matches!(
        &spec.schemas.get(properties["parent"]).unwrap().node,
        SchemaNode::Reference { target, max_expansions: 3, .. } if *target == node
    ));
}

#[test]
fn security_schemes_and_requirements() {
    let doc = r#"{
        "openapi": "3.0.0", "info": {"title": "t", "version": "1"},
        "security": [{"key": []}],
        "paths": {
            "/a": {"get": {"responses": {}}},
            "/b": {"get": {"security": [], "responses": {}}}
        },
        "components": {"securitySchemes": {
            "key": {"type": "apiKey", "name": "X-Api-Key", "in": "header"},
            "bearer": {"type": "http", "scheme": "Bearer"}
        }}
    }"#;
    let spec = load(doc.as_bytes(), FormatHint::Json).unwrap();
    assert_eq!(spec.security_schemes.len(), 2);
    let ops: Vec<_> = spec.operations().collect();
    assert_eq!(ops[0].security.len(), 1);
    assert!(ops[1].security.is_empty());
}

#[test]
fn reserialized_document_reloads_same_operations() {
    let spec = load(USERS_YAML.as_bytes(), FormatHint::Yaml).unwrap();
    let rendered = serde_json::to_vec(&spec.to_document()).unwrap();
    let reloaded = load(&rendered, FormatHint::Json).unwrap();
    let ops = |s: &specops_model::Specification| {
        s.operations()
            .map(|op| (op.method, op.path.clone(), op.operation_id.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(ops(&spec), ops(&reloaded));
}

fn segment() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,8}".prop_map(|s| s),
        "[a-z]{1,6}".prop_map(|s| format!("{{{s}}}")),
    ]
}

fn method() -> impl Strategy<Value = HttpMethod> {
    prop_oneof![
        Just(HttpMethod::Get),
        Just(HttpMethod::Put),
        Just(HttpMethod::Post),
        Just(HttpMethod::Delete),
        Just(HttpMethod::Patch),
    ]
}

proptest! {
    #[test]
    fn prop_reserialization_preserves_operations(
        paths in prop::collection::vec(
            (prop::collection::vec(segment(), 1..4), prop::collection::btree_set(method(), 1..4)),
            1..6,
        )
    ) {
        let mut doc_paths = serde_json::Map::new();
        for (segments, methods) in &paths {
            // Placeholder names must be unique within a template
            let mut seen = std::collections::HashSet::new();
            let path: String = segments
                .iter()
                .enumerate()
                .map(|(i, s)| if s.starts_with('{') && !seen.insert(s.clone()) { format!("/x{i}") } else { format!("/{s}") })
                .collect();
            let item = doc_paths.entry(path).or_insert_with(|| serde_json::json!({}));
            for m in methods {
                item[m.document_key()] = serde_json::json!({"responses": {}});
            }
        }
        let doc = serde_json::json!({
            "openapi": "3.0.3",
            "info": {"title": "generated", "version": "1"},
            "paths": doc_paths,
        });

        let spec = load(&serde_json::to_vec(&doc).unwrap(), FormatHint::Json).unwrap();
        let reloaded = load(&serde_json::to_vec(&spec.to_document()).unwrap(), FormatHint::Json).unwrap();

        let declared: Vec<_> = spec.operations().map(|op| (op.path.clone(), op.method)).collect();
        let preserved: Vec<_> = reloaded.operations().map(|op| (op.path.clone(), op.method)).collect();
        prop_assert_eq!(declared, preserved);
    }
}
