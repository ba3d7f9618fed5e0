//! Testing utilities for the SpecOps workspace
//!
//! Shared fixture documents and request helpers.

#![allow(missing_docs)]

use serde_json::{json, Map, Value};
use specops_model::{ObservedRequest, RequestOrigin, Specification, SynthesisStrategy};
use specops_normalizer::FormatHint;
use std::sync::Arc;

/// Users and orders API: literal vs placeholder templates, a mixed segment,
/// constrained bodies and an apiKey-protected operation.
pub const USERS_ORDERS_V3: &str = r"
openapi: 3.0.3
info:
  title: Users and Orders
  version: '1.0'
servers:
  - url: https://api.example.test/v1
paths:
  /users:
    get:
      operationId: listUsers
      parameters:
        - name: limit
          in: query
          schema: {type: integer, minimum: 1, maximum: 100}
        - name: status
          in: query
          schema: {type: string, enum: [active, disabled]}
      responses:
        '200': {description: ok}
    post:
      operationId: createUser
      requestBody:
        required: true
        content:
          application/json:
            schema: {$ref: '#/components/schemas/User'}
      responses:
        '201': {description: created}
  /users/me:
    get:
      operationId: getCurrentUser
      responses:
        '200': {description: ok}
  /users/{id}:
    get:
      operationId: getUser
      parameters:
        - name: id
          in: path
          required: true
          schema: {type: integer}
        - name: X-Trace
          in: header
          required: true
          schema: {type: string}
      responses:
        '200': {description: ok}
    delete:
      operationId: deleteUser
      parameters:
        - name: id
          in: path
          required: true
          schema: {type: integer}
      responses:
        '204': {description: gone}
  /files/{name}.json:
    get:
      operationId: getFile
      responses:
        '200': {description: ok}
  /orders:
    post:
      operationId: createOrder
      security:
        - apiKey: []
      requestBody:
        required: true
        content:
          application/json:
            schema: {$ref: '#/components/schemas/Order'}
      responses:
        '201': {description: created}
components:
  securitySchemes:
    apiKey: {type: apiKey, name: X-Api-Key, in: header}
  schemas:
    User:
      type: object
      required: [email, name]
      properties:
        id: {type: integer, readOnly: true}
        email: {type: string, format: email}
        name: {type: string, minLength: 1, maxLength: 32}
    Order:
      type: object
      required: [quantity]
      additionalProperties: false
      properties:
        quantity: {type: integer, minimum: 1, maximum: 100}
        note: {type: string}
";

/// Swagger 2.0 petstore with host, basePath and definitions
pub const PETSTORE_V2: &str = r##"{
    "swagger": "2.0",
    "info": {"title": "Petstore", "version": "1.0"},
    "host": "petstore.example.test",
    "basePath": "/api",
    "schemes": ["https"],
    "consumes": ["application/json"],
    "produces": ["application/json"],
    "paths": {
        "/pets": {
            "get": {
                "operationId": "listPets",
                "parameters": [{"name": "limit", "in": "query", "type": "integer", "maximum": 50}],
                "responses": {"200": {"description": "ok", "schema": {"type": "array", "items": {"$ref": "#/definitions/Pet"}}}}
            },
            "post": {
                "operationId": "addPet",
                "parameters": [{"name": "pet", "in": "body", "required": true, "schema": {"$ref": "#/definitions/Pet"}}],
                "responses": {"201": {"description": "created"}}
            }
        },
        "/pets/{petId}": {
            "get": {
                "operationId": "getPet",
                "parameters": [{"name": "petId", "in": "path", "required": true, "type": "integer"}],
                "responses": {"200": {"description": "ok", "schema": {"$ref": "#/definitions/Pet"}}}
            }
        }
    },
    "definitions": {
        "Pet": {
            "type": "object",
            "required": ["name"],
            "properties": {
                "id": {"type": "integer", "readOnly": true},
                "name": {"type": "string"},
                "tag": {"type": "string"}
            }
        }
    }
}"##;

/// Self-referencing tree body
pub const CYCLIC_TREE_V3: &str = r"
openapi: 3.1.0
info: {title: Tree, version: '1'}
paths:
  /nodes:
    post:
      operationId: createNode
      requestBody:
        required: true
        content:
          application/json:
            schema: {$ref: '#/components/schemas/Node'}
      responses: {}
components:
  schemas:
    Node:
      type: object
      required: [name]
      properties:
        name: {type: string}
        children:
          type: array
          items: {$ref: '#/components/schemas/Node'}
";

/// allOf branches whose constraints intersect
pub const ALL_OF_COMPATIBLE_V3: &str = r"
openapi: 3.0.3
info: {title: Names, version: '1'}
paths:
  /names:
    post:
      operationId: createName
      requestBody:
        required: true
        content:
          application/json:
            schema:
              type: object
              required: [name]
              properties:
                name:
                  allOf:
                    - {type: string, minLength: 3}
                    - {minLength: 5}
      responses: {}
";

/// allOf branches declaring different types on one field
pub const ALL_OF_CONFLICT_V3: &str = r"
openapi: 3.0.3
info: {title: Broken, version: '1'}
paths:
  /values:
    post:
      operationId: createValue
      requestBody:
        required: true
        content:
          application/json:
            schema:
              type: object
              properties:
                value:
                  allOf:
                    - {type: string}
                    - {type: integer}
      responses: {}
";

/// Load a fixture document
pub fn load_fixture(document: &str) -> Arc<Specification> {
    Arc::new(specops_normalizer::load(document.as_bytes(), FormatHint::Auto).unwrap())
}

/// Minimal v3 document declaring bare operations, `[(path, [method, ..]), ..]`
pub fn document_with_paths(paths: &[(&str, &[&str])]) -> Value {
    let mut items = Map::new();
    for (path, methods) in paths {
        let item = items.entry((*path).to_string()).or_insert_with(|| json!({}));
        for method in *methods {
            item[method.to_ascii_lowercase()] = json!({"responses": {}});
        }
    }
    json!({
        "openapi": "3.0.3",
        "info": {"title": "generated", "version": "1"},
        "paths": items,
    })
}

/// Load a document built by [`document_with_paths`]
pub fn spec_with_paths(paths: &[(&str, &[&str])]) -> Arc<Specification> {
    let bytes = serde_json::to_vec(&document_with_paths(paths)).unwrap();
    Arc::new(specops_normalizer::load(&bytes, FormatHint::Json).unwrap())
}

/// Passive request
pub fn request(method: &str, target: &str) -> ObservedRequest {
    ObservedRequest::new(method, target)
}

/// Passive GET request
pub fn get(target: &str) -> ObservedRequest {
    request("GET", target)
}

/// Request tagged as a synthesized request
pub fn synthesized(method: &str, target: &str, strategy: SynthesisStrategy) -> ObservedRequest {
    request(method, target).with_origin(RequestOrigin::Synthesized(strategy))
}
