//! Operation-level synthesis entry points

use crate::config::SynthesisConfig;
use crate::error::{SynthResult, SynthesisError};
use crate::request::{choose_media, empty_object, RequestDraft, RequestRenderer, SynthesizedRequest};
use crate::rules::{host_of, resolve_headers};
use crate::sequence::SynthesisSequence;
use crate::shape::ShapeBuilder;
use crate::store::ParameterStore;
use crate::strategy::{strategy_for, BodyShape, Mutation, OperationShapes, ParamShape, PlanContext};
use crate::values::ValueGenerator;
use rayon::prelude::*;
use serde_json::Value;
use specops_model::{
    ApiKeyLocation, FieldPath, OperationEntry, OperationId, ParameterLocation, SecurityScheme,
    Specification, SynthesisStrategy,
};
use std::sync::Arc;

/// Generates request descriptors from an operation's schemas
///
/// Pure over an immutable [`Specification`]; safe to share across threads.
/// With a [`ParameterStore`] attached, stored values replace generated
/// ones in the baseline every variant starts from.
#[derive(Debug, Clone)]
pub struct SchemaRequestSynthesizer {
    spec: Arc<Specification>,
    config: SynthesisConfig,
    store: Option<Arc<ParameterStore>>,
    base_url: Option<String>,
}

/// One operation that could not be synthesized
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisFailure {
    pub operation: OperationId,
    pub operation_id: String,
    pub error: SynthesisError,
}

/// Result of synthesizing every operation
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Requests in operation declaration order
    pub requests: Vec<SynthesizedRequest>,
    pub failures: Vec<SynthesisFailure>,
}

impl BatchOutcome {
    /// Whether every operation synthesized
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

impl SchemaRequestSynthesizer {
    /// Create synthesizer
    #[must_use]
    pub fn new(spec: Arc<Specification>, config: SynthesisConfig) -> Self {
        let base_url = spec.servers.first().map(|server| {
            for (name, value) in &config.server_variables {
                match server.variables.get(name) {
                    None => tracing::warn!("Server variable {} is not declared", name),
                    Some(declared) if !declared.enum_values.is_empty() && !declared.enum_values.contains(value) => {
                        tracing::warn!("Server variable {} = {} is outside its enum", name, value);
                    }
                    Some(_) => {}
                }
            }
            server.resolved_url_with(&config.server_variables)
        });
        Self {
            spec,
            config,
            store: None,
            base_url,
        }
    }

    /// With a shared parameter store
    #[inline]
    #[must_use]
    pub fn with_store(mut self, store: Arc<ParameterStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Attached parameter store
    #[inline]
    #[must_use]
    pub fn store(&self) -> Option<&Arc<ParameterStore>> {
        self.store.as_ref()
    }

    /// Server URL requests are addressed to
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Specification requests are generated from
    #[inline]
    #[must_use]
    pub fn specification(&self) -> &Arc<Specification> {
        &self.spec
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// Requests for one operation under one strategy
    ///
    /// # Errors
    ///
    /// `UnknownOperation` for a foreign handle, `ConflictingConstraints` when
    /// `allOf` branches cannot be satisfied together, `UnsupportedSchemaShape`
    /// for constructs the generator cannot honor.
    pub fn synthesize(
        &self,
        operation: OperationId,
        strategy: SynthesisStrategy,
    ) -> SynthResult<SynthesisSequence> {
        let entry = self
            .spec
            .operation(operation)
            .ok_or_else(|| SynthesisError::UnknownOperation(format!("#{}", operation.0)))?;
        self.synthesize_entry(entry, strategy)
    }

    /// Requests for an operation looked up by `operationId`
    ///
    /// # Errors
    ///
    /// Same as [`Self::synthesize`].
    pub fn synthesize_named(
        &self,
        operation_id: &str,
        strategy: SynthesisStrategy,
    ) -> SynthResult<SynthesisSequence> {
        let entry = self
            .spec
            .operation_by_name(operation_id)
            .ok_or_else(|| SynthesisError::UnknownOperation(operation_id.to_string()))?;
        self.synthesize_entry(entry, strategy)
    }

    /// Every operation under one strategy; failures are collected, not fatal
    #[must_use]
    pub fn synthesize_all(&self, strategy: SynthesisStrategy) -> BatchOutcome {
        let entries: Vec<&OperationEntry> = self.spec.operations().collect();
        let results: Vec<Result<Vec<SynthesizedRequest>, SynthesisFailure>> = entries
            .par_iter()
            .map(|entry| {
                self.synthesize_entry(entry, strategy)
                    .map(Iterator::collect)
                    .map_err(|error| SynthesisFailure {
                        operation: entry.id,
                        operation_id: entry.operation_id.clone(),
                        error,
                    })
            })
            .collect();

        let mut outcome = BatchOutcome::default();
        for result in results {
            match result {
                Ok(requests) => outcome.requests.extend(requests),
                Err(failure) => {
                    tracing::warn!("Synthesis failed for {}: {}", failure.operation_id, failure.error);
                    outcome.failures.push(failure);
                }
            }
        }
        tracing::info!(
            "Synthesized {} {} requests across {} operations ({} failed)",
            outcome.requests.len(),
            strategy,
            entries.len(),
            outcome.failures.len()
        );
        outcome
    }

    /// Materialize the parameter and body shapes of an operation
    ///
    /// # Errors
    ///
    /// Constraint conflicts and unsupported shapes found while merging.
    pub fn prepare(&self, entry: &OperationEntry) -> SynthResult<OperationShapes> {
        let mut builder = ShapeBuilder::new(&self.spec.schemas, self.config.max_depth);

        let mut params = Vec::with_capacity(entry.parameters.len());
        for param in &entry.parameters {
            let field = FieldPath::parameter(param.location, &param.name);
            let mut shape = builder.build(param.schema, &field)?;
            if let Some(example) = &param.example {
                shape.meta.example = Some(example.clone());
            }
            params.push(ParamShape {
                name: param.name.clone(),
                location: param.location,
                required: param.required,
                field,
                shape,
            });
        }

        let body = match entry.request_body.as_ref() {
            Some(request_body) => match choose_media(&request_body.content) {
                Some((media_type, media)) => match media.schema {
                    Some(schema) => {
                        let mut shape = builder.build(schema, &FieldPath::body())?;
                        if let Some(example) = &media.example {
                            shape.meta.example = Some(example.clone());
                        }
                        Some(BodyShape {
                            media_type: media_type.clone(),
                            required: request_body.required,
                            shape,
                        })
                    }
                    None => None,
                },
                None => None,
            },
            None => None,
        };

        Ok(OperationShapes { params, body })
    }

    fn synthesize_entry(
        &self,
        entry: &OperationEntry,
        strategy: SynthesisStrategy,
    ) -> SynthResult<SynthesisSequence> {
        let shapes = self.prepare(entry)?;
        let values = ValueGenerator::new(self.config.seed);
        let baseline = self.baseline(entry, &shapes, &values);

        let ctx = PlanContext {
            operation: entry,
            shapes: &shapes,
            values,
            config: &self.config,
        };
        let plans = strategy_for(strategy).plan(&ctx);
        tracing::debug!("Planned {} {} cases for {}", plans.len(), strategy, entry.label());

        let renderer = RequestRenderer::new(
            entry.id,
            entry.operation_id.clone(),
            strategy,
            entry.method,
            entry.path.clone(),
            shapes.body.as_ref().map(|body| body.media_type.clone()),
        )
        .with_base_url(self.base_url.clone())
        .with_extra_headers(resolve_headers(
            &self.config.header_rules,
            entry,
            self.base_url.as_deref().and_then(host_of),
            self.store.as_deref(),
        ));
        Ok(SynthesisSequence::new(renderer, baseline, plans))
    }

    /// Valid request every variant starts from
    fn baseline(&self, entry: &OperationEntry, shapes: &OperationShapes, values: &ValueGenerator) -> RequestDraft {
        let include = self.config.include_optional;
        let mut draft = RequestDraft::default();

        let store = self.store.as_deref();
        for param in &shapes.params {
            let stored = store.and_then(|s| s.get(param.location, &param.name));
            let wanted = param.required || include || param.location == ParameterLocation::Path;
            if !wanted && stored.is_none() {
                continue;
            }
            let value = match stored {
                Some(text) => Value::String(text),
                None => values
                    .valid(&param.shape, &param.field, include)
                    .unwrap_or_else(|| Value::String(values.token(&param.field))),
            };
            draft.params.insert((param.location, param.name.clone()), value);
        }

        for (location, name, value) in self.security_params(entry) {
            if entry.parameter(location, &name).is_none() {
                let value = store
                    .and_then(|s| s.get(location, &name))
                    .map_or(value, Value::String);
                draft.params.insert((location, name), value);
            }
        }

        if let Some(body) = &shapes.body {
            draft.body = Some(
                values
                    .valid(&body.shape, &FieldPath::body(), include)
                    .unwrap_or_else(empty_object),
            );
            for (field, value) in store.map(ParameterStore::body_overrides).unwrap_or_default() {
                if !draft.apply(&Mutation::SetBody { value }, &field) {
                    tracing::debug!("Body override {} has no slot in {}", field, entry.label());
                }
            }
        }
        draft
    }

    /// Placeholder credentials for the first security alternative
    fn security_params(&self, entry: &OperationEntry) -> Vec<(ParameterLocation, String, Value)> {
        let Some(requirement) = entry.security.first() else {
            return Vec::new();
        };
        let mut params = Vec::new();
        for scheme_name in requirement.keys() {
            let Some(scheme) = self.spec.security_schemes.get(scheme_name) else {
                tracing::debug!("Security scheme {} not declared", scheme_name);
                continue;
            };
            let param = match scheme {
                SecurityScheme::ApiKey { name, location } => {
                    let location = match location {
                        ApiKeyLocation::Header => ParameterLocation::Header,
                        ApiKeyLocation::Query => ParameterLocation::Query,
                        ApiKeyLocation::Cookie => ParameterLocation::Cookie,
                    };
                    (location, name.clone(), Value::String(format!("<{name}>")))
                }
                SecurityScheme::Http { scheme, .. } if scheme.eq_ignore_ascii_case("basic") => (
                    ParameterLocation::Header,
                    "Authorization".to_string(),
                    Value::String("Basic <credentials>".to_string()),
                ),
                SecurityScheme::Http { .. }
                | SecurityScheme::OAuth2 { .. }
                | SecurityScheme::OpenIdConnect { .. } => (
                    ParameterLocation::Header,
                    "Authorization".to_string(),
                    Value::String("Bearer <token>".to_string()),
                ),
            };
            params.push(param);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{HeaderRule, HeaderScope};
    use specops_model::SynthesisStrategy;
    use specops_test_utils::{load_fixture, USERS_ORDERS_V3};

    #[test]
    fn stored_values_win_in_every_variant_but_their_own() {
        let store = Arc::new(ParameterStore::new());
        store.set_param(ParameterLocation::Query, "limit", "42");
        store.set_param(ParameterLocation::Header, "x-api-key", "secret");
        store.set(&"body.note".parse().unwrap(), "rush");
        let synth = SchemaRequestSynthesizer::new(load_fixture(USERS_ORDERS_V3), SynthesisConfig::default())
            .with_store(Arc::clone(&store));

        let list: Vec<_> = synth
            .synthesize_named("listUsers", SynthesisStrategy::Boundary)
            .unwrap()
            .collect();
        let status_case = list.iter().find(|r| r.target.to_string() == "query.status").unwrap();
        assert!(status_case.query.contains(&("limit".to_string(), "42".to_string())));
        let limit_case = list.iter().find(|r| r.label.contains("= minimum")).unwrap();
        assert!(limit_case.query.contains(&("limit".to_string(), "1".to_string())));

        let order = synth
            .synthesize_named("createOrder", SynthesisStrategy::Valid)
            .unwrap()
            .next()
            .unwrap();
        assert_eq!(order.header("X-Api-Key"), Some("secret"));
        let Some(crate::Payload::Json(body)) = order.body.map(|b| b.payload) else {
            panic!("expected json body");
        };
        assert_eq!(body["note"], "rush");
    }

    #[test]
    fn optional_parameter_with_stored_value_is_sent() {
        let store = Arc::new(ParameterStore::new());
        store.set_param(ParameterLocation::Query, "status", "disabled");
        let config = SynthesisConfig::default().with_include_optional(false);
        let synth = SchemaRequestSynthesizer::new(load_fixture(USERS_ORDERS_V3), config).with_store(store);
        let request = synth
            .synthesize_named("listUsers", SynthesisStrategy::Valid)
            .unwrap()
            .next()
            .unwrap();
        assert_eq!(request.query, vec![("status".to_string(), "disabled".to_string())]);
    }

    #[test]
    fn header_rules_and_server_variables() {
        let store = Arc::new(ParameterStore::new());
        store.set_param(ParameterLocation::Header, "X-Trace", "t-1");
        let config = SynthesisConfig::default()
            .with_header_rule(HeaderRule::new("X-Request-Source", "specops ${param.header.x-trace}"))
            .with_header_rule(
                HeaderRule::new("X-Write", "1").with_scope(HeaderScope::Method("POST".into())),
            )
            .with_header_rule(
                HeaderRule::new("X-Other-Host", "1").with_scope(HeaderScope::Host("other.test".into())),
            );
        let synth = SchemaRequestSynthesizer::new(load_fixture(USERS_ORDERS_V3), config).with_store(store);
        assert_eq!(synth.base_url(), Some("https://api.example.test/v1"));

        let get = synth
            .synthesize_named("getUser", SynthesisStrategy::Valid)
            .unwrap()
            .next()
            .unwrap();
        assert_eq!(get.header("X-Request-Source"), Some("specops t-1"));
        assert_eq!(get.header("X-Trace"), Some("t-1"));
        assert_eq!(get.header("X-Write"), None);
        assert_eq!(get.header("X-Other-Host"), None);
        assert!(get.full_url().starts_with("https://api.example.test/v1/users/"));

        let post = synth
            .synthesize_named("createUser", SynthesisStrategy::Valid)
            .unwrap()
            .next()
            .unwrap();
        assert_eq!(post.header("X-Write"), Some("1"));
    }

    #[test]
    fn server_variable_overrides_replace_defaults() {
        let document = serde_json::json!({
            "openapi": "3.0.3",
            "info": {"title": "t", "version": "1"},
            "servers": [{
                "url": "https://{region}.example.test/{version}",
                "variables": {
                    "region": {"default": "eu", "enum": ["eu", "us"]},
                    "version": {"default": "v1"}
                }
            }],
            "paths": {"/ping": {"get": {"responses": {}}}}
        });
        let spec = load_fixture(&document.to_string());
        let config = SynthesisConfig::default().with_server_variable("region", "us");
        let synth = SchemaRequestSynthesizer::new(spec, config);
        let request = synth
            .synthesize_named("get_ping", SynthesisStrategy::Valid)
            .unwrap()
            .next()
            .unwrap();
        assert_eq!(request.full_url(), "https://us.example.test/v1/ping");
    }

    #[test]
    fn unknown_operation_handle() {
        let spec = specops_test_utils::spec_with_paths(&[("/ping", &["get"])]);
        let synth = SchemaRequestSynthesizer::new(spec, SynthesisConfig::default());
        let err = synth.synthesize(OperationId(3), SynthesisStrategy::Valid).unwrap_err();
        assert_eq!(err, SynthesisError::UnknownOperation("#3".to_string()));
        let err = synth.synthesize_named("nope", SynthesisStrategy::Valid).unwrap_err();
        assert_eq!(err, SynthesisError::UnknownOperation("nope".to_string()));

        let outcome = synth.synthesize_all(SynthesisStrategy::Valid);
        assert!(outcome.is_complete());
        assert_eq!(outcome.requests.len(), 1);
        assert_eq!(outcome.requests[0].path, "/ping");
    }
}
