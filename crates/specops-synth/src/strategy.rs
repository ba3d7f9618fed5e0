//! Case planning strategies
//!
//! A strategy looks at the materialized shapes of one operation and returns
//! an ordered list of [`CasePlan`]s. Each plan names one field and one
//! [`Mutation`] to apply to the operation's valid baseline request; rendering
//! happens later, one plan at a time.

use crate::config::SynthesisConfig;
use crate::request::value_text;
use crate::shape::{Additional, Shape, ShapeKind};
use crate::values::ValueGenerator;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use specops_model::{FieldPath, OperationEntry, ParameterLocation, PrimitiveKind, SynthesisStrategy};
use std::fmt;

/// Payload strings sent in string fields and path segments by the malformed strategy
pub const INJECTION_PAYLOADS: [&str; 6] = [
    "' OR '1'='1",
    "<script>alert(1)</script>",
    "../../../../etc/passwd",
    "${jndi:ldap://127.0.0.1/a}",
    "{{7*7}}",
    "%00",
];

/// Name of the property added to objects that forbid additional properties
pub const EXTRA_PROPERTY: &str = "specops_extra";

/// Change applied to the baseline request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mutation")]
pub enum Mutation {
    /// Send the baseline unchanged
    Baseline,
    SetParam {
        location: ParameterLocation,
        name: String,
        value: Value,
    },
    OmitParam {
        location: ParameterLocation,
        name: String,
    },
    /// Replace the body value at the target path (the whole body at `body`)
    SetBody { value: Value },
    /// Remove the target property from the body
    OmitBody,
    /// Add a property to the object at the target path
    AddBodyProperty { name: String, value: Value },
    /// Send this text as the body, bypassing serialization
    RawBody { text: String },
}

/// One planned request variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CasePlan {
    pub label: String,
    pub target: FieldPath,
    pub mutation: Mutation,
}

impl CasePlan {
    fn new(label: impl Into<String>, target: FieldPath, mutation: Mutation) -> Self {
        Self {
            label: label.into(),
            target,
            mutation,
        }
    }
}

/// Parameter with its materialized shape
#[derive(Debug, Clone)]
pub struct ParamShape {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub field: FieldPath,
    pub shape: Shape,
}

/// Request body with its materialized shape
#[derive(Debug, Clone)]
pub struct BodyShape {
    pub media_type: String,
    pub required: bool,
    pub shape: Shape,
}

/// Everything a strategy needs to know about one operation
#[derive(Debug, Clone)]
pub struct OperationShapes {
    pub params: Vec<ParamShape>,
    pub body: Option<BodyShape>,
}

/// Inputs to planning
#[derive(Debug, Clone, Copy)]
pub struct PlanContext<'a> {
    pub operation: &'a OperationEntry,
    pub shapes: &'a OperationShapes,
    pub values: ValueGenerator,
    pub config: &'a SynthesisConfig,
}

/// Generation policy
///
/// Implementations must be deterministic: the same context always yields
/// the same plans in the same order.
pub trait CaseStrategy: Send + Sync + fmt::Debug {
    /// Strategy tag carried by the requests this produces
    fn strategy(&self) -> SynthesisStrategy;

    /// Plan request variants for one operation
    fn plan(&self, ctx: &PlanContext<'_>) -> Vec<CasePlan>;
}

/// Strategy implementation for a tag
#[must_use]
pub fn strategy_for(strategy: SynthesisStrategy) -> &'static dyn CaseStrategy {
    static VALID: ValidCases = ValidCases;
    static BOUNDARY: BoundaryCases = BoundaryCases;
    static MALFORMED: MalformedCases = MalformedCases;
    match strategy {
        SynthesisStrategy::Valid => &VALID,
        SynthesisStrategy::Boundary => &BOUNDARY,
        SynthesisStrategy::Malformed => &MALFORMED,
    }
}

/// Body field visited during planning
struct BodyField<'s> {
    path: FieldPath,
    shape: &'s Shape,
    /// Required property of its parent object
    required: bool,
}

/// Every body field, depth first, root included; read-only and cut subtrees skipped
fn body_fields(shape: &Shape) -> Vec<BodyField<'_>> {
    fn walk<'s>(shape: &'s Shape, path: FieldPath, required: bool, out: &mut Vec<BodyField<'s>>) {
        if shape.is_truncated() {
            return;
        }
        out.push(BodyField {
            path: path.clone(),
            shape,
            required,
        });
        match &shape.kind {
            ShapeKind::Object {
                properties,
                required: required_set,
                ..
            } => {
                for (name, property) in properties {
                    if property.meta.read_only {
                        continue;
                    }
                    walk(property, path.child(name), required_set.contains(name), out);
                }
            }
            ShapeKind::Array { items: Some(items), .. } => walk(items, path.item(), false, out),
            _ => {}
        }
    }
    let mut out = Vec::new();
    walk(shape, FieldPath::body(), false, &mut out);
    out
}

fn baseline_target(ctx: &PlanContext<'_>) -> FieldPath {
    ctx.shapes
        .body
        .as_ref()
        .map_or_else(|| FieldPath::root(specops_model::FieldLocation::Path), |_| FieldPath::body())
}

/// One baseline request plus one per alternative `oneOf` / `anyOf` branch
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidCases;

impl CaseStrategy for ValidCases {
    fn strategy(&self) -> SynthesisStrategy {
        SynthesisStrategy::Valid
    }

    fn plan(&self, ctx: &PlanContext<'_>) -> Vec<CasePlan> {
        let include = ctx.config.include_optional;
        let mut plans = vec![CasePlan::new("valid baseline", baseline_target(ctx), Mutation::Baseline)];

        for param in &ctx.shapes.params {
            if let ShapeKind::Choice(branches) = &param.shape.kind {
                for (i, branch) in branches.iter().enumerate().skip(1) {
                    if let Some(value) = ctx.values.valid(branch, &param.field, include) {
                        plans.push(CasePlan::new(
                            format!("{} as branch {i}", param.field),
                            param.field.clone(),
                            Mutation::SetParam {
                                location: param.location,
                                name: param.name.clone(),
                                value,
                            },
                        ));
                    }
                }
            }
        }

        if let Some(body) = &ctx.shapes.body {
            for field in body_fields(&body.shape) {
                let ShapeKind::Choice(branches) = &field.shape.kind else {
                    continue;
                };
                for (i, branch) in branches.iter().enumerate().skip(1) {
                    if let Some(value) = ctx.values.valid(branch, &field.path, include) {
                        plans.push(CasePlan::new(
                            format!("{} as branch {i}", field.path),
                            field.path.clone(),
                            Mutation::SetBody { value },
                        ));
                    }
                }
            }
        }
        plans
    }
}

/// At-limit and one-past-limit values, enum members, required-field omission
#[derive(Debug, Clone, Copy, Default)]
pub struct BoundaryCases;

impl CaseStrategy for BoundaryCases {
    fn strategy(&self) -> SynthesisStrategy {
        SynthesisStrategy::Boundary
    }

    fn plan(&self, ctx: &PlanContext<'_>) -> Vec<CasePlan> {
        let mut plans = Vec::new();

        for param in &ctx.shapes.params {
            for (label, value) in boundary_values(&param.shape, &param.field, &ctx.values) {
                // An empty path segment routes elsewhere, so the variant never reaches this operation.
                if param.location == ParameterLocation::Path && value_text(&value).is_empty() {
                    continue;
                }
                plans.push(CasePlan::new(
                    label,
                    param.field.clone(),
                    Mutation::SetParam {
                        location: param.location,
                        name: param.name.clone(),
                        value,
                    },
                ));
            }
            // Dropping a path segment changes the route, not the parameter.
            if param.required && param.location != ParameterLocation::Path {
                plans.push(CasePlan::new(
                    format!("omit required {}", param.field),
                    param.field.clone(),
                    Mutation::OmitParam {
                        location: param.location,
                        name: param.name.clone(),
                    },
                ));
            }
        }

        if let Some(body) = &ctx.shapes.body {
            for field in body_fields(&body.shape) {
                for (label, value) in boundary_values(field.shape, &field.path, &ctx.values) {
                    plans.push(CasePlan::new(label, field.path.clone(), Mutation::SetBody { value }));
                }
                if field.required {
                    plans.push(CasePlan::new(
                        format!("omit required {}", field.path),
                        field.path.clone(),
                        Mutation::OmitBody,
                    ));
                }
            }
        }
        plans
    }
}

/// Boundary values for one field
fn boundary_values(shape: &Shape, field: &FieldPath, values: &ValueGenerator) -> Vec<(String, Value)> {
    let mut out = Vec::new();
    match &shape.kind {
        ShapeKind::Scalar {
            kind,
            format,
            constraints: c,
        } => {
            if !c.enumeration.is_empty() {
                for member in &c.enumeration {
                    out.push((format!("{field} = enum member {member}"), member.clone()));
                }
                out.push((format!("{field} = non-member"), non_member(*kind, &c.enumeration)));
            }
            match kind {
                PrimitiveKind::Integer => {
                    // Fractional bounds round inward for the at-limit case.
                    if let Some(min) = c.minimum {
                        let at = if c.exclusive_minimum { min.floor() + 1.0 } else { min.ceil() };
                        let past = at - 1.0;
                        out.push((format!("{field} = minimum ({at})"), Value::from(at as i64)));
                        out.push((format!("{field} below minimum ({past})"), Value::from(past as i64)));
                    }
                    if let Some(max) = c.maximum {
                        let at = if c.exclusive_maximum { max.ceil() - 1.0 } else { max.floor() };
                        let past = at + 1.0;
                        out.push((format!("{field} = maximum ({at})"), Value::from(at as i64)));
                        out.push((format!("{field} above maximum ({past})"), Value::from(past as i64)));
                    }
                }
                PrimitiveKind::Number => {
                    if let Some(min) = c.minimum {
                        let (at, past) = if c.exclusive_minimum { (min + 1.0, min) } else { (min, min - 1.0) };
                        out.push((format!("{field} = minimum ({at})"), Value::from(at)));
                        out.push((format!("{field} below minimum ({past})"), Value::from(past)));
                    }
                    if let Some(max) = c.maximum {
                        let (at, past) = if c.exclusive_maximum { (max - 1.0, max) } else { (max, max + 1.0) };
                        out.push((format!("{field} = maximum ({at})"), Value::from(at)));
                        out.push((format!("{field} above maximum ({past})"), Value::from(past)));
                    }
                }
                PrimitiveKind::String | PrimitiveKind::Any => {
                    let format = format.as_deref();
                    let at_limit = |limit: &str, n: u64| {
                        let (value, honored) = values.sized_string(format, c, field, n);
                        let label = match format {
                            Some(format) if !honored => {
                                format!("{field} length = {limit} ({n}), {format} format dropped")
                            }
                            _ => format!("{field} length = {limit} ({n})"),
                        };
                        (label, Value::String(value))
                    };
                    let past_limit = |n: u64| Value::String(values.sized_string(format, c, field, n).0);
                    if let Some(min) = c.min_length {
                        out.push(at_limit("minLength", min));
                        if min > 0 {
                            out.push((format!("{field} length below minLength ({})", min - 1), past_limit(min - 1)));
                        }
                    }
                    if let Some(max) = c.max_length {
                        out.push(at_limit("maxLength", max));
                        out.push((format!("{field} length above maxLength ({})", max + 1), past_limit(max + 1)));
                    }
                }
                PrimitiveKind::Boolean | PrimitiveKind::Null => {}
            }
        }
        ShapeKind::Array {
            items,
            min_items,
            max_items,
        } => {
            let item = items
                .as_deref()
                .and_then(|items| values.valid(items, &field.item(), false))
                .unwrap_or_else(|| Value::String(values.token(&field.item())));
            let array = |n: u64| Value::Array((0..n).map(|_| item.clone()).collect());
            if let Some(min) = *min_items {
                out.push((format!("{field} items = minItems ({min})"), array(min)));
                if min > 0 {
                    out.push((format!("{field} items below minItems ({})", min - 1), array(min - 1)));
                }
            }
            if let Some(max) = *max_items {
                out.push((format!("{field} items = maxItems ({max})"), array(max)));
                out.push((format!("{field} items above maxItems ({})", max + 1), array(max + 1)));
            }
        }
        ShapeKind::Object { .. } | ShapeKind::Choice(_) | ShapeKind::Truncated => {}
    }
    out
}

/// A value of the right type that is not an enum member
fn non_member(kind: PrimitiveKind, members: &[Value]) -> Value {
    match kind {
        PrimitiveKind::Integer | PrimitiveKind::Number => {
            let max = members.iter().filter_map(Value::as_f64).fold(0.0_f64, f64::max);
            if kind == PrimitiveKind::Integer {
                Value::from(max as i64 + 1)
            } else {
                Value::from(max + 1.0)
            }
        }
        PrimitiveKind::Boolean => {
            if members.contains(&Value::Bool(true)) && members.contains(&Value::Bool(false)) {
                Value::String("maybe".to_string())
            } else {
                Value::Bool(!members.contains(&Value::Bool(false)))
            }
        }
        PrimitiveKind::String | PrimitiveKind::Any | PrimitiveKind::Null => {
            let mut candidate = members
                .first()
                .and_then(Value::as_str)
                .map_or_else(|| "specops".to_string(), |s| format!("{s}-not-in-enum"));
            while members.contains(&Value::String(candidate.clone())) {
                candidate.push('x');
            }
            Value::String(candidate)
        }
    }
}

/// Type mismatches, oversized values, injection payloads, unexpected properties
/// and a truncated body, capped and sampled deterministically
#[derive(Debug, Clone, Copy, Default)]
pub struct MalformedCases;

impl CaseStrategy for MalformedCases {
    fn strategy(&self) -> SynthesisStrategy {
        SynthesisStrategy::Malformed
    }

    fn plan(&self, ctx: &PlanContext<'_>) -> Vec<CasePlan> {
        let mut plans = Vec::new();
        let oversized = "A".repeat(ctx.config.oversized_string_len);

        for param in &ctx.shapes.params {
            let set = |value: Value| Mutation::SetParam {
                location: param.location,
                name: param.name.clone(),
                value,
            };
            let is_text = matches!(
                param.shape.kind,
                ShapeKind::Scalar {
                    kind: PrimitiveKind::String | PrimitiveKind::Any,
                    ..
                }
            );
            if let Some((label, value)) = type_mismatch(&param.shape) {
                if !is_text {
                    plans.push(CasePlan::new(
                        format!("{} {label}", param.field),
                        param.field.clone(),
                        set(value),
                    ));
                }
            }
            if is_text || param.location == ParameterLocation::Path {
                for request in INJECTION_PAYLOADS {
                    plans.push(CasePlan::new(
                        format!("{} injection payload {request}", param.field),
                        param.field.clone(),
                        set(Value::String(request.to_string())),
                    ));
                }
            }
            if is_text {
                plans.push(CasePlan::new(
                    format!("{} oversized string ({})", param.field, oversized.len()),
                    param.field.clone(),
                    set(Value::String(oversized.clone())),
                ));
            }
        }

        if let Some(body) = &ctx.shapes.body {
            for field in body_fields(&body.shape) {
                if let Some((label, value)) = type_mismatch(field.shape) {
                    plans.push(CasePlan::new(
                        format!("{} {label}", field.path),
                        field.path.clone(),
                        Mutation::SetBody { value },
                    ));
                }
                match &field.shape.kind {
                    ShapeKind::Scalar {
                        kind: PrimitiveKind::String | PrimitiveKind::Any,
                        ..
                    } => {
                        for request in INJECTION_PAYLOADS {
                            plans.push(CasePlan::new(
                                format!("{} injection payload {request}", field.path),
                                field.path.clone(),
                                Mutation::SetBody {
                                    value: Value::String(request.to_string()),
                                },
                            ));
                        }
                        plans.push(CasePlan::new(
                            format!("{} oversized string ({})", field.path, oversized.len()),
                            field.path.clone(),
                            Mutation::SetBody {
                                value: Value::String(oversized.clone()),
                            },
                        ));
                    }
                    ShapeKind::Array { items, .. } => {
                        let item = items
                            .as_deref()
                            .and_then(|items| ctx.values.valid(items, &field.path.item(), false))
                            .unwrap_or_else(|| Value::String("x".to_string()));
                        let len = ctx.config.oversized_array_len;
                        plans.push(CasePlan::new(
                            format!("{} oversized array ({len})", field.path),
                            field.path.clone(),
                            Mutation::SetBody {
                                value: Value::Array(vec![item; len]),
                            },
                        ));
                    }
                    ShapeKind::Object {
                        additional: Additional::Forbidden,
                        ..
                    } => {
                        plans.push(CasePlan::new(
                            format!("{} unexpected property {EXTRA_PROPERTY}", field.path),
                            field.path.clone(),
                            Mutation::AddBodyProperty {
                                name: EXTRA_PROPERTY.to_string(),
                                value: Value::String("unexpected".to_string()),
                            },
                        ));
                    }
                    _ => {}
                }
            }

            if is_json_like(&body.media_type) {
                let text = ctx
                    .values
                    .valid(&body.shape, &FieldPath::body(), ctx.config.include_optional)
                    .unwrap_or_else(|| Value::Object(serde_json::Map::new()))
                    .to_string();
                let keep = (text.chars().count() / 2).max(1);
                plans.push(CasePlan::new(
                    "body truncated JSON",
                    FieldPath::body(),
                    Mutation::RawBody {
                        text: text.chars().take(keep).collect(),
                    },
                ));
            }
        }

        cap_plans(plans, ctx)
    }
}

/// Value of a different JSON type than the shape expects
fn type_mismatch(shape: &Shape) -> Option<(String, Value)> {
    let (label, value) = match &shape.kind {
        ShapeKind::Scalar { kind, .. } => match kind {
            PrimitiveKind::Integer | PrimitiveKind::Number | PrimitiveKind::Boolean => (
                format!("string where {} expected", kind.as_str()),
                Value::String("specops".to_string()),
            ),
            PrimitiveKind::String => ("number where string expected".to_string(), Value::from(12345)),
            PrimitiveKind::Null | PrimitiveKind::Any => return None,
        },
        ShapeKind::Object { .. } => (
            "scalar where object expected".to_string(),
            Value::String("specops".to_string()),
        ),
        ShapeKind::Array { .. } => (
            "scalar where array expected".to_string(),
            Value::String("specops".to_string()),
        ),
        ShapeKind::Choice(_) | ShapeKind::Truncated => return None,
    };
    Some((label, value))
}

/// Keep at most `malformed_cap` plans, chosen by a seeded sample, in original order
fn cap_plans(plans: Vec<CasePlan>, ctx: &PlanContext<'_>) -> Vec<CasePlan> {
    let cap = ctx.config.malformed_cap;
    if plans.len() <= cap {
        return plans;
    }
    let seed = ctx
        .values
        .seed_u64(&FieldPath::body(), &format!("cap:{}", ctx.operation.operation_id));
    let mut rng = StdRng::seed_from_u64(seed);
    let mut keep = rand::seq::index::sample(&mut rng, plans.len(), cap).into_vec();
    keep.sort_unstable();
    tracing::debug!(
        "Capped {} malformed cases to {} for {}",
        plans.len(),
        cap,
        ctx.operation.operation_id
    );
    let mut keep = keep.into_iter().peekable();
    plans
        .into_iter()
        .enumerate()
        .filter_map(|(i, plan)| {
            if keep.peek() == Some(&i) {
                keep.next();
                Some(plan)
            } else {
                None
            }
        })
        .collect()
}

/// JSON or a `+json` structured suffix
#[must_use]
pub fn is_json_like(media_type: &str) -> bool {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json") || essence.ends_with("/json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use specops_model::{Constraints, SchemaMeta};

    fn scalar(kind: PrimitiveKind, constraints: Constraints) -> Shape {
        Shape {
            meta: SchemaMeta::default(),
            kind: ShapeKind::Scalar {
                kind,
                format: None,
                constraints,
            },
        }
    }

    #[test]
    fn integer_boundaries() {
        let shape = scalar(
            PrimitiveKind::Integer,
            Constraints {
                minimum: Some(1.0),
                maximum: Some(100.0),
                ..Constraints::default()
            },
        );
        let values: Vec<Value> = boundary_values(&shape, &FieldPath::body(), &ValueGenerator::new(0))
            .into_iter()
            .map(|(_, v)| v)
            .collect();
        assert_eq!(values, vec![Value::from(1), Value::from(0), Value::from(100), Value::from(101)]);
    }

    #[test]
    fn exclusive_bounds_shift_inward() {
        let shape = scalar(
            PrimitiveKind::Integer,
            Constraints {
                minimum: Some(0.0),
                exclusive_minimum: true,
                ..Constraints::default()
            },
        );
        let values: Vec<Value> = boundary_values(&shape, &FieldPath::body(), &ValueGenerator::new(0))
            .into_iter()
            .map(|(_, v)| v)
            .collect();
        assert_eq!(values, vec![Value::from(1), Value::from(0)]);
    }

    #[test]
    fn string_length_boundaries() {
        let shape = scalar(
            PrimitiveKind::String,
            Constraints {
                min_length: Some(2),
                max_length: Some(4),
                ..Constraints::default()
            },
        );
        let lengths: Vec<usize> = boundary_values(&shape, &FieldPath::body().child("code"), &ValueGenerator::new(0))
            .into_iter()
            .map(|(_, v)| v.as_str().unwrap().chars().count())
            .collect();
        assert_eq!(lengths, vec![2, 1, 4, 5]);
    }

    #[test]
    fn fractional_integer_minimum_rounds_up() {
        let shape = scalar(
            PrimitiveKind::Integer,
            Constraints {
                minimum: Some(1.5),
                ..Constraints::default()
            },
        );
        let values: Vec<Value> = boundary_values(&shape, &FieldPath::body(), &ValueGenerator::new(0))
            .into_iter()
            .map(|(_, v)| v)
            .collect();
        assert_eq!(values, vec![Value::from(2), Value::from(1)]);
    }

    fn formatted(format: &str, constraints: Constraints) -> Shape {
        Shape {
            meta: SchemaMeta::default(),
            kind: ShapeKind::Scalar {
                kind: PrimitiveKind::String,
                format: Some(format.to_string()),
                constraints,
            },
        }
    }

    #[test]
    fn formatted_string_keeps_format_at_length_limit() {
        let shape = formatted(
            "email",
            Constraints {
                min_length: Some(20),
                max_length: Some(40),
                ..Constraints::default()
            },
        );
        let cases = boundary_values(&shape, &FieldPath::body().child("email"), &ValueGenerator::new(3));
        let (label, value) = &cases[0];
        let value = value.as_str().unwrap();
        assert_eq!(label, "body.email length = minLength (20)");
        assert_eq!(value.chars().count(), 20);
        let (local, domain) = value.split_once('@').unwrap();
        assert!(!local.is_empty());
        assert!(domain.contains('.'));

        let (_, value) = &cases[2];
        assert_eq!(value.as_str().unwrap().chars().count(), 40);
        assert!(value.as_str().unwrap().contains('@'));
    }

    #[test]
    fn unreachable_format_length_is_labelled() {
        let shape = formatted(
            "uuid",
            Constraints {
                max_length: Some(10),
                ..Constraints::default()
            },
        );
        let cases = boundary_values(&shape, &FieldPath::body().child("id"), &ValueGenerator::new(0));
        let (label, value) = &cases[0];
        assert_eq!(label, "body.id length = maxLength (10), uuid format dropped");
        assert_eq!(value.as_str().unwrap().chars().count(), 10);
    }

    #[test]
    fn enum_members_plus_outsider() {
        let shape = scalar(
            PrimitiveKind::String,
            Constraints {
                enumeration: vec!["asc".into(), "desc".into()],
                ..Constraints::default()
            },
        );
        let values: Vec<Value> = boundary_values(&shape, &FieldPath::body(), &ValueGenerator::new(0))
            .into_iter()
            .map(|(_, v)| v)
            .collect();
        assert_eq!(values.len(), 3);
        assert_eq!(values[2], Value::from("asc-not-in-enum"));
    }

    #[test]
    fn json_like_media_types() {
        assert!(is_json_like("application/json; charset=utf-8"));
        assert!(is_json_like("application/problem+json"));
        assert!(!is_json_like("application/x-www-form-urlencoded"));
    }
}
