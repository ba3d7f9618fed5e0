//! Deterministic value generation
//!
//! Every generated value is a pure function of the configured seed, the
//! field path it lands in and a salt, so two runs with the same seed render
//! byte-identical requests.
//!
//! Precedence for a valid value: `example`, then `default`, then the first
//! `enum` member, then a generated value. Generated strings try, in order:
//! the declared `pattern`, the declared `format`, hints from the field name,
//! and finally a short alphanumeric token, then get padded or cut to the
//! declared length bounds.

use crate::shape::{Additional, Shape, ShapeKind};
use proptest::strategy::{Strategy, ValueTree};
use proptest::test_runner::{Config, RngAlgorithm, TestRng, TestRunner};
use rand::distr::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value};
use specops_model::{Constraints, FieldPath, PrimitiveKind};

/// Attempts at drawing a pattern match that also fits the length bounds
const PATTERN_ATTEMPTS: usize = 16;

/// Upper bound on elements generated to satisfy `minItems`
const MAX_GENERATED_ITEMS: u64 = 64;

/// Length of fallback tokens
const TOKEN_LEN: usize = 12;

/// Seeded generator of valid values
#[derive(Debug, Clone, Copy)]
pub struct ValueGenerator {
    seed: u64,
}

impl ValueGenerator {
    /// Create generator
    #[inline]
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// 32 seed bytes for one field and purpose
    #[must_use]
    pub fn seed_bytes(&self, field: &FieldPath, salt: &str) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(field.to_string().as_bytes());
        hasher.update(salt.as_bytes());
        *hasher.finalize().as_bytes()
    }

    /// Integer seed for one field and purpose
    #[must_use]
    pub fn seed_u64(&self, field: &FieldPath, salt: &str) -> u64 {
        let bytes = self.seed_bytes(field, salt);
        let mut head = [0u8; 8];
        head.copy_from_slice(&bytes[..8]);
        u64::from_le_bytes(head)
    }

    /// Valid value for a shape; `None` for subtrees cut by the depth limit
    #[must_use]
    pub fn valid(&self, shape: &Shape, field: &FieldPath, include_optional: bool) -> Option<Value> {
        if shape.is_truncated() {
            return None;
        }
        if let Some(preset) = shape.meta.example.as_ref().or(shape.meta.default.as_ref()) {
            return Some(preset.clone());
        }

        match &shape.kind {
            ShapeKind::Scalar {
                kind,
                format,
                constraints,
            } => Some(self.scalar(*kind, format.as_deref(), constraints, field)),
            ShapeKind::Object {
                properties,
                required,
                additional,
            } => {
                let mut object = Map::new();
                for (name, property) in properties {
                    if property.meta.read_only {
                        continue;
                    }
                    if !include_optional && !required.contains(name) {
                        continue;
                    }
                    if let Some(value) = self.valid(property, &field.child(name), include_optional) {
                        object.insert(name.clone(), value);
                    }
                }
                if properties.is_empty() {
                    if let Additional::Schema(extra) = additional {
                        if let Some(value) = self.valid(extra, &field.child("key"), include_optional) {
                            object.insert("key".to_string(), value);
                        }
                    }
                }
                Some(Value::Object(object))
            }
            ShapeKind::Array {
                items, min_items, ..
            } => {
                let count = min_items.unwrap_or(1).clamp(1, MAX_GENERATED_ITEMS);
                let item = match items {
                    Some(items) => self.valid(items, &field.item(), include_optional),
                    None => Some(Value::String(self.token(&field.item()))),
                };
                // A cut item schema leaves the array empty rather than invalid.
                Some(Value::Array(
                    item.map(|item| (0..count).map(|_| item.clone()).collect())
                        .unwrap_or_default(),
                ))
            }
            ShapeKind::Choice(branches) => branches
                .iter()
                .find_map(|branch| self.valid(branch, field, include_optional)),
            ShapeKind::Truncated => None,
        }
    }

    /// Valid scalar value
    #[must_use]
    pub fn scalar(
        &self,
        kind: PrimitiveKind,
        format: Option<&str>,
        constraints: &Constraints,
        field: &FieldPath,
    ) -> Value {
        if let Some(first) = constraints.enumeration.first() {
            return first.clone();
        }
        match kind {
            // Shapes reject empty ranges up front; `Null` is only reachable for raw constraints.
            PrimitiveKind::Integer => integer_value(constraints).map_or(Value::Null, Value::from),
            PrimitiveKind::Number => number_value(constraints).map_or(Value::Null, Value::from),
            PrimitiveKind::Boolean => Value::Bool(false),
            PrimitiveKind::Null => Value::Null,
            PrimitiveKind::String | PrimitiveKind::Any => {
                Value::String(self.string(format, constraints, field))
            }
        }
    }

    /// Valid string honoring pattern, format, name hints and length bounds
    #[must_use]
    pub fn string(&self, format: Option<&str>, constraints: &Constraints, field: &FieldPath) -> String {
        if let Some(pattern) = &constraints.pattern {
            let seed = self.seed_bytes(field, "pattern");
            match pattern_string(pattern, constraints, &seed) {
                Some(value) => return value,
                None => tracing::warn!(
                    "No string matching '{}' fits the bounds of {}, ignoring pattern",
                    pattern,
                    field
                ),
            }
        }
        let seed = self.seed_u64(field, "string");
        let bytes = self.seed_bytes(field, "string");
        let name = field.last_name().unwrap_or_default().to_ascii_lowercase();
        let candidate = format
            .and_then(|f| by_format(f, seed, &bytes))
            .or_else(|| by_name(&name, seed, &bytes))
            .unwrap_or_else(|| self.token(field));
        fit_length(candidate, constraints.min_length, constraints.max_length)
    }

    /// Seeded alphanumeric token
    #[must_use]
    pub fn token(&self, field: &FieldPath) -> String {
        StdRng::seed_from_u64(self.seed_u64(field, "token"))
            .sample_iter(Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect()
    }

    /// String of exactly `len` characters, honoring pattern and format when
    /// some value of that length can
    ///
    /// The flag is `false` when the declared pattern or format had to be
    /// given up to reach the length.
    #[must_use]
    pub fn sized_string(
        &self,
        format: Option<&str>,
        constraints: &Constraints,
        field: &FieldPath,
        len: u64,
    ) -> (String, bool) {
        if let Some(pattern) = &constraints.pattern {
            let exact = Constraints {
                min_length: Some(len),
                max_length: Some(len),
                ..Constraints::default()
            };
            let seed = self.seed_bytes(field, "pattern");
            return match pattern_string(pattern, &exact, &seed) {
                Some(value) => (value, true),
                None => (fit_length(self.token(field), Some(len), Some(len)), false),
            };
        }
        let padded = fit_length(self.token(field), Some(len), Some(len));
        match format {
            Some(format) if is_textual_format(format) => (padded, true),
            Some(format) => match format_of_length(format, len) {
                Some(value) => (value, true),
                None => (padded, false),
            },
            None => (padded, true),
        }
    }
}

/// Formats any text satisfies
fn is_textual_format(format: &str) -> bool {
    matches!(format, "password" | "binary")
}

/// A value of `format` that is exactly `len` characters long, if one exists
#[must_use]
pub fn format_of_length(format: &str, len: u64) -> Option<String> {
    let len = usize::try_from(len).ok()?;
    let pad = |n: usize| "x".repeat(n);
    match format {
        "email" | "idn-email" => ["@example.test", "@e.co"]
            .into_iter()
            .find(|domain| len > domain.len())
            .map(|domain| format!("u{}{domain}", pad(len - domain.len() - 1))),
        "uuid" => (len == 36).then(|| "00000000-0000-4000-8000-000000000000".to_string()),
        "date" => (len == 10).then(|| "2024-01-01".to_string()),
        "date-time" => match len {
            20 => Some("2024-01-01T12:00:00Z".to_string()),
            n if n >= 22 => Some(format!("2024-01-01T12:00:00.{}Z", "0".repeat(n - 21))),
            _ => None,
        },
        "time" => (len == 8).then(|| "12:00:00".to_string()),
        "uri" | "url" | "uri-reference" | "iri" => {
            const BASE: &str = "https://e.co/";
            (len >= BASE.len()).then(|| format!("{BASE}{}", pad(len - BASE.len())))
        }
        "hostname" | "idn-hostname" => (1..=63).contains(&len).then(|| "a".repeat(len)),
        "ipv4" => {
            // Octets of one to three digits: "1", "10", "100".
            let digits = len.checked_sub(3).filter(|d| (4..=12).contains(d))?;
            let octets: Vec<String> = (0..4)
                .map(|i| {
                    let width = digits / 4 + usize::from(i < digits % 4);
                    format!("1{}", "0".repeat(width - 1))
                })
                .collect();
            Some(octets.join("."))
        }
        "byte" => (len % 4 == 0).then(|| "A".repeat(len)),
        _ => None,
    }
}

/// Integer bounds after applying exclusivity
fn integer_bounds(c: &Constraints) -> (Option<f64>, Option<f64>) {
    let low = c
        .minimum
        .map(|m| if c.exclusive_minimum { m.floor() + 1.0 } else { m.ceil() });
    let high = c
        .maximum
        .map(|m| if c.exclusive_maximum { m.ceil() - 1.0 } else { m.floor() });
    (low, high)
}

/// Smallest admissible integer near 1; `None` when the bounds and
/// `multipleOf` admit no integer at all
#[must_use]
pub fn integer_value(c: &Constraints) -> Option<i64> {
    let (low, high) = integer_bounds(c);
    let start = match (low, high) {
        (Some(low), _) => low,
        (None, Some(high)) if high < 1.0 => high,
        _ => 1.0,
    };
    let step = c
        .multiple_of
        .filter(|s| *s >= 1.0 && s.fract() == 0.0)
        .unwrap_or(1.0);
    let mut value = (start / step).ceil() * step;
    if low.is_none() && high.is_some_and(|h| value > h) {
        value = (start / step).floor() * step;
    }
    let fits = low.map_or(true, |l| value >= l) && high.map_or(true, |h| value <= h);
    fits.then_some(value as i64)
}

/// Relative tolerance for float multiple checks
const MULTIPLE_EPSILON: f64 = 1e-9;

/// Whether `value` is a whole multiple of `step`, within float tolerance
#[must_use]
pub fn is_multiple(value: f64, step: f64) -> bool {
    if step <= 0.0 {
        return false;
    }
    let ratio = value / step;
    (ratio - ratio.round()).abs() <= MULTIPLE_EPSILON * ratio.abs().max(1.0)
}

/// Smallest admissible number near 1; `None` when no multiple of
/// `multipleOf` lies within the bounds
#[must_use]
pub fn number_value(c: &Constraints) -> Option<f64> {
    let above_min = |v: f64| {
        c.minimum
            .map_or(true, |min| if c.exclusive_minimum { v > min } else { v >= min })
    };
    let below_max = |v: f64| {
        c.maximum
            .map_or(true, |max| if c.exclusive_maximum { v < max } else { v <= max })
    };

    let Some(step) = c.multiple_of.filter(|s| *s > 0.0) else {
        let value = match (c.minimum, c.maximum) {
            (Some(min), Some(max)) if c.exclusive_minimum => (min + max) / 2.0,
            (Some(min), None) if c.exclusive_minimum => min + 1.0,
            (Some(min), _) => min,
            (None, Some(max)) if c.exclusive_maximum => {
                if max > 1.0 {
                    1.0
                } else {
                    max - 1.0
                }
            }
            (None, Some(max)) => max.min(1.0),
            (None, None) => 1.0,
        };
        return Some(value);
    };

    let value = match (c.minimum, c.maximum) {
        (Some(min), _) => {
            let mut value = (min / step).ceil() * step;
            if !above_min(value) {
                value += step;
            }
            value
        }
        (None, Some(max)) => {
            let mut value = ((1.0_f64).min(max) / step).floor() * step;
            if !below_max(value) {
                value -= step;
            }
            value
        }
        (None, None) => step,
    };
    (above_min(value) && below_max(value)).then_some(value)
}

/// Pad with `x` or cut to the declared length bounds
#[must_use]
pub fn fit_length(value: String, min: Option<u64>, max: Option<u64>) -> String {
    let count = value.chars().count() as u64;
    if let Some(min) = min.filter(|m| count < *m) {
        let mut value = value;
        value.extend(std::iter::repeat('x').take((min - count) as usize));
        return value;
    }
    match max.filter(|m| count > *m) {
        Some(max) => value.chars().take(max as usize).collect(),
        None => value,
    }
}

fn pattern_string(pattern: &str, c: &Constraints, seed: &[u8; 32]) -> Option<String> {
    // Full matches also satisfy unanchored search; anchors only trip the generator.
    let pattern = pattern.strip_prefix('^').unwrap_or(pattern);
    let pattern = match pattern.strip_suffix('$') {
        Some(rest) if !rest.ends_with('\\') => rest,
        _ => pattern,
    };
    let strategy = proptest::string::string_regex(pattern).ok()?;
    let rng = TestRng::from_seed(RngAlgorithm::ChaCha, seed);
    let mut runner = TestRunner::new_with_rng(Config::default(), rng);
    for _ in 0..PATTERN_ATTEMPTS {
        let value = strategy.new_tree(&mut runner).ok()?.current();
        let count = value.chars().count() as u64;
        let fits = c.min_length.map_or(true, |m| count >= m) && c.max_length.map_or(true, |m| count <= m);
        if fits {
            return Some(value);
        }
    }
    None
}

fn by_format(format: &str, seed: u64, bytes: &[u8; 32]) -> Option<String> {
    let value = match format {
        "date" => format!("2024-01-{:02}", 1 + seed % 28),
        "date-time" => format!("2024-01-{:02}T12:00:00Z", 1 + seed % 28),
        "time" => "12:00:00".to_string(),
        "email" | "idn-email" => format!("user{}@example.test", seed % 10_000),
        "uuid" => uuid_of(bytes),
        "uri" | "url" | "uri-reference" | "iri" => format!("https://example.test/api/{}", seed % 1_000),
        "hostname" | "idn-hostname" => "api.example.test".to_string(),
        "ipv4" => format!("192.0.2.{}", 1 + seed % 254),
        "ipv6" => "2001:db8::1".to_string(),
        // base64("specops")
        "byte" => "c3BlY29wcw==".to_string(),
        "binary" => "specops".to_string(),
        "password" => format!("Sp3c-{}", hex::encode(&bytes[..4])),
        _ => return None,
    };
    Some(value)
}

fn by_name(name: &str, seed: u64, bytes: &[u8; 32]) -> Option<String> {
    let value = if name.contains("email") {
        format!("user{}@example.test", seed % 10_000)
    } else if name.contains("phone") || name.contains("mobile") {
        format!("+1555{:07}", seed % 10_000_000)
    } else if name.contains("uuid") || name.contains("guid") {
        uuid_of(bytes)
    } else if name == "id" || name.ends_with("_id") || name.ends_with("id") {
        (1 + seed % 9_999).to_string()
    } else if name.contains("url") || name.contains("uri") {
        format!("https://example.test/api/{}", seed % 1_000)
    } else if name.contains("token") || name.contains("key") || name.contains("secret") {
        hex::encode(&bytes[..16])
    } else if name.contains("date") {
        format!("2024-01-{:02}", 1 + seed % 28)
    } else if name.contains("time") {
        format!("2024-01-{:02}T12:00:00Z", 1 + seed % 28)
    } else if name.contains("ip") && !name.contains("zip") {
        format!("192.0.2.{}", 1 + seed % 254)
    } else if name.contains("name") {
        const NAMES: [&str; 4] = ["alpha", "bravo", "charlie", "delta"];
        NAMES[(seed % 4) as usize].to_string()
    } else {
        return None;
    };
    Some(value)
}

fn uuid_of(bytes: &[u8; 32]) -> String {
    let mut head = [0u8; 16];
    head.copy_from_slice(&bytes[..16]);
    uuid::Builder::from_random_bytes(head).into_uuid().to_string()
}
