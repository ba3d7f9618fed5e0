//! Global parameter store
//!
//! Values keyed by [`FieldPath`] that synthesized requests use ahead of
//! schema-generated ones: `query.limit`, `header.x-api-key`,
//! `body.customer.id`. Entries are set by the user or harvested from
//! passive traffic. Harvesting only fills keys that are still empty, so it
//! never replaces a user value or a locked entry.
//!
//! Header names are case-insensitive and stored lowercased; query and
//! cookie names are kept as written.

use dashmap::DashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use specops_model::{FieldLocation, FieldPath, ObservedRequest, OperationEntry, ParameterLocation};

/// Where a stored value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    User,
    Harvested,
}

/// One stored value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredValue {
    pub value: String,
    pub source: ValueSource,
    /// Locked values are never replaced by harvesting
    pub locked: bool,
}

/// Shared parameter values, safe to update from many threads
#[derive(Debug, Default)]
pub struct ParameterStore {
    entries: DashMap<FieldPath, StoredValue>,
}

fn canonical(field: &FieldPath) -> FieldPath {
    match (field.location(), field.segments()) {
        (FieldLocation::Header, [name]) => {
            FieldPath::parameter(ParameterLocation::Header, name.to_ascii_lowercase())
        }
        _ => field.clone(),
    }
}

impl ParameterStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a user value, replacing whatever was stored
    pub fn set(&self, field: &FieldPath, value: impl Into<String>) {
        let value = value.into();
        tracing::debug!("Stored {} = {}", field, value);
        self.entries.insert(
            canonical(field),
            StoredValue {
                value,
                source: ValueSource::User,
                locked: false,
            },
        );
    }

    /// Set a user value for a parameter
    pub fn set_param(&self, location: ParameterLocation, name: &str, value: impl Into<String>) {
        self.set(&FieldPath::parameter(location, name), value);
    }

    /// Lock or unlock an entry; `false` when nothing is stored there
    pub fn set_locked(&self, field: &FieldPath, locked: bool) -> bool {
        self.entries
            .get_mut(&canonical(field))
            .map(|mut entry| entry.locked = locked)
            .is_some()
    }

    /// Drop an entry
    pub fn remove(&self, field: &FieldPath) -> Option<StoredValue> {
        self.entries.remove(&canonical(field)).map(|(_, value)| value)
    }

    /// Stored entry at a field
    #[must_use]
    pub fn get_path(&self, field: &FieldPath) -> Option<StoredValue> {
        self.entries.get(&canonical(field)).map(|entry| entry.value().clone())
    }

    /// Non-empty stored text for a parameter
    #[must_use]
    pub fn get(&self, location: ParameterLocation, name: &str) -> Option<String> {
        self.get_path(&FieldPath::parameter(location, name))
            .map(|stored| stored.value)
            .filter(|value| !value.is_empty())
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every entry, sorted by field
    #[must_use]
    pub fn entries(&self) -> Vec<(FieldPath, StoredValue)> {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Fill empty query, header and cookie entries from a passive request
    /// matched to `operation`
    ///
    /// Parameters `rejected` flags (e.g. ones that failed validation) are
    /// skipped. Synthesized requests are ignored. Returns the number of
    /// values stored.
    pub fn harvest(
        &self,
        operation: &OperationEntry,
        request: &ObservedRequest,
        rejected: impl Fn(ParameterLocation, &str) -> bool,
    ) -> usize {
        if request.origin.is_synthesized() {
            return 0;
        }
        let cookies: IndexMap<String, String> = request.cookies().into_iter().collect();
        let mut stored = 0;
        for param in &operation.parameters {
            let observed = match param.location {
                ParameterLocation::Query => request.query_value(&param.name),
                ParameterLocation::Header => request.header(&param.name),
                ParameterLocation::Cookie => cookies.get(&param.name).map(String::as_str),
                ParameterLocation::Path => None,
            };
            let Some(value) = observed.filter(|v| !v.is_empty()) else {
                continue;
            };
            if rejected(param.location, &param.name) {
                continue;
            }
            let key = canonical(&FieldPath::parameter(param.location, &param.name));
            let mut slot = self.entries.entry(key).or_insert_with(|| StoredValue {
                value: String::new(),
                source: ValueSource::Harvested,
                locked: false,
            });
            if slot.value.is_empty() && !slot.locked {
                slot.value = value.to_string();
                slot.source = ValueSource::Harvested;
                stored += 1;
            }
        }
        if stored > 0 {
            tracing::debug!("Harvested {} values from {}", stored, operation.label());
        }
        stored
    }

    /// Body values to force into every request body, as JSON
    ///
    /// Text that parses as JSON is used as such, anything else as a string.
    /// Empty values are skipped.
    #[must_use]
    pub fn body_overrides(&self) -> Vec<(FieldPath, Value)> {
        self.entries()
            .into_iter()
            .filter(|(field, stored)| field.location() == FieldLocation::Body && !stored.value.is_empty())
            .map(|(field, stored)| {
                let value = serde_json::from_str(&stored.value).unwrap_or(Value::String(stored.value));
                (field, value)
            })
            .collect()
    }

    /// Replace `${param.<key>}` placeholders with stored values
    ///
    /// `<key>` is a field path such as `header.x-token`, or a bare name
    /// looked up across query, header, cookie and path entries in that
    /// order. Unknown keys are left in place.
    #[must_use]
    pub fn interpolate(&self, template: &str) -> String {
        const OPEN: &str = "${param.";
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find(OPEN) {
            let after = &rest[start + OPEN.len()..];
            let Some(end) = after.find('}') else {
                break;
            };
            out.push_str(&rest[..start]);
            match self.lookup(&after[..end]) {
                Some(value) => out.push_str(&value),
                None => out.push_str(&rest[start..start + OPEN.len() + end + 1]),
            }
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        out
    }

    fn lookup(&self, key: &str) -> Option<String> {
        if let Ok(field) = key.parse::<FieldPath>() {
            if let Some(stored) = self.get_path(&field).filter(|s| !s.value.is_empty()) {
                return Some(stored.value);
            }
        }
        [
            ParameterLocation::Query,
            ParameterLocation::Header,
            ParameterLocation::Cookie,
            ParameterLocation::Path,
        ]
        .into_iter()
        .find_map(|location| self.get(location, key))
    }
}
