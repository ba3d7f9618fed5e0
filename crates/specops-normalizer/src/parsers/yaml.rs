//! YAML document parser
//!
//! Uses serde_yaml and converts the result into a JSON value tree. Non-string
//! mapping keys (YAML reads `200:` as an integer) are stringified, which is
//! what OpenAPI response maps expect.

use super::{DocumentParser, FormatHint};
use serde::Deserialize;
use serde_json::{Map, Number, Value};
use specops_model::{SpecError, SpecResult};

/// YAML parser
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlParser;

impl DocumentParser for YamlParser {
    fn parse(&self, content: &str) -> SpecResult<Value> {
        let mut documents = serde_yaml::Deserializer::from_str(content);
        let first = documents
            .next()
            .ok_or_else(|| SpecError::malformed("empty YAML document"))?;
        let value = serde_yaml::Value::deserialize(first)
            .map_err(|e| SpecError::malformed(format!("invalid YAML: {e}")))?;
        if documents.next().is_some() {
            tracing::warn!("YAML stream holds several documents; only the first is used");
        }
        match yaml_to_json(value)? {
            root @ Value::Object(_) => Ok(root),
            _ => Err(SpecError::malformed("document root is not a mapping")),
        }
    }

    fn format(&self) -> FormatHint {
        FormatHint::Yaml
    }

    fn sniff(&self, _content: &str) -> bool {
        true
    }
}

fn yaml_to_json(value: serde_yaml::Value) -> SpecResult<Value> {
    Ok(match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(Number::from_f64)
                    .map_or_else(|| Value::String(n.to_string()), Value::Number)
            }
        }
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<SpecResult<_>>()?,
        ),
        serde_yaml::Value::Mapping(mapping) => {
            let mut map = Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                map.insert(mapping_key(key)?, yaml_to_json(value)?);
            }
            Value::Object(map)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

fn mapping_key(key: serde_yaml::Value) -> SpecResult<String> {
    match key {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Null => Ok("null".to_string()),
        serde_yaml::Value::Tagged(tagged) => mapping_key(tagged.value),
        other => Err(SpecError::malformed(format!(
            "unsupported YAML mapping key: {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integer_keys_become_strings() {
        let value = YamlParser
            .parse("responses:\n  200:\n    description: ok\n  '404':\n    description: missing\n")
            .unwrap();
        assert_eq!(
            value,
            json!({"responses": {"200": {"description": "ok"}, "404": {"description": "missing"}}})
        );
    }

    #[test]
    fn preserves_declaration_order() {
        let value = YamlParser.parse("b: 1\na: 2\nc: 3\n").unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn anchors_are_expanded() {
        let value = YamlParser
            .parse("base: &b {type: string}\nother: *b\n")
            .unwrap();
        assert_eq!(value["other"], json!({"type": "string"}));
    }

    #[test]
    fn syntax_error_is_malformed() {
        let err = YamlParser.parse("a: [1, 2\n").unwrap_err();
        assert!(matches!(err, SpecError::Malformed(_)));
    }

    #[test]
    fn empty_input_is_malformed() {
        assert!(YamlParser.parse("").is_err());
    }
}
