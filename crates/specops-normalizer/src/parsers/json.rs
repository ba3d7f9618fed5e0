//! JSON document parser

use super::{DocumentParser, FormatHint};
use serde_json::Value;
use specops_model::{SpecError, SpecResult};

/// JSON parser
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl DocumentParser for JsonParser {
    fn parse(&self, content: &str) -> SpecResult<Value> {
        serde_json::from_str(content)
            .map_err(|e| SpecError::malformed(format!("invalid JSON: {e}")))
    }

    fn format(&self) -> FormatHint {
        FormatHint::Json
    }

    fn sniff(&self, content: &str) -> bool {
        content.trim_start_matches('\u{feff}').trim_start().starts_with('{')
    }

    fn priority(&self) -> i32 {
        10
    }
}
