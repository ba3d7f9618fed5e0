//! Version marker detection

use serde_json::Value;
use specops_model::{SourceVersion, SpecError, SpecResult};

/// Detect the document dialect from its `openapi` / `swagger` marker
///
/// # Errors
/// - [`SpecError::Malformed`] if the root is not an object
/// - [`SpecError::UnsupportedVersion`] for missing or unknown markers
pub fn detect_version(document: &Value) -> SpecResult<SourceVersion> {
    let root = document
        .as_object()
        .ok_or_else(|| SpecError::malformed("document root is not an object"))?;

    if let Some(marker) = root.get("openapi") {
        let version = marker_text(marker);
        return if version.starts_with("3.0") {
            Ok(SourceVersion::OpenApi30)
        } else if version.starts_with("3.1") {
            Ok(SourceVersion::OpenApi31)
        } else {
            Err(SpecError::UnsupportedVersion(format!("openapi {version}")))
        };
    }

    if let Some(marker) = root.get("swagger") {
        let version = marker_text(marker);
        return if version == "2.0" || version == "2" {
            Ok(SourceVersion::Swagger2)
        } else {
            Err(SpecError::UnsupportedVersion(format!("swagger {version}")))
        };
    }

    Err(SpecError::UnsupportedVersion(
        "no openapi or swagger version marker".to_string(),
    ))
}

fn marker_text(marker: &Value) -> String {
    match marker {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_supported_versions() {
        assert_eq!(detect_version(&json!({"openapi": "3.0.3"})), Ok(SourceVersion::OpenApi30));
        assert_eq!(detect_version(&json!({"openapi": "3.1.0"})), Ok(SourceVersion::OpenApi31));
        assert_eq!(detect_version(&json!({"openapi": 3.1})), Ok(SourceVersion::OpenApi31));
        assert_eq!(detect_version(&json!({"swagger": "2.0"})), Ok(SourceVersion::Swagger2));
    }

    #[test]
    fn rejects_unknown_versions() {
        assert!(matches!(
            detect_version(&json!({"openapi": "4.0.0"})),
            Err(SpecError::UnsupportedVersion(_))
        ));
        assert!(matches!(
            detect_version(&json!({"swagger": "1.2"})),
            Err(SpecError::UnsupportedVersion(_))
        ));
        assert!(matches!(
            detect_version(&json!({"info": {}})),
            Err(SpecError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn non_object_root_is_malformed() {
        assert!(matches!(detect_version(&json!([1, 2])), Err(SpecError::Malformed(_))));
    }
}
