//! Rendering aggregate documents to JSON and YAML.

use serde_json::Value;

use crate::error::Result;

/// Comment line prefixed to generated YAML output.
pub const GENERATED_COMMENT: &str = "# OpenAPI spec generated by vervet, DO NOT EDIT\n";

/// Renders a document as pretty-printed JSON.
pub fn to_spec_json(value: &Value) -> Result<String> {
    let mut out = serde_json::to_string_pretty(value)?;
    out.push('\n');
    Ok(out)
}

/// Renders a document as YAML, prefixed with the generated-file comment.
pub fn to_spec_yaml(value: &Value) -> Result<String> {
    let yaml = serde_yaml::to_string(value)?;
    Ok(with_generated_comment(&yaml))
}

/// Prepends the generated-file comment to YAML output.
pub fn with_generated_comment(yaml: &str) -> String {
    format!("{GENERATED_COMMENT}{yaml}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_yaml_carries_generated_comment() {
        let doc = json!({"openapi": "3.0.3"});
        let yaml = to_spec_yaml(&doc).unwrap();
        assert!(yaml.starts_with("# OpenAPI spec generated by vervet, DO NOT EDIT\n"));
        assert!(yaml.contains("openapi: 3.0.3"));
    }

    #[test]
    fn test_json_round_trips() {
        let doc = json!({"openapi": "3.0.3", "paths": {}});
        let text = to_spec_json(&doc).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, doc);
    }
}
