//! JSON Schema for stub definition files

use crate::stub::StubDefinition;

/// Generate JSON Schema for a stub file (a list of stub definitions).
#[must_use]
pub fn generate_schema() -> String {
    let schema = schemars::schema_for!(Vec<StubDefinition>);
    serde_json::to_string_pretty(&schema).expect("schema serialization should not fail")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_describes_stub_list() {
        let schema = generate_schema();
        let parsed: serde_json::Value = serde_json::from_str(&schema).unwrap();
        assert_eq!(parsed.get("type").and_then(|v| v.as_str()), Some("array"));
        assert!(schema.contains("StubDefinition"));
        assert!(schema.contains("requestBody"));
        assert!(schema.contains("SOAP"));
    }
}
