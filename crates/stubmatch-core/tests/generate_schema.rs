//! Integration test that generates stubs.schema.json
//!
//! Run with: cargo test -p stubmatch-core --test generate_schema

use std::path::Path;
use stubmatch_core::schema::generate_schema;

#[test]
fn write_schema_file() {
    let schema = generate_schema();

    // Write to workspace root
    let workspace_root = Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap();
    let schema_path = workspace_root.join("stubs.schema.json");

    std::fs::write(&schema_path, &schema).expect("failed to write schema file");

    let content = std::fs::read_to_string(&schema_path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(parsed.get("type").and_then(|v| v.as_str()), Some("array"));
    let defs = parsed
        .get("$defs")
        .and_then(|v| v.as_object())
        .expect("schema has definitions");
    assert!(defs.contains_key("StubDefinition"));
    assert!(defs.contains_key("Protocol"));
}
