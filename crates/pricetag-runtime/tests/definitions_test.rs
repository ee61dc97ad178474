//! Tests for loading declarations from disk.

use std::io::Write;

use pricetag_runtime::{DefinitionSource, RuntimeError, StaticDefinitions};

#[tokio::test]
async fn test_load_from_file() {
  let mut file = tempfile::NamedTempFile::new().expect("failed to create temp file");
  write!(
    file,
    r#"[
      {{
        "name": "Upscale",
        "price_badge": {{
          "engine": "expr-v1",
          "depends_on": {{ "widgets": ["scale"] }},
          "expr": "{{ type = 'usd', usd = 0.01 }}"
        }}
      }},
      {{ "name": "Preview" }}
    ]"#
  )
  .expect("failed to write definitions");

  let defs = StaticDefinitions::load(file.path()).await.expect("failed to load");

  assert_eq!(defs.node_types(), vec!["Upscale"]);
  let pricing = defs.pricing("Upscale").unwrap();
  assert_eq!(pricing.engine, "expr-v1");
  assert_eq!(pricing.depends_on.widgets, vec!["scale"]);
}

#[tokio::test]
async fn test_missing_file_is_io_error() {
  let dir = tempfile::tempdir().expect("failed to create temp dir");

  let result = StaticDefinitions::load(&dir.path().join("definitions.json")).await;

  assert!(matches!(result, Err(RuntimeError::Io(_))));
}

#[tokio::test]
async fn test_malformed_file_is_json_error() {
  let mut file = tempfile::NamedTempFile::new().expect("failed to create temp file");
  write!(file, r#"[{{ "name": 1 }}]"#).expect("failed to write definitions");

  let result = StaticDefinitions::load(file.path()).await;

  assert!(matches!(result, Err(RuntimeError::Json(_))));
}
