//! Where price badge declarations come from.

use std::collections::HashMap;
use std::path::Path;

use pricetag_config::{NodeTypeDef, PricingDef};
use tokio::fs;

use crate::error::RuntimeError;

/// A store of node type declarations.
pub trait DefinitionSource: Send + Sync {
  /// The price badge declared for a node type, if any.
  fn pricing(&self, node_type: &str) -> Option<&PricingDef>;
}

/// Declarations held in memory, typically loaded from a JSON file.
///
/// The file holds an array of node types:
/// ```json
/// [
///   { "name": "ImageGenerateNode", "price_badge": { "engine": "expr-v1", "expr": "..." } },
///   { "name": "LoadImage" }
/// ]
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticDefinitions {
  by_type: HashMap<String, PricingDef>,
}

impl StaticDefinitions {
  pub fn new() -> Self {
    Self::default()
  }

  /// Build from node type definitions. Types without a price badge are skipped.
  pub fn from_node_types(node_types: impl IntoIterator<Item = NodeTypeDef>) -> Self {
    let by_type = node_types
      .into_iter()
      .filter_map(|def| def.price_badge.map(|badge| (def.name, badge)))
      .collect();
    Self { by_type }
  }

  /// Parse a JSON array of node type definitions.
  pub fn from_json_str(json: &str) -> Result<Self, RuntimeError> {
    let node_types: Vec<NodeTypeDef> = serde_json::from_str(json)?;
    Ok(Self::from_node_types(node_types))
  }

  /// Read and parse a definitions file.
  pub async fn load(path: &Path) -> Result<Self, RuntimeError> {
    let content = fs::read_to_string(path).await?;
    Self::from_json_str(&content)
  }

  /// Add or replace a single declaration.
  pub fn insert(&mut self, node_type: impl Into<String>, pricing: PricingDef) {
    self.by_type.insert(node_type.into(), pricing);
  }

  /// Names of all node types that declare a price badge, sorted.
  pub fn node_types(&self) -> Vec<&str> {
    let mut names: Vec<&str> = self.by_type.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
  }

  pub fn len(&self) -> usize {
    self.by_type.len()
  }

  pub fn is_empty(&self) -> bool {
    self.by_type.is_empty()
  }
}

impl DefinitionSource for StaticDefinitions {
  fn pricing(&self, node_type: &str) -> Option<&PricingDef> {
    self.by_type.get(node_type)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_types_without_badge_are_skipped() {
    let defs = StaticDefinitions::from_json_str(
      r#"[
        { "name": "Priced", "price_badge": { "engine": "expr-v1", "expr": "1" } },
        { "name": "Free", "display_name": "Free Node" }
      ]"#,
    )
    .unwrap();

    assert_eq!(defs.len(), 1);
    assert!(defs.pricing("Priced").is_some());
    assert!(defs.pricing("Free").is_none());
  }

  #[test]
  fn test_invalid_json_is_an_error() {
    let result = StaticDefinitions::from_json_str("{ not json");
    assert!(matches!(result, Err(RuntimeError::Json(_))));
  }
}
