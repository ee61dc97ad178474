//! Node instances as seen by the pricing runtime.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Read access to the live state of one node instance.
///
/// The runtime only ever asks for names the node type declared in its
/// price badge's `depends_on`.
pub trait NodeView {
  /// Identity of this node instance. Cached labels are keyed by it.
  fn node_id(&self) -> &str;

  /// Node type name, used to find the price badge declaration.
  fn node_type(&self) -> &str;

  /// Current value of a widget, or `None` if the node has no such widget.
  fn widget_value(&self, name: &str) -> Option<serde_json::Value>;

  /// Whether the named input slot currently has a link.
  fn is_input_connected(&self, name: &str) -> bool;

  /// Number of connected inputs named `<group>.<anything>`.
  fn connected_in_group(&self, group: &str) -> usize;
}

/// A plain-data snapshot of a node, e.g. as read from a saved graph.
///
/// ```json
/// {
///   "node_id": "12",
///   "node_type": "ImageGenerateNode",
///   "widgets": { "quality": "high", "steps": 30 },
///   "inputs": { "image": 7, "mask": null }
/// }
/// ```
///
/// Input values are link ids; `null` means the slot is not connected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
  pub node_id: String,
  pub node_type: String,
  #[serde(default)]
  pub widgets: HashMap<String, serde_json::Value>,
  #[serde(default)]
  pub inputs: HashMap<String, Option<u64>>,
}

impl NodeSnapshot {
  pub fn new(node_id: impl Into<String>, node_type: impl Into<String>) -> Self {
    Self {
      node_id: node_id.into(),
      node_type: node_type.into(),
      widgets: HashMap::new(),
      inputs: HashMap::new(),
    }
  }

  /// Set a widget value.
  pub fn with_widget(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
    self.widgets.insert(name.into(), value);
    self
  }

  /// Set an input slot's link.
  pub fn with_input(mut self, name: impl Into<String>, link: Option<u64>) -> Self {
    self.inputs.insert(name.into(), link);
    self
  }
}

impl NodeView for NodeSnapshot {
  fn node_id(&self) -> &str {
    &self.node_id
  }

  fn node_type(&self) -> &str {
    &self.node_type
  }

  fn widget_value(&self, name: &str) -> Option<serde_json::Value> {
    self.widgets.get(name).cloned()
  }

  fn is_input_connected(&self, name: &str) -> bool {
    matches!(self.inputs.get(name), Some(Some(_)))
  }

  fn connected_in_group(&self, group: &str) -> usize {
    self
      .inputs
      .iter()
      .filter(|(name, link)| {
        link.is_some()
          && name
            .strip_prefix(group)
            .is_some_and(|rest| rest.starts_with('.'))
      })
      .count()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_snapshot_connection_state() {
    let node = NodeSnapshot::new("1", "Sampler")
      .with_input("image", Some(4))
      .with_input("mask", None);

    assert!(node.is_input_connected("image"));
    assert!(!node.is_input_connected("mask"));
    assert!(!node.is_input_connected("missing"));
  }

  #[test]
  fn test_group_counts_only_connected_members() {
    let node = NodeSnapshot::new("1", "Collage")
      .with_input("images.0", Some(1))
      .with_input("images.1", Some(2))
      .with_input("images.2", None)
      .with_input("imagesX", Some(3))
      .with_input("other.0", Some(4));

    assert_eq!(node.connected_in_group("images"), 2);
    assert_eq!(node.connected_in_group("other"), 1);
    assert_eq!(node.connected_in_group("none"), 0);
  }

  #[test]
  fn test_snapshot_parses_null_links() {
    let node: NodeSnapshot = serde_json::from_value(json!({
      "node_id": "3",
      "node_type": "Upscale",
      "widgets": { "scale": 2 },
      "inputs": { "image": 9, "mask": null }
    }))
    .unwrap();

    assert_eq!(node.widget_value("scale"), Some(json!(2)));
    assert!(node.is_input_connected("image"));
    assert!(!node.is_input_connected("mask"));
  }
}
