//! Evaluation context assembly.

use pricetag_expr::{EvaluationContext, InputGroupState, InputState, normalize};

use crate::node::NodeView;
use crate::rule::PricingRule;

/// Read the declared dependencies of `rule` from a node.
///
/// Undeclared widgets and inputs are never read, so a rule cannot depend on
/// state its signature does not cover.
pub fn build_context<N: NodeView + ?Sized>(node: &N, rule: &PricingRule) -> EvaluationContext {
  let widgets = rule
    .widgets
    .iter()
    .map(|name| {
      let raw = node.widget_value(name).unwrap_or(serde_json::Value::Null);
      (name.clone(), normalize(&raw))
    })
    .collect();

  let inputs = rule
    .inputs
    .iter()
    .map(|name| {
      let connected = node.is_input_connected(name);
      (name.clone(), InputState { connected })
    })
    .collect();

  let input_groups = rule
    .input_groups
    .iter()
    .map(|name| {
      let connected_count = node.connected_in_group(name);
      (name.clone(), InputGroupState { connected_count })
    })
    .collect();

  EvaluationContext {
    widgets,
    inputs,
    input_groups,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::node::NodeSnapshot;
  use pricetag_config::FormatOptions;
  use serde_json::json;

  fn rule(widgets: &[&str], inputs: &[&str]) -> PricingRule {
    PricingRule {
      engine: "expr-v1".to_string(),
      widgets: widgets.iter().map(|s| s.to_string()).collect(),
      inputs: inputs.iter().map(|s| s.to_string()).collect(),
      input_groups: vec![],
      result_defaults: FormatOptions::default(),
      expr: "1".to_string(),
    }
  }

  #[test]
  fn test_only_declared_names_are_read() {
    let node = NodeSnapshot::new("1", "Gen")
      .with_widget("quality", json!("High"))
      .with_widget("seed", json!(42))
      .with_input("image", Some(3))
      .with_input("mask", Some(4));

    let context = build_context(&node, &rule(&["quality"], &["image"]));

    assert_eq!(context.widgets.len(), 1);
    assert_eq!(context.widgets["quality"].text, "high");
    assert_eq!(context.inputs.len(), 1);
    assert!(context.inputs["image"].connected);
  }

  #[test]
  fn test_missing_widget_is_normalized_null() {
    let node = NodeSnapshot::new("1", "Gen");

    let context = build_context(&node, &rule(&["steps"], &["image"]));

    assert_eq!(context.widgets["steps"].raw, serde_json::Value::Null);
    assert_eq!(context.widgets["steps"].number, None);
    assert!(!context.inputs["image"].connected);
  }
}
