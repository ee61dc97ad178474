//! Dependency signatures.
//!
//! A signature fingerprints the declared-dependency values of a context:
//!
//! ```text
//! w:quality="high"|w:steps=30|i:image=1|g:refs=2
//! ```
//!
//! Widgets come first in declaration order, then inputs, then input groups.
//! Widget values are rendered as JSON, so the string `"1"` and the number `1`
//! sign differently.
//! Equal dependency values always give equal signatures, which is what lets a
//! signature serve as both cache key and change detector.

use std::fmt;

use pricetag_expr::EvaluationContext;
use serde_json::Value;

use crate::rule::PricingRule;

const SEPARATOR: &str = "|";

/// Fingerprint of a node's declared-dependency values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Signature {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Compute the signature of `context` under `rule`'s declared order.
pub fn sign(context: &EvaluationContext, rule: &PricingRule) -> Signature {
  let widgets = rule.widgets.iter().map(|name| {
    let raw = context
      .widgets
      .get(name)
      .map(|value| safe_string(&value.raw))
      .unwrap_or_default();
    format!("w:{}={}", name, raw)
  });

  let inputs = rule.inputs.iter().map(|name| {
    let connected = context.inputs.get(name).is_some_and(|input| input.connected);
    format!("i:{}={}", name, u8::from(connected))
  });

  let groups = rule.input_groups.iter().map(|name| {
    let count = context
      .input_groups
      .get(name)
      .map_or(0, |group| group.connected_count);
    format!("g:{}={}", name, count)
  });

  let parts: Vec<String> = widgets.chain(inputs).chain(groups).collect();
  Signature(parts.join(SEPARATOR))
}

/// Render a raw value for a signature. Never fails.
fn safe_string(raw: &Value) -> String {
  serde_json::to_string(raw).unwrap_or_else(|_| format!("{:?}", raw))
}
