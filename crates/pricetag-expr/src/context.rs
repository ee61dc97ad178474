//! The evaluation context handed to an expression engine.
//!
//! Widget values arrive as arbitrary JSON. Before an expression sees them they
//! are normalized into a fixed shape so that expressions can compare strings,
//! numbers and booleans without caring how the widget stored the value:
//!
//! ```json
//! { "raw": " High ", "s": "high", "n": null, "b": null }
//! { "raw": "20",     "s": "20",   "n": 20,   "b": null }
//! { "raw": "TRUE",   "s": "true", "n": null, "b": true }
//! ```

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

/// A widget value together with its string, number and boolean projections.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedValue {
  /// The value exactly as the widget holds it. `Null` when the widget is absent.
  pub raw: Value,
  /// Trimmed, lower-cased string form. Empty for null.
  #[serde(rename = "s")]
  pub text: String,
  /// Finite numeric value, if the raw value is a number or a numeric string.
  #[serde(rename = "n")]
  pub number: Option<f64>,
  /// Boolean value, if the raw value is a boolean or "true"/"false".
  #[serde(rename = "b")]
  pub boolean: Option<bool>,
}

/// Connection state of a single declared input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InputState {
  pub connected: bool,
}

/// Connection state of a declared input group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InputGroupState {
  pub connected_count: usize,
}

/// Everything a pricing expression may observe about a node.
///
/// Only names declared in the rule's `depends_on` are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationContext {
  pub widgets: HashMap<String, NormalizedValue>,
  pub inputs: HashMap<String, InputState>,
  pub input_groups: HashMap<String, InputGroupState>,
}

/// Normalize a raw widget value.
pub fn normalize(raw: &Value) -> NormalizedValue {
  NormalizedValue {
    raw: raw.clone(),
    text: text_of(raw),
    number: number_of(raw),
    boolean: boolean_of(raw),
  }
}

fn text_of(raw: &Value) -> String {
  match raw {
    Value::Null => String::new(),
    Value::String(s) => s.trim().to_lowercase(),
    Value::Bool(b) => b.to_string(),
    Value::Number(n) => n.to_string(),
    structured => structured.to_string().trim().to_lowercase(),
  }
}

fn number_of(raw: &Value) -> Option<f64> {
  match raw {
    Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
    Value::String(s) => {
      let trimmed = s.trim();
      if trimmed.is_empty() {
        return None;
      }
      trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
    }
    // Booleans and structured values never coerce into numbers.
    _ => None,
  }
}

fn boolean_of(raw: &Value) -> Option<bool> {
  match raw {
    Value::Bool(b) => Some(*b),
    Value::String(s) => match s.trim().to_lowercase().as_str() {
      "true" => Some(true),
      "false" => Some(false),
      _ => None,
    },
    _ => None,
  }
}
