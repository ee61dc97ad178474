//! Evaluation result shapes.
//!
//! An expression returns JSON tagged by `type`:
//!
//! ```json
//! { "type": "text", "text": "Free" }
//! { "type": "usd", "usd": 0.04, "format": { "approximate": true } }
//! { "type": "range_usd", "min_usd": 0.02, "max_usd": 0.1 }
//! { "type": "list_usd", "usd": [0.02, 0.04] }
//! ```

use pricetag_config::FormatOptions;
use serde_json::Value;

/// A parsed pricing result.
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationResult {
  Text {
    text: String,
  },
  Usd {
    usd: f64,
    format: Option<FormatOptions>,
  },
  RangeUsd {
    min_usd: f64,
    max_usd: f64,
    format: Option<FormatOptions>,
  },
  ListUsd {
    usd_values: Vec<f64>,
    format: Option<FormatOptions>,
  },
}

impl EvaluationResult {
  /// Interpret an expression's JSON output.
  ///
  /// Returns `None` for an unknown `type` or a missing/non-numeric amount.
  /// Non-numeric entries of a list are dropped rather than rejecting the list.
  pub fn from_value(value: &Value) -> Option<Self> {
    let format = value
      .get("format")
      .and_then(|f| serde_json::from_value::<FormatOptions>(f.clone()).ok());

    match value.get("type")?.as_str()? {
      "text" => Some(Self::Text {
        text: value.get("text")?.as_str()?.to_string(),
      }),
      "usd" => Some(Self::Usd {
        usd: value.get("usd")?.as_f64()?,
        format,
      }),
      "range_usd" => Some(Self::RangeUsd {
        min_usd: value.get("min_usd")?.as_f64()?,
        max_usd: value.get("max_usd")?.as_f64()?,
        format,
      }),
      "list_usd" => {
        let entries = value
          .get("usd")
          .or_else(|| value.get("usd_values"))?
          .as_array()?;
        Some(Self::ListUsd {
          usd_values: entries.iter().filter_map(Value::as_f64).collect(),
          format,
        })
      }
      _ => None,
    }
  }
}
