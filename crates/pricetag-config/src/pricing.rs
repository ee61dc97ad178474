use serde::{Deserialize, Serialize};

use crate::depends::DependsOn;
use crate::format::FormatOptions;

/// A price badge declaration attached to a node type.
///
/// # Example
///
/// ```json
/// {
///   "engine": "expr-v1",
///   "depends_on": { "widgets": ["quality"], "inputs": ["image"] },
///   "result_defaults": { "suffix": "/Image" },
///   "expr": "{ type = 'usd', usd = widgets.quality.s == 'high' and 5 or 1 }"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingDef {
  /// Id of the expression engine that understands `expr`.
  pub engine: String,

  #[serde(default)]
  pub depends_on: DependsOn,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub result_defaults: Option<FormatOptions>,

  /// Expression source text.
  pub expr: String,
}
