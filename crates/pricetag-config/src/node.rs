use serde::{Deserialize, Serialize};

use crate::pricing::PricingDef;

/// A node type as published by the node-definition store.
///
/// Only the parts pricing cares about are modelled; unknown fields are
/// ignored when parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTypeDef {
  /// Node type name, e.g. "ImageGenerateNode".
  pub name: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub display_name: Option<String>,

  /// Price badge declaration, if this node type has a cost.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub price_badge: Option<PricingDef>,
}
