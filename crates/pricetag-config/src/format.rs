use serde::{Deserialize, Serialize};

/// Label decorations applied when a price is rendered.
///
/// Every field is optional so that options can be layered: a per-result
/// override sits on top of the node type's `result_defaults`, which sits on
/// top of the runtime-wide defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormatOptions {
  /// Appended after the unit, e.g. "/Run".
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub suffix: Option<String>,

  /// Free text appended after a space, e.g. "(per image)".
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub note: Option<String>,

  /// Prefix the amount with "~".
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub approximate: Option<bool>,

  /// Separator between list entries, e.g. "/".
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub separator: Option<String>,
}

impl FormatOptions {
  /// Fill every unset field from `fallback`.
  pub fn or(&self, fallback: &FormatOptions) -> FormatOptions {
    FormatOptions {
      suffix: self.suffix.clone().or_else(|| fallback.suffix.clone()),
      note: self.note.clone().or_else(|| fallback.note.clone()),
      approximate: self.approximate.or(fallback.approximate),
      separator: self.separator.clone().or_else(|| fallback.separator.clone()),
    }
  }
}
