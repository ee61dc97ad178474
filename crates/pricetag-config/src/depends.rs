use serde::{Deserialize, Serialize};

/// The node state a pricing expression is allowed to observe.
///
/// Anything not listed here is invisible to the expression, and changing it
/// never invalidates a cached label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependsOn {
  /// Widget names, in declaration order.
  #[serde(default)]
  pub widgets: Vec<String>,

  /// Input slot names whose connection state matters.
  #[serde(default)]
  pub inputs: Vec<String>,

  /// Input group prefixes; the expression sees how many `<group>.*` inputs
  /// are connected.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub input_groups: Vec<String>,
}

impl DependsOn {
  /// Widget names with duplicates removed, first occurrence wins.
  pub fn widget_names(&self) -> Vec<String> {
    dedup(&self.widgets)
  }

  /// Input names with duplicates removed, first occurrence wins.
  pub fn input_names(&self) -> Vec<String> {
    dedup(&self.inputs)
  }

  /// Input group names with duplicates removed, first occurrence wins.
  pub fn input_group_names(&self) -> Vec<String> {
    dedup(&self.input_groups)
  }

  /// Every declared name: widgets, then inputs, then input groups.
  ///
  /// A name that appears in more than one list is only reported once.
  pub fn all_names(&self) -> Vec<String> {
    let chained: Vec<String> = self
      .widgets
      .iter()
      .chain(&self.inputs)
      .chain(&self.input_groups)
      .cloned()
      .collect();
    dedup(&chained)
  }
}

fn dedup(names: &[String]) -> Vec<String> {
  let mut seen = std::collections::HashSet::new();
  names
    .iter()
    .filter(|name| seen.insert(name.as_str()))
    .cloned()
    .collect()
}
