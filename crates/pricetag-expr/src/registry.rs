//! Engine lookup by id.

use std::collections::HashMap;
use std::sync::Arc;

use crate::engine::ExpressionEngine;

/// Maps declaration engine ids to engine implementations.
#[derive(Clone, Default)]
pub struct EngineRegistry {
  engines: HashMap<String, Arc<dyn ExpressionEngine>>,
}

impl EngineRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register an engine under its own id, replacing any previous engine
  /// with the same id.
  pub fn register(&mut self, engine: Arc<dyn ExpressionEngine>) {
    self.engines.insert(engine.id().to_string(), engine);
  }

  /// Builder-style variant of [`register`](Self::register).
  pub fn with(mut self, engine: Arc<dyn ExpressionEngine>) -> Self {
    self.register(engine);
    self
  }

  /// Look up an engine by id.
  pub fn get(&self, id: &str) -> Option<Arc<dyn ExpressionEngine>> {
    self.engines.get(id).cloned()
  }

  /// Ids of all registered engines, sorted.
  pub fn ids(&self) -> Vec<&str> {
    let mut ids: Vec<&str> = self.engines.keys().map(String::as_str).collect();
    ids.sort_unstable();
    ids
  }
}

impl std::fmt::Debug for EngineRegistry {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("EngineRegistry")
      .field("engines", &self.ids())
      .finish()
  }
}
