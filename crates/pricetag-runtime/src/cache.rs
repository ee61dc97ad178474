//! Compiled rule caching.
//!
//! Each node type's price badge is compiled once and cached, including when
//! compilation fails: a failed node type keeps its failure sentinel until the
//! cache is reset, so a broken declaration is reported once and never
//! recompiled on every frame.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, PoisonError, RwLock};

use pricetag_config::PricingDef;
use pricetag_expr::EngineRegistry;
use tracing::{debug, warn};

use crate::rule::CompiledRule;

/// Shared cache of compiled rules, keyed by node type name.
///
/// Clones share the same underlying cache, so several runtimes can use one
/// set of compiled rules.
#[derive(Clone, Default)]
pub struct CompiledRules {
  cache: Arc<RwLock<HashMap<String, Arc<CompiledRule>>>>,
}

impl CompiledRules {
  pub fn new() -> Self {
    Self::default()
  }

  /// Get a compiled rule from cache without compiling.
  pub fn get(&self, node_type: &str) -> Option<Arc<CompiledRule>> {
    let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
    cache.get(node_type).cloned()
  }

  /// Get a compiled rule from cache, or compile and cache it.
  ///
  /// Compilation failures are logged and cached as a failed rule. When two
  /// callers race on the same node type, the first insert wins.
  pub fn get_or_compile(
    &self,
    node_type: &str,
    def: &PricingDef,
    engines: &EngineRegistry,
  ) -> Arc<CompiledRule> {
    if let Some(compiled) = self.get(node_type) {
      return compiled;
    }

    // Compile outside the lock; compiling is pure, so a lost race only
    // wastes work.
    let compiled = match CompiledRule::compile(node_type, def, engines) {
      Ok(compiled) => compiled,
      Err(e) => CompiledRule::failed(def, e.to_string()),
    };

    let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
    match cache.entry(node_type.to_string()) {
      Entry::Occupied(existing) => existing.get().clone(),
      Entry::Vacant(slot) => {
        match compiled.failure() {
          Some(message) => {
            warn!(node_type = %node_type, error = %message, "price badge disabled");
          }
          None => {
            debug!(node_type = %node_type, engine = %compiled.rule().engine, "price badge compiled");
          }
        }
        slot.insert(Arc::new(compiled)).clone()
      }
    }
  }

  /// Forget every compiled rule.
  pub fn reset(&self) {
    let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
    cache.clear();
  }

  pub fn len(&self) -> usize {
    let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
    cache.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  use async_trait::async_trait;
  use pricetag_config::DependsOn;
  use pricetag_expr::{CompiledExpr, EvaluationContext, ExprError, ExpressionEngine};

  #[derive(Default)]
  struct CountingEngine {
    compiles: AtomicUsize,
  }

  #[async_trait]
  impl ExpressionEngine for CountingEngine {
    fn id(&self) -> &str {
      "counting"
    }

    fn compile(&self, source: &str) -> Result<CompiledExpr, ExprError> {
      self.compiles.fetch_add(1, Ordering::SeqCst);
      if source == "broken" {
        return Err(ExprError::compile("unexpected token"));
      }
      Ok(CompiledExpr::new(source.to_string()))
    }

    async fn evaluate(
      &self,
      _expr: &CompiledExpr,
      _context: &EvaluationContext,
    ) -> Result<serde_json::Value, ExprError> {
      Ok(serde_json::Value::Null)
    }
  }

  fn def(engine: &str, expr: &str) -> PricingDef {
    PricingDef {
      engine: engine.to_string(),
      depends_on: DependsOn::default(),
      result_defaults: None,
      expr: expr.to_string(),
    }
  }

  fn registry(engine: &Arc<CountingEngine>) -> EngineRegistry {
    EngineRegistry::new().with(engine.clone())
  }

  #[test]
  fn test_compiles_once_per_node_type() {
    let engine = Arc::new(CountingEngine::default());
    let engines = registry(&engine);
    let rules = CompiledRules::new();

    let first = rules.get_or_compile("A", &def("counting", "1"), &engines);
    let second = rules.get_or_compile("A", &def("counting", "1"), &engines);

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(engine.compiles.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn test_failure_is_cached_and_not_retried() {
    let engine = Arc::new(CountingEngine::default());
    let engines = registry(&engine);
    let rules = CompiledRules::new();

    let first = rules.get_or_compile("Broken", &def("counting", "broken"), &engines);
    let second = rules.get_or_compile("Broken", &def("counting", "broken"), &engines);

    assert!(first.is_failed());
    assert!(second.is_failed());
    assert_eq!(engine.compiles.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn test_unknown_engine_is_a_failure() {
    let engine = Arc::new(CountingEngine::default());
    let rules = CompiledRules::new();

    let compiled = rules.get_or_compile("A", &def("jsonata", "1"), &registry(&engine));

    assert!(compiled.is_failed());
    assert!(compiled.failure().unwrap().contains("unknown engine"));
    assert_eq!(engine.compiles.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn test_first_compile_wins_until_reset() {
    let engine = Arc::new(CountingEngine::default());
    let engines = registry(&engine);
    let rules = CompiledRules::new();

    rules.get_or_compile("A", &def("counting", "1"), &engines);
    let redeclared = rules.get_or_compile("A", &def("counting", "2"), &engines);
    assert_eq!(redeclared.rule().expr, "1");

    rules.reset();
    assert!(rules.is_empty());

    let recompiled = rules.get_or_compile("A", &def("counting", "2"), &engines);
    assert_eq!(recompiled.rule().expr, "2");
  }

  #[test]
  fn test_clones_share_cache() {
    let engine = Arc::new(CountingEngine::default());
    let engines = registry(&engine);
    let rules = CompiledRules::new();
    let shared = rules.clone();

    rules.get_or_compile("A", &def("counting", "1"), &engines);

    assert!(shared.get("A").is_some());
    assert_eq!(shared.len(), 1);
  }
}
