//! The expression engine trait.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::EvaluationContext;
use crate::error::ExprError;

/// An opaque, engine-specific compiled expression.
///
/// Cheap to clone. Only the engine that produced a handle can look inside it.
#[derive(Clone)]
pub struct CompiledExpr {
  inner: Arc<dyn Any + Send + Sync>,
}

impl CompiledExpr {
  /// Wrap an engine-specific compiled form.
  pub fn new<T: Any + Send + Sync>(inner: T) -> Self {
    Self {
      inner: Arc::new(inner),
    }
  }

  /// Borrow the engine-specific compiled form.
  ///
  /// Returns `None` if the handle was produced by a different engine.
  pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
    self.inner.downcast_ref::<T>()
  }

  /// Share ownership of the engine-specific compiled form, e.g. to move it
  /// onto another thread.
  pub fn downcast_arc<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
    self.inner.clone().downcast::<T>().ok()
  }
}

impl fmt::Debug for CompiledExpr {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CompiledExpr").finish_non_exhaustive()
  }
}

/// An expression language that price badges can be written in.
///
/// Implementations must be pure with respect to the context: evaluating the
/// same compiled expression against equal contexts yields equal results.
/// Every `evaluate` call must eventually resolve.
#[async_trait]
pub trait ExpressionEngine: Send + Sync {
  /// The id declarations use to select this engine, e.g. "expr-v1".
  fn id(&self) -> &str;

  /// Compile expression source into a reusable handle.
  fn compile(&self, source: &str) -> Result<CompiledExpr, ExprError>;

  /// Evaluate a compiled expression against a node's context.
  ///
  /// The returned JSON is interpreted by the runtime as a pricing result.
  async fn evaluate(
    &self,
    expr: &CompiledExpr,
    context: &EvaluationContext,
  ) -> Result<serde_json::Value, ExprError>;
}
