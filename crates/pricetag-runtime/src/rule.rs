//! Pricing rules and their compiled form.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use pricetag_config::{FormatOptions, PricingDef};
use pricetag_expr::{CompiledExpr, EngineRegistry, ExpressionEngine};

use crate::error::RuntimeError;

/// A price badge declaration in the form the runtime works with.
///
/// Dependency names are deduplicated (first occurrence wins) and the
/// declaration order is preserved, since it defines signature order.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingRule {
  pub engine: String,
  pub widgets: Vec<String>,
  pub inputs: Vec<String>,
  pub input_groups: Vec<String>,
  pub result_defaults: FormatOptions,
  pub expr: String,
}

impl PricingRule {
  pub fn from_def(def: &PricingDef) -> Self {
    Self {
      engine: def.engine.clone(),
      widgets: def.depends_on.widget_names(),
      inputs: def.depends_on.input_names(),
      input_groups: def.depends_on.input_group_names(),
      result_defaults: def.result_defaults.clone().unwrap_or_default(),
      expr: def.expr.clone(),
    }
  }
}

enum Program {
  Ready {
    engine: Arc<dyn ExpressionEngine>,
    expr: CompiledExpr,
  },
  Failed {
    message: String,
  },
}

/// A pricing rule together with its compiled expression, or the record that
/// compilation failed for good.
pub struct CompiledRule {
  rule: PricingRule,
  program: Program,
}

impl CompiledRule {
  /// Compile a declaration with the engine it names.
  pub fn compile(
    node_type: &str,
    def: &PricingDef,
    engines: &EngineRegistry,
  ) -> Result<Self, RuntimeError> {
    let rule = PricingRule::from_def(def);

    let engine = engines
      .get(&rule.engine)
      .ok_or_else(|| RuntimeError::UnknownEngine {
        node_type: node_type.to_string(),
        engine: rule.engine.clone(),
      })?;

    let declaration_error = |message: String| RuntimeError::Declaration {
      node_type: node_type.to_string(),
      message,
    };
    let expr = panic::catch_unwind(AssertUnwindSafe(|| engine.compile(&rule.expr)))
      .map_err(|_| declaration_error("expression compiler panicked".to_string()))?
      .map_err(|e| declaration_error(e.to_string()))?;

    Ok(Self {
      rule,
      program: Program::Ready { engine, expr },
    })
  }

  /// The failure sentinel for a node type whose declaration cannot be used.
  pub fn failed(def: &PricingDef, message: impl Into<String>) -> Self {
    Self {
      rule: PricingRule::from_def(def),
      program: Program::Failed {
        message: message.into(),
      },
    }
  }

  pub fn rule(&self) -> &PricingRule {
    &self.rule
  }

  pub fn is_failed(&self) -> bool {
    matches!(self.program, Program::Failed { .. })
  }

  /// Why compilation failed, for failed rules.
  pub fn failure(&self) -> Option<&str> {
    match &self.program {
      Program::Failed { message } => Some(message),
      Program::Ready { .. } => None,
    }
  }

  /// Engine and compiled expression, for rules that compiled.
  pub(crate) fn program(&self) -> Option<(&Arc<dyn ExpressionEngine>, &CompiledExpr)> {
    match &self.program {
      Program::Ready { engine, expr } => Some((engine, expr)),
      Program::Failed { .. } => None,
    }
  }
}

impl fmt::Debug for CompiledRule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut s = f.debug_struct("CompiledRule");
    s.field("rule", &self.rule);
    match &self.program {
      Program::Ready { engine, .. } => s.field("engine", &engine.id()),
      Program::Failed { message } => s.field("failed", message),
    };
    s.finish()
  }
}
