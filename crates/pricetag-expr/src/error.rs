//! Expression engine errors.

/// Errors an expression engine can report.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
  /// The expression text could not be compiled.
  #[error("failed to compile expression: {message}")]
  Compile { message: String },

  /// The expression raised an error while being evaluated.
  #[error("expression evaluation failed: {message}")]
  Evaluate { message: String },

  /// A compiled handle was passed to an engine that did not produce it.
  #[error("compiled expression does not belong to engine '{engine}'")]
  ForeignHandle { engine: String },
}

impl ExprError {
  /// Create a compile error.
  pub fn compile(message: impl Into<String>) -> Self {
    Self::Compile {
      message: message.into(),
    }
  }

  /// Create an evaluation error.
  pub fn evaluate(message: impl Into<String>) -> Self {
    Self::Evaluate {
      message: message.into(),
    }
  }
}
