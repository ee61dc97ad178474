//! Runtime error types.
//!
//! None of these ever reach callers of [`BadgeRuntime::label`](crate::BadgeRuntime::label);
//! a failure there is always an empty label. They surface from construction,
//! definition loading, and [`CompiledRule::compile`](crate::CompiledRule::compile).

/// Errors that can occur in the pricing runtime.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
  /// The runtime was created outside of a tokio runtime.
  #[error("no tokio runtime available to schedule evaluations")]
  NoAsyncRuntime,

  /// A price badge names an engine that is not registered.
  #[error("node type '{node_type}' uses unknown engine '{engine}'")]
  UnknownEngine { node_type: String, engine: String },

  /// A price badge expression failed to compile.
  #[error("failed to compile price badge for node type '{node_type}': {message}")]
  Declaration { node_type: String, message: String },

  /// Failed to read a definitions file.
  #[error("failed to read definitions: {0}")]
  Io(#[from] std::io::Error),

  /// Failed to parse definitions JSON.
  #[error("failed to parse definitions: {0}")]
  Json(#[from] serde_json::Error),
}
