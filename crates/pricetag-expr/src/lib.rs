//! Pricetag Expr
//!
//! The expression engine abstraction used by the pricing runtime.
//!
//! The runtime never assumes anything about the expression language beyond
//! the [`ExpressionEngine`] contract:
//!
//! ```text
//! compile(source)           -> CompiledExpr | ExprError::Compile
//! evaluate(compiled, ctx)   -> async serde_json::Value | ExprError::Evaluate
//! ```
//!
//! Engines are looked up by the `engine` id of a price badge declaration
//! through an [`EngineRegistry`].

mod context;
mod engine;
mod error;
mod registry;

pub use context::{EvaluationContext, InputGroupState, InputState, NormalizedValue, normalize};
pub use engine::{CompiledExpr, ExpressionEngine};
pub use error::ExprError;
pub use registry::EngineRegistry;
