//! Price badge runtime for pricetag.
//!
//! Given a node instance and its type's price badge declaration, this crate
//! produces a short display label such as `"~10.6 credits/Run"`:
//!
//! 1. The declaration is compiled once per node type ([`CompiledRules`]).
//! 2. The declared widgets and inputs are read into an evaluation context
//!    and fingerprinted into a [`Signature`].
//! 3. If the node's cached label was computed for that signature it is
//!    returned directly. Otherwise an evaluation is scheduled on tokio and
//!    the previous label is returned in the meantime.
//! 4. When the evaluation settles, the label is cached (only if the node
//!    still wants that signature) and the [`InvalidationSignal`] is bumped.
//!
//! [`BadgeRuntime`] ties these together.

mod cache;
mod context;
mod credits;
mod definitions;
mod error;
mod format;
mod node;
mod result;
mod rule;
mod runtime;
mod signal;
mod signature;

pub use cache::CompiledRules;
pub use context::build_context;
pub use credits::CreditRate;
pub use definitions::{DefinitionSource, StaticDefinitions};
pub use error::RuntimeError;
pub use format::{LabelFormatter, default_options};
pub use node::{NodeSnapshot, NodeView};
pub use result::EvaluationResult;
pub use rule::{CompiledRule, PricingRule};
pub use runtime::{BadgeRuntime, RuntimeConfig};
pub use signal::InvalidationSignal;
pub use signature::{Signature, sign};
