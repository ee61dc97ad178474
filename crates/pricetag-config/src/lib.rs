//! Pricetag Config
//!
//! This crate contains the serializable price badge declarations for pricetag.
//! A declaration is attached to a node type and describes how the cost of a
//! node instance is computed: which engine runs the expression, which widgets
//! and inputs the expression may observe, and the formatting defaults for the
//! resulting label.
//!
//! Declarations are read from:
//! - JSON definition files (via CLI with `--definitions=definitions.json`)
//! - Any node-definition store that can hand out [`PricingDef`] values
//!
//! The runtime takes these declarations, compiles them once per node type and
//! evaluates them against live node state.

mod depends;
mod format;
mod node;
mod pricing;

pub use depends::DependsOn;
pub use format::FormatOptions;
pub use node::NodeTypeDef;
pub use pricing::PricingDef;
