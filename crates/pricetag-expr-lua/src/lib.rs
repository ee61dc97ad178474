//! Lua expression engine for pricetag.
//!
//! Price badge expressions declared with `"engine": "expr-v1"` are Lua 5.4
//! expressions. The expression is compiled as a chunk of the form
//!
//! ```lua
//! local widgets, inputs, input_groups = ...
//! return (<expr>)
//! ```
//!
//! so it can refer to the declared dependencies directly:
//!
//! ```lua
//! { type = "usd", usd = widgets.quality.s == "high" and 5 or 1 }
//! ```
//!
//! Longer rules may be written as a statement block that ends in `return`.
//!
//! Each widget is a table `{ raw, s, n, b }` (projections that are null are
//! `nil`), each input is `{ connected = <bool> }` and each input group is
//! `{ connected_count = <int> }`.
//!
//! Only the `math`, `string` and `table` libraries are loaded. Each call gets
//! a fresh global environment and runs on tokio's blocking pool under an
//! instruction budget, so a runaway expression fails instead of stalling the
//! runtime.

mod engine;

pub use engine::{ENGINE_ID, LuaEngine, LuaEngineConfig};
