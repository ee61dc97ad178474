//! The price badge runtime.
//!
//! [`BadgeRuntime`] is the entry point for the rendering layer. It owns the
//! compiled rules, the per-node label cache and the invalidation signal, and
//! schedules evaluations on a tokio runtime.
//!
//! Each node instance moves through:
//!
//! ```text
//! NoEntry --(miss)--> Pending(sig) --(settle)--> Cached(sig)
//!                         |
//!                         +--(new sig)--> Pending(new sig)
//! ```
//!
//! A result is only written to the cache if its signature is still the one
//! most recently requested for that node. Superseded evaluations run to
//! completion and are then dropped.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use pricetag_config::{FormatOptions, PricingDef};
use pricetag_expr::{EngineRegistry, EvaluationContext};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::cache::CompiledRules;
use crate::context::build_context;
use crate::credits::CreditRate;
use crate::definitions::DefinitionSource;
use crate::error::RuntimeError;
use crate::format::{LabelFormatter, default_options};
use crate::node::NodeView;
use crate::rule::CompiledRule;
use crate::signal::InvalidationSignal;
use crate::signature::{Signature, sign};

/// Configuration for the badge runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
  /// Label options used when neither the result nor the rule sets them.
  pub label_defaults: FormatOptions,
  /// USD to credits conversion.
  pub credits: CreditRate,
}

impl Default for RuntimeConfig {
  fn default() -> Self {
    Self {
      label_defaults: default_options(),
      credits: CreditRate::default(),
    }
  }
}

/// Cached label for one node instance.
struct CacheEntry {
  signature: Signature,
  label: String,
}

/// The evaluation most recently started for a node.
struct InFlight {
  signature: Signature,
  task_id: String,
}

/// Pricing state of one node instance.
#[derive(Default)]
struct NodeSlot {
  cached: Option<CacheEntry>,
  /// Most recently requested signature.
  desired: Option<Signature>,
  in_flight: Option<InFlight>,
}

impl NodeSlot {
  fn is_running(&self, signature: &Signature) -> bool {
    self
      .in_flight
      .as_ref()
      .is_some_and(|in_flight| &in_flight.signature == signature)
  }

  /// Clear the in-flight record if it belongs to `task_id`. An older task
  /// settling never clears a newer task's record.
  fn finish(&mut self, task_id: &str) {
    if self
      .in_flight
      .as_ref()
      .is_some_and(|in_flight| in_flight.task_id == task_id)
    {
      self.in_flight = None;
    }
  }
}

struct Inner {
  definitions: Arc<dyn DefinitionSource>,
  engines: EngineRegistry,
  rules: CompiledRules,
  formatter: LabelFormatter,
  nodes: Mutex<HashMap<String, NodeSlot>>,
  signal: InvalidationSignal,
  handle: Handle,
  shutdown: CancellationToken,
}

/// Computes and caches price badge labels for node instances.
///
/// Cheap to clone; clones share all state.
///
/// # Usage
///
/// ```ignore
/// let runtime = BadgeRuntime::new(RuntimeConfig::default(), definitions, engines)?;
///
/// // Every frame: never blocks, may return a stale label while a fresh one
/// // is being computed.
/// let label = runtime.label(&node);
///
/// // Re-render when evaluations settle.
/// let mut changes = runtime.signal().subscribe();
/// changes.changed().await?;
///
/// // When the node is deleted.
/// runtime.release(node.node_id());
/// ```
#[derive(Clone)]
pub struct BadgeRuntime {
  inner: Arc<Inner>,
}

impl BadgeRuntime {
  /// Create a runtime that schedules evaluations on the current tokio runtime.
  ///
  /// # Errors
  /// Returns [`RuntimeError::NoAsyncRuntime`] when called outside a tokio runtime.
  pub fn new(
    config: RuntimeConfig,
    definitions: Arc<dyn DefinitionSource>,
    engines: EngineRegistry,
  ) -> Result<Self, RuntimeError> {
    Self::with_rules(config, definitions, engines, CompiledRules::new())
  }

  /// Like [`new`](Self::new), sharing an existing compiled rule cache.
  pub fn with_rules(
    config: RuntimeConfig,
    definitions: Arc<dyn DefinitionSource>,
    engines: EngineRegistry,
    rules: CompiledRules,
  ) -> Result<Self, RuntimeError> {
    let handle = Handle::try_current().map_err(|_| RuntimeError::NoAsyncRuntime)?;
    Ok(Self::with_handle(config, definitions, engines, rules, handle))
  }

  /// Create a runtime that schedules evaluations on an explicit tokio handle.
  ///
  /// Use this when labels are requested from a thread that is not part of
  /// the tokio runtime, such as a UI thread.
  pub fn with_handle(
    config: RuntimeConfig,
    definitions: Arc<dyn DefinitionSource>,
    engines: EngineRegistry,
    rules: CompiledRules,
    handle: Handle,
  ) -> Self {
    Self {
      inner: Arc::new(Inner {
        definitions,
        engines,
        rules,
        formatter: LabelFormatter::new(config.label_defaults, config.credits),
        nodes: Mutex::new(HashMap::new()),
        signal: InvalidationSignal::new(),
        handle,
        shutdown: CancellationToken::new(),
      }),
    }
  }

  /// The display label for a node's current state.
  ///
  /// Never blocks. On a cache hit this returns the label for the current
  /// state; on a miss it schedules an evaluation (unless one is already
  /// running for this state) and returns the last known label, or `""` if
  /// there is none yet. Node types without a usable price badge always
  /// give `""`.
  pub fn label<N: NodeView + ?Sized>(&self, node: &N) -> String {
    let Some(compiled) = self.rule_for(node.node_type()) else {
      return String::new();
    };
    if compiled.is_failed() {
      return String::new();
    }

    let context = build_context(node, compiled.rule());
    let signature = sign(&context, compiled.rule());

    let mut nodes = self.inner.lock_nodes();
    let slot = nodes.entry(node.node_id().to_string()).or_default();

    if let Some(entry) = &slot.cached
      && entry.signature == signature
    {
      return entry.label.clone();
    }

    slot.desired = Some(signature.clone());

    if !slot.is_running(&signature) && !self.inner.shutdown.is_cancelled() {
      let task_id = uuid::Uuid::new_v4().to_string();
      slot.in_flight = Some(InFlight {
        signature: signature.clone(),
        task_id: task_id.clone(),
      });
      self.spawn_evaluation(node.node_id(), task_id, compiled, context, signature);
    }

    slot
      .cached
      .as_ref()
      .map(|entry| entry.label.clone())
      .unwrap_or_default()
  }

  /// The price badge declaration for a node's type, for debugging.
  pub fn pricing_config<N: NodeView + ?Sized>(&self, node: &N) -> Option<PricingDef> {
    self.inner.definitions.pricing(node.node_type()).cloned()
  }

  /// Every widget, input and input group name a node type's price depends on.
  ///
  /// Lets the caller know which state changes should trigger a re-render.
  pub fn relevant_dependency_names(&self, node_type: &str) -> Vec<String> {
    self
      .inner
      .definitions
      .pricing(node_type)
      .map(|def| def.depends_on.all_names())
      .unwrap_or_default()
  }

  /// The compiled rule for a node type, compiling it on first use.
  ///
  /// Returns `None` if the node type declares no price badge.
  pub fn rule_for(&self, node_type: &str) -> Option<Arc<CompiledRule>> {
    if let Some(compiled) = self.inner.rules.get(node_type) {
      return Some(compiled);
    }
    let def = self.inner.definitions.pricing(node_type)?;
    Some(
      self
        .inner
        .rules
        .get_or_compile(node_type, def, &self.inner.engines),
    )
  }

  /// Bumped every time an evaluation settles.
  pub fn signal(&self) -> &InvalidationSignal {
    &self.inner.signal
  }

  /// Whether an evaluation is running for a node.
  pub fn is_pending(&self, node_id: &str) -> bool {
    self
      .inner
      .lock_nodes()
      .get(node_id)
      .is_some_and(|slot| slot.in_flight.is_some())
  }

  /// Drop all pricing state for a node. Call when the node is removed.
  ///
  /// An evaluation still running for the node is discarded when it settles.
  pub fn release(&self, node_id: &str) {
    if self.inner.lock_nodes().remove(node_id).is_some() {
      debug!(node_id = %node_id, "released price badge state");
    }
  }

  /// Forget every compiled rule and cached label.
  ///
  /// Declarations are recompiled on next use. Running evaluations are
  /// discarded when they settle.
  pub fn reset_rules(&self) {
    self.inner.rules.reset();
    self.inner.lock_nodes().clear();
    info!("price badge rules reset");
    self.inner.signal.bump();
  }

  /// Stop running evaluations and schedule no new ones.
  ///
  /// Cached labels remain available.
  pub fn shutdown(&self) {
    self.inner.shutdown.cancel();
  }

  fn spawn_evaluation(
    &self,
    node_id: &str,
    task_id: String,
    compiled: Arc<CompiledRule>,
    context: EvaluationContext,
    signature: Signature,
  ) {
    debug!(
      node_id = %node_id,
      task_id = %task_id,
      signature = %signature,
      "scheduling price badge evaluation"
    );

    let inner = self.inner.clone();
    let node_id = node_id.to_string();
    self.inner.handle.spawn(async move {
      inner
        .evaluate(node_id, task_id, compiled, context, signature)
        .await;
    });
  }
}

impl Inner {
  fn lock_nodes(&self) -> MutexGuard<'_, HashMap<String, NodeSlot>> {
    self.nodes.lock().unwrap_or_else(PoisonError::into_inner)
  }

  #[instrument(
    name = "badge_evaluate",
    skip(self, compiled, context, signature),
    fields(node_id = %node_id, task_id = %task_id)
  )]
  async fn evaluate(
    &self,
    node_id: String,
    task_id: String,
    compiled: Arc<CompiledRule>,
    context: EvaluationContext,
    signature: Signature,
  ) {
    let label = tokio::select! {
      label = self.run(&compiled, &context) => Some(label),
      _ = self.shutdown.cancelled() => None,
    };

    match label {
      Some(label) => self.settle(&node_id, &task_id, &signature, label),
      None => {
        debug!("evaluation cancelled by shutdown");
        self.finish(&node_id, &task_id);
      }
    }

    self.signal.bump();
  }

  /// Evaluate and format. Any failure, including a panicking engine, gives "".
  async fn run(&self, compiled: &CompiledRule, context: &EvaluationContext) -> String {
    let Some((engine, expr)) = compiled.program() else {
      return String::new();
    };

    let outcome = AssertUnwindSafe(engine.evaluate(expr, context))
      .catch_unwind()
      .await;

    match outcome {
      Ok(Ok(value)) => self
        .formatter
        .format_value(&value, &compiled.rule().result_defaults),
      Ok(Err(e)) => {
        log_evaluation_error(&e.to_string());
        String::new()
      }
      Err(_) => {
        log_evaluation_error("expression engine panicked");
        String::new()
      }
    }
  }

  /// Commit a settled label if it is still the one wanted.
  fn settle(&self, node_id: &str, task_id: &str, signature: &Signature, label: String) {
    let mut nodes = self.lock_nodes();
    let Some(slot) = nodes.get_mut(node_id) else {
      debug!("node released before evaluation settled, discarding");
      return;
    };

    if slot.desired.as_ref() == Some(signature) {
      debug!(label = %label, "price badge updated");
      slot.cached = Some(CacheEntry {
        signature: signature.clone(),
        label,
      });
    } else {
      debug!(signature = %signature, "discarding superseded evaluation");
    }

    slot.finish(task_id);
  }

  fn finish(&self, node_id: &str, task_id: &str) {
    if let Some(slot) = self.lock_nodes().get_mut(node_id) {
      slot.finish(task_id);
    }
  }
}

/// Evaluation errors are expected for some states; only surface them while
/// developing rules.
fn log_evaluation_error(error: &str) {
  if cfg!(debug_assertions) {
    warn!(error = %error, "price badge evaluation failed");
  }
}
