use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use mlua::{
  Function, HookTriggers, Lua, LuaOptions, LuaSerdeExt, SerializeOptions, StdLib, Table, VmState,
};
use pricetag_expr::{CompiledExpr, EvaluationContext, ExprError, ExpressionEngine};
use tracing::debug;

/// Engine id declarations use to select Lua expressions.
pub const ENGINE_ID: &str = "expr-v1";

const CHUNK_NAME: &str = "=price_badge";

/// How often (in VM instructions) the budget hook runs.
const HOOK_INTERVAL: u32 = 1_000;

/// Limits applied to every Lua evaluation.
#[derive(Debug, Clone)]
pub struct LuaEngineConfig {
  /// Maximum VM instructions per evaluation.
  pub instruction_limit: u64,
  /// Maximum memory one compiled expression's Lua state may allocate, in bytes.
  pub memory_limit: Option<usize>,
}

impl Default for LuaEngineConfig {
  fn default() -> Self {
    Self {
      instruction_limit: 1_000_000,
      memory_limit: Some(16 * 1024 * 1024),
    }
  }
}

/// [`ExpressionEngine`] backed by sandboxed Lua 5.4 states.
///
/// Every compiled expression owns its Lua state, so compiling never waits on
/// a running evaluation and rules cannot see each other's globals.
/// Evaluations run on tokio's blocking pool.
pub struct LuaEngine {
  id: String,
  config: LuaEngineConfig,
}

impl LuaEngine {
  /// Create an engine registered as [`ENGINE_ID`] with default limits.
  pub fn new() -> Result<Self, ExprError> {
    Self::with_config(ENGINE_ID, LuaEngineConfig::default())
  }

  /// Create an engine with a custom id and limits.
  ///
  /// Fails if a Lua state cannot be created under `config`.
  pub fn with_config(id: impl Into<String>, config: LuaEngineConfig) -> Result<Self, ExprError> {
    create_state(&config)
      .map_err(|e| ExprError::evaluate(format!("failed to create lua state: {}", e)))?;

    Ok(Self {
      id: id.into(),
      config,
    })
  }
}

#[async_trait]
impl ExpressionEngine for LuaEngine {
  fn id(&self) -> &str {
    &self.id
  }

  fn compile(&self, source: &str) -> Result<CompiledExpr, ExprError> {
    if source.trim().is_empty() {
      return Err(ExprError::compile("expression is empty"));
    }

    let lua = create_state(&self.config)
      .map_err(|e| ExprError::compile(format!("failed to create lua state: {}", e)))?;

    let function = match load(&lua, &expression_chunk(source)) {
      Ok(function) => function,
      Err(expr_error) => {
        debug!(error = %expr_error, "not a lua expression, trying statement block");
        load(&lua, &block_chunk(source)).map_err(|_| ExprError::compile(expr_error.to_string()))?
      }
    };

    let env_meta = sandbox_env_meta(&lua).map_err(|e| ExprError::compile(e.to_string()))?;

    Ok(CompiledExpr::new(LuaProgram {
      state: Mutex::new(LuaState {
        function,
        env_meta,
        lua,
      }),
    }))
  }

  async fn evaluate(
    &self,
    expr: &CompiledExpr,
    context: &EvaluationContext,
  ) -> Result<serde_json::Value, ExprError> {
    let program = expr
      .downcast_arc::<LuaProgram>()
      .ok_or_else(|| ExprError::ForeignHandle {
        engine: self.id.clone(),
      })?;

    let context = context.clone();
    let abandon = AbandonOnDrop::default();
    let budget = CallBudget::new(self.config.instruction_limit, abandon.flag());

    tokio::task::spawn_blocking(move || program.call(&context, budget))
      .await
      .map_err(|e| ExprError::evaluate(format!("lua evaluation did not finish: {}", e)))?
      .map_err(|e| ExprError::evaluate(e.to_string()))
  }
}

/// One compiled expression and the Lua state it runs in.
struct LuaProgram {
  state: Mutex<LuaState>,
}

// Handles are declared before the state so they drop first.
struct LuaState {
  function: Function,
  /// Metatable giving each call's fresh environment read access to the
  /// loaded libraries.
  env_meta: Table,
  lua: Lua,
}

impl LuaProgram {
  fn call(
    &self,
    context: &EvaluationContext,
    budget: CallBudget,
  ) -> Result<serde_json::Value, mlua::Error> {
    let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
    let lua = &state.lua;

    // Globals assigned by one evaluation must not leak into the next.
    let env = lua.create_table()?;
    env.set_metatable(Some(state.env_meta.clone()));
    state.function.set_environment(env)?;

    let widgets = lua.to_value_with(&context.widgets, serialize_options())?;
    let inputs = lua.to_value_with(&context.inputs, serialize_options())?;
    let input_groups = lua.to_value_with(&context.input_groups, serialize_options())?;

    lua.set_app_data(budget);
    let result: Result<mlua::Value, _> = state.function.call((widgets, inputs, input_groups));
    lua.remove_app_data::<CallBudget>();

    lua.from_value(result?)
  }
}

/// Instruction budget for a single call, read by the VM hook.
struct CallBudget {
  limit: u64,
  spent: AtomicU64,
  abandoned: Arc<AtomicBool>,
}

impl CallBudget {
  fn new(limit: u64, abandoned: Arc<AtomicBool>) -> Self {
    Self {
      limit,
      spent: AtomicU64::new(0),
      abandoned,
    }
  }

  fn charge(&self, instructions: u64) -> Result<(), mlua::Error> {
    if self.abandoned.load(Ordering::Relaxed) {
      return Err(mlua::Error::RuntimeError(
        "evaluation abandoned by caller".to_string(),
      ));
    }
    let spent = self.spent.fetch_add(instructions, Ordering::Relaxed) + instructions;
    if spent > self.limit {
      return Err(mlua::Error::RuntimeError(format!(
        "instruction limit of {} exceeded",
        self.limit
      )));
    }
    Ok(())
  }
}

/// Stops the matching call at its next hook once the evaluate future is
/// dropped, e.g. when the runtime shuts down.
#[derive(Default)]
struct AbandonOnDrop(Arc<AtomicBool>);

impl AbandonOnDrop {
  fn flag(&self) -> Arc<AtomicBool> {
    self.0.clone()
  }
}

impl Drop for AbandonOnDrop {
  fn drop(&mut self) {
    self.0.store(true, Ordering::Relaxed);
  }
}

fn create_state(config: &LuaEngineConfig) -> Result<Lua, mlua::Error> {
  let lua = Lua::new_with(
    StdLib::MATH | StdLib::STRING | StdLib::TABLE,
    LuaOptions::default(),
  )?;

  if let Some(limit) = config.memory_limit {
    lua.set_memory_limit(limit)?;
  }

  lua.set_hook(
    HookTriggers::new().every_nth_instruction(HOOK_INTERVAL),
    |lua, _debug| {
      if let Some(budget) = lua.app_data_ref::<CallBudget>() {
        budget.charge(u64::from(HOOK_INTERVAL))?;
      }
      Ok(VmState::Continue)
    },
  );

  Ok(lua)
}

fn load(lua: &Lua, chunk: &str) -> Result<Function, mlua::Error> {
  lua.load(chunk).set_name(CHUNK_NAME).into_function()
}

fn sandbox_env_meta(lua: &Lua) -> Result<Table, mlua::Error> {
  let meta = lua.create_table()?;
  meta.set("__index", lua.globals())?;
  Ok(meta)
}

fn expression_chunk(source: &str) -> String {
  format!(
    "local widgets, inputs, input_groups = ...\nreturn (\n{}\n)",
    source
  )
}

fn block_chunk(source: &str) -> String {
  format!("local widgets, inputs, input_groups = ...\n{}", source)
}

/// Nulls become `nil` so that `widgets.x.n == nil` works as expected.
fn serialize_options() -> SerializeOptions {
  SerializeOptions::new()
    .serialize_none_to_null(false)
    .serialize_unit_to_null(false)
}
