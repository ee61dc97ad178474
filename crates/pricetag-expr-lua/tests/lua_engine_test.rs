//! Integration tests for the Lua expression engine.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use pricetag_expr::{
  CompiledExpr, EvaluationContext, ExprError, ExpressionEngine, InputGroupState, InputState,
  normalize,
};
use pricetag_expr_lua::{ENGINE_ID, LuaEngine, LuaEngineConfig};
use serde_json::json;

fn context_with_widget(name: &str, value: serde_json::Value) -> EvaluationContext {
  EvaluationContext {
    widgets: HashMap::from([(name.to_string(), normalize(&value))]),
    ..Default::default()
  }
}

#[tokio::test]
async fn test_evaluate_usd_expression() {
  let engine = LuaEngine::new().expect("failed to create engine");
  let compiled = engine
    .compile(r#"{ type = "usd", usd = widgets.quality.s == "high" and 5 or 1 }"#)
    .expect("expression should compile");

  let low = engine
    .evaluate(&compiled, &context_with_widget("quality", json!("Low")))
    .await
    .expect("evaluation should succeed");
  let high = engine
    .evaluate(&compiled, &context_with_widget("quality", json!(" HIGH ")))
    .await
    .expect("evaluation should succeed");

  assert_eq!(low, json!({ "type": "usd", "usd": 1 }));
  assert_eq!(high, json!({ "type": "usd", "usd": 5 }));
}

#[tokio::test]
async fn test_statement_block_is_accepted() {
  let engine = LuaEngine::new().expect("failed to create engine");
  let compiled = engine
    .compile(
      r#"
      local steps = widgets.steps.n or 20
      return { type = "usd", usd = steps * 0.01 }
      "#,
    )
    .expect("block should compile");

  let value = engine
    .evaluate(&compiled, &context_with_widget("steps", json!("50")))
    .await
    .expect("evaluation should succeed");

  assert_eq!(value["usd"], json!(0.5));
}

#[tokio::test]
async fn test_null_projections_are_nil() {
  let engine = LuaEngine::new().expect("failed to create engine");
  let compiled = engine
    .compile(r#"{ type = "text", text = (widgets.seed.n == nil and widgets.seed.b == nil) and "nil" or "set" }"#)
    .expect("expression should compile");

  let value = engine
    .evaluate(&compiled, &context_with_widget("seed", json!(null)))
    .await
    .expect("evaluation should succeed");

  assert_eq!(value["text"], "nil");
}

#[tokio::test]
async fn test_inputs_and_groups_are_visible() {
  let engine = LuaEngine::new().expect("failed to create engine");
  let compiled = engine
    .compile(
      r#"{ type = "usd", usd = (inputs.image.connected and 2 or 0) + input_groups.refs.connected_count }"#,
    )
    .expect("expression should compile");

  let context = EvaluationContext {
    inputs: HashMap::from([("image".to_string(), InputState { connected: true })]),
    input_groups: HashMap::from([(
      "refs".to_string(),
      InputGroupState { connected_count: 3 },
    )]),
    ..Default::default()
  };

  let value = engine
    .evaluate(&compiled, &context)
    .await
    .expect("evaluation should succeed");

  assert_eq!(value["usd"], json!(5));
}

#[test]
fn test_syntax_error_is_a_compile_error() {
  let engine = LuaEngine::new().expect("failed to create engine");

  let result = engine.compile("{ type = ");

  assert!(matches!(result, Err(ExprError::Compile { .. })));
}

#[test]
fn test_empty_expression_is_a_compile_error() {
  let engine = LuaEngine::new().expect("failed to create engine");

  assert!(matches!(
    engine.compile("   "),
    Err(ExprError::Compile { .. })
  ));
}

#[tokio::test]
async fn test_runtime_error_is_an_evaluate_error() {
  let engine = LuaEngine::new().expect("failed to create engine");
  let compiled = engine
    .compile(r#"widgets.missing.n + 1"#)
    .expect("expression should compile");

  let result = engine.evaluate(&compiled, &EvaluationContext::default()).await;

  assert!(matches!(result, Err(ExprError::Evaluate { .. })));
}

#[tokio::test]
async fn test_runaway_expression_hits_instruction_limit() {
  let config = LuaEngineConfig {
    instruction_limit: 10_000,
    ..Default::default()
  };
  let engine = LuaEngine::with_config(ENGINE_ID, config).expect("failed to create engine");
  let compiled = engine
    .compile("while true do end")
    .expect("block should compile");

  let result = engine.evaluate(&compiled, &EvaluationContext::default()).await;

  match result {
    Err(ExprError::Evaluate { message }) => assert!(message.contains("instruction limit")),
    other => panic!("expected instruction limit error, got {:?}", other),
  }
}

#[tokio::test]
async fn test_foreign_handle_is_rejected() {
  let engine = LuaEngine::new().expect("failed to create engine");
  let foreign = CompiledExpr::new("not lua".to_string());

  let result = engine.evaluate(&foreign, &EvaluationContext::default()).await;

  assert_eq!(
    result,
    Err(ExprError::ForeignHandle {
      engine: ENGINE_ID.to_string()
    })
  );
}

#[tokio::test]
async fn test_io_library_is_not_loaded() {
  let engine = LuaEngine::new().expect("failed to create engine");
  let compiled = engine.compile("io == nil and os == nil").expect("should compile");

  let value = engine
    .evaluate(&compiled, &EvaluationContext::default())
    .await
    .expect("evaluation should succeed");

  assert_eq!(value, json!(true));
}

#[tokio::test]
async fn test_globals_do_not_persist_between_evaluations() {
  let engine = LuaEngine::new().expect("failed to create engine");
  let compiled = engine
    .compile("counter = (counter or 0) + 1\nreturn { type = 'usd', usd = counter }")
    .expect("block should compile");

  for _ in 0..3 {
    let value = engine
      .evaluate(&compiled, &EvaluationContext::default())
      .await
      .expect("evaluation should succeed");
    assert_eq!(value["usd"], json!(1));
  }
}

#[tokio::test]
async fn test_expressions_do_not_share_globals() {
  let engine = LuaEngine::new().expect("failed to create engine");
  let writer = engine
    .compile("shared = 'leaked'\nreturn true")
    .expect("block should compile");
  let reader = engine
    .compile("shared == nil")
    .expect("expression should compile");

  engine
    .evaluate(&writer, &EvaluationContext::default())
    .await
    .expect("evaluation should succeed");
  let value = engine
    .evaluate(&reader, &EvaluationContext::default())
    .await
    .expect("evaluation should succeed");

  assert_eq!(value, json!(true));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_compile_does_not_wait_for_running_evaluation() {
  let config = LuaEngineConfig {
    instruction_limit: u64::MAX,
    ..Default::default()
  };
  let engine = Arc::new(LuaEngine::with_config(ENGINE_ID, config).expect("failed to create engine"));
  let endless = engine
    .compile("while true do end")
    .expect("block should compile");

  let running = tokio::spawn({
    let engine = engine.clone();
    async move {
      engine
        .evaluate(&endless, &EvaluationContext::default())
        .await
    }
  });
  tokio::time::sleep(Duration::from_millis(100)).await;

  let started = Instant::now();
  let compiled = engine.compile("{ type = 'usd', usd = 1 }");
  assert!(compiled.is_ok());
  assert!(started.elapsed() < Duration::from_secs(1));

  // Dropping the evaluation stops the Lua call at its next hook.
  running.abort();
  assert!(running.await.unwrap_err().is_cancelled());
}
