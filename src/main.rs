use std::collections::BTreeMap;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use pricetag_expr::EngineRegistry;
use pricetag_expr_lua::LuaEngine;
use pricetag_runtime::{BadgeRuntime, NodeSnapshot, RuntimeConfig, StaticDefinitions};

/// Pricetag - price badges for workflow nodes
#[derive(Parser)]
#[command(name = "pricetag")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.pricetag)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Path to the node type definitions (default: <data-dir>/definitions.json)
  #[arg(long, global = true)]
  definitions: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Compute price badge labels for node snapshots
  Label {
    /// Path to a node snapshot or an array of them (default: stdin)
    nodes_file: Option<PathBuf>,

    /// How long to wait for evaluations to settle
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,
  },

  /// List the widgets and inputs a node type's price depends on
  Deps {
    /// The node type name
    node_type: String,
  },

  /// Print a node type's price badge declaration
  Config {
    /// The node type name
    node_type: String,
  },

  /// Compile every price badge and report failures
  Check,
}

/// One snapshot or many.
#[derive(Deserialize)]
#[serde(untagged)]
enum NodesInput {
  One(NodeSnapshot),
  Many(Vec<NodeSnapshot>),
}

impl NodesInput {
  fn into_vec(self) -> Vec<NodeSnapshot> {
    match self {
      NodesInput::One(node) => vec![node],
      NodesInput::Many(nodes) => nodes,
    }
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".pricetag"),
  };
  let definitions_file = cli
    .definitions
    .unwrap_or_else(|| data_dir.join("definitions.json"));

  let Some(command) = cli.command else {
    println!("pricetag - use --help to see available commands");
    return Ok(());
  };

  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(async {
    match command {
      Commands::Label {
        nodes_file,
        timeout_ms,
      } => {
        label_nodes(
          &definitions_file,
          nodes_file,
          Duration::from_millis(timeout_ms),
        )
        .await
      }
      Commands::Deps { node_type } => print_deps(&definitions_file, &node_type).await,
      Commands::Config { node_type } => print_config(&definitions_file, &node_type).await,
      Commands::Check => check_definitions(&definitions_file).await,
    }
  })
}

async fn load_definitions(path: &Path) -> Result<StaticDefinitions> {
  StaticDefinitions::load(path)
    .await
    .with_context(|| format!("failed to load definitions: {}", path.display()))
}

fn create_runtime(definitions: Arc<StaticDefinitions>) -> Result<BadgeRuntime> {
  let lua = LuaEngine::new().context("failed to create lua engine")?;
  let engines = EngineRegistry::new().with(Arc::new(lua));
  BadgeRuntime::new(RuntimeConfig::default(), definitions, engines)
    .context("failed to create badge runtime")
}

async fn label_nodes(
  definitions_file: &Path,
  nodes_file: Option<PathBuf>,
  timeout: Duration,
) -> Result<()> {
  let definitions = Arc::new(load_definitions(definitions_file).await?);
  eprintln!("Loaded {} price badge declarations", definitions.len());

  let nodes = read_nodes(nodes_file).await?;
  let runtime = create_runtime(definitions)?;

  // Subscribe before the first request so no settlement is missed.
  let mut changes = runtime.signal().subscribe();
  let deadline = tokio::time::Instant::now() + timeout;

  let labels = loop {
    let labels: BTreeMap<String, String> = nodes
      .iter()
      .map(|node| (node.node_id.clone(), runtime.label(node)))
      .collect();

    let pending: Vec<&str> = nodes
      .iter()
      .map(|node| node.node_id.as_str())
      .filter(|node_id| runtime.is_pending(node_id))
      .collect();
    if pending.is_empty() {
      break labels;
    }

    match tokio::time::timeout_at(deadline, changes.changed()).await {
      Ok(Ok(())) => continue,
      Ok(Err(_)) => bail!("invalidation signal closed"),
      Err(_) => {
        warn!(pending = ?pending, "timed out waiting for price badges");
        break labels;
      }
    }
  };

  runtime.shutdown();

  println!("{}", serde_json::to_string_pretty(&labels)?);

  Ok(())
}

async fn print_deps(definitions_file: &Path, node_type: &str) -> Result<()> {
  let definitions = Arc::new(load_definitions(definitions_file).await?);
  let runtime = create_runtime(definitions)?;

  let names = runtime.relevant_dependency_names(node_type);
  println!("{}", serde_json::to_string_pretty(&names)?);

  Ok(())
}

async fn print_config(definitions_file: &Path, node_type: &str) -> Result<()> {
  let definitions = Arc::new(load_definitions(definitions_file).await?);
  let runtime = create_runtime(definitions)?;

  let node = NodeSnapshot::new("cli", node_type);
  let pricing = runtime
    .pricing_config(&node)
    .with_context(|| format!("node type '{}' has no price badge", node_type))?;

  println!("{}", serde_json::to_string_pretty(&pricing)?);

  Ok(())
}

async fn check_definitions(definitions_file: &Path) -> Result<()> {
  let definitions = Arc::new(load_definitions(definitions_file).await?);
  let runtime = create_runtime(definitions.clone())?;

  let node_types = definitions.node_types();
  let mut failed = 0;
  for node_type in &node_types {
    match runtime.rule_for(node_type) {
      Some(rule) if rule.is_failed() => {
        failed += 1;
        eprintln!(
          "FAIL {}: {}",
          node_type,
          rule.failure().unwrap_or("unknown error")
        );
      }
      Some(_) => eprintln!("ok   {}", node_type),
      None => {}
    }
  }

  if failed > 0 {
    bail!(
      "{} of {} price badges failed to compile",
      failed,
      node_types.len()
    );
  }

  eprintln!("All {} price badges compiled", node_types.len());

  Ok(())
}

async fn read_nodes(nodes_file: Option<PathBuf>) -> Result<Vec<NodeSnapshot>> {
  let content = match nodes_file {
    Some(path) => tokio::fs::read_to_string(&path)
      .await
      .with_context(|| format!("failed to read nodes file: {}", path.display()))?,
    None => read_stdin()?,
  };

  let input: NodesInput =
    serde_json::from_str(&content).context("failed to parse node snapshots")?;
  Ok(input.into_vec())
}

fn read_stdin() -> Result<String> {
  if io::stdin().is_terminal() {
    bail!("no nodes file given and nothing piped on stdin");
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read nodes from stdin")?;
  Ok(input)
}
