mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use conduit_config::{Config, LogConfig};
use conduit_engine::Engine;
use conduit_policy::{StaticTokenVerifier, TokenVerifier};
use conduit_store::{MemoryStore, Store};
use conduit_workflow::Registry;

/// Conduit - a workflow runtime for HTTP and file-watch triggers
#[derive(Parser)]
#[command(name = "conduit")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the config file (default: ~/.conduit/config.json when present)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Serve the HTTP workflows and run the file watchers
  Serve,

  /// Print the registered workflows
  Routes,
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let config_path = cli.config.or_else(default_config_path);
  let config = Config::load_or_default(config_path.as_deref())
    .with_context(|| match &config_path {
      Some(path) => format!("failed to load config: {}", path.display()),
      None => "failed to load default config".to_string(),
    })?;

  match cli.command {
    Some(Commands::Serve) => {
      init_tracing(&config.log)?;
      if let Some(path) = &config_path {
        info!(path = %path.display(), "config_loaded");
      }
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(serve(config))
    }
    Some(Commands::Routes) => print_routes(&config),
    None => {
      println!("conduit - use --help to see available commands");
      Ok(())
    }
  }
}

fn default_config_path() -> Option<PathBuf> {
  dirs::home_dir()
    .map(|home| home.join(".conduit").join("config.json"))
    .filter(|path| path.exists())
}

fn init_tracing(log: &LogConfig) -> Result<()> {
  let filter = EnvFilter::try_from_default_env()
    .or_else(|_| EnvFilter::try_new(&log.level))
    .context("failed to configure tracing level")?;

  let subscriber = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr);

  let installed = match log.json {
    true => subscriber.json().try_init(),
    false => subscriber.try_init(),
  };
  installed.map_err(|e| anyhow!(e))
}

fn build_registry(config: &Config) -> Result<Registry> {
  let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
  let verifier: Arc<dyn TokenVerifier> =
    Arc::new(StaticTokenVerifier::new(config.auth.tokens.clone()));

  routes::registry(config, store, verifier).context("failed to register workflows")
}

async fn serve(config: Config) -> Result<()> {
  let engine = Engine::new(build_registry(&config)?);
  let cancel = CancellationToken::new();

  tokio::spawn(shutdown_on_ctrl_c(cancel.clone()));

  let watchers = tokio::spawn({
    let engine = engine.clone();
    let cancel = cancel.clone();
    async move { engine.run_watchers(cancel).await }
  });

  let served = conduit_http::serve(
    engine,
    config.server.bind,
    config.server.body_limit_bytes,
    cancel.clone(),
  )
  .await;

  // Stop the watchers too when the server exits on its own.
  cancel.cancel();
  watchers.await.context("watch supervisors panicked")?;

  served.context("http server failed")?;
  info!("shutdown_complete");
  Ok(())
}

async fn shutdown_on_ctrl_c(cancel: CancellationToken) {
  match tokio::signal::ctrl_c().await {
    Ok(()) => {
      info!("shutdown_requested");
      cancel.cancel();
    }
    Err(e) => error!(error = %e, "signal_handler_failed"),
  }
}

fn print_routes(config: &Config) -> Result<()> {
  let registry = build_registry(config)?;

  let mut workflows: Vec<_> = registry.iter().collect();
  workflows.sort_by(|a, b| a.id().cmp(b.id()));

  for workflow in workflows {
    let policies = workflow.policies().names().join(", ");
    println!(
      "{:<16} {:<32} {:<10} {}",
      workflow.id(),
      workflow.trigger().describe(),
      workflow.tag(),
      policies
    );
  }
  Ok(())
}
