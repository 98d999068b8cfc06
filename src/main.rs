mod api;
mod app;
mod cache;
mod commands;
mod config;
mod event;
mod summary;
mod sync;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::io;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LogConfig;

#[derive(Parser, Debug)]
#[command(name = "consched")]
#[command(about = "An offline-first terminal client for convention schedules")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/consched/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Con instance to use
  #[arg(short, long)]
  instance: Option<String>,

  #[command(subcommand)]
  command: Option<Cmd>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Cmd {
  /// Print a summary of the con (default)
  Show,
  /// Refetch every resource, then print the summary
  Reload,
  /// Drop the local cache
  Clear,
  /// Keep running, follow updates and read commands from stdin
  Watch,
}

/// Logs go to stderr, or to `log.file` when set. `RUST_LOG` overrides the
/// default `warn` level.
fn init_tracing(log: &LogConfig) -> Result<Option<WorkerGuard>> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

  let Some(path) = &log.file else {
    tracing_subscriber::registry()
      .with(fmt::layer().with_writer(io::stderr))
      .with(filter)
      .init();
    return Ok(None);
  };

  let file_name = path
    .file_name()
    .ok_or_else(|| eyre!("Invalid log file path: {}", path.display()))?;
  let dir = match path.parent() {
    Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
    _ => PathBuf::from("."),
  };
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
  tracing_subscriber::registry()
    .with(fmt::layer().with_ansi(false).with_writer(writer))
    .with(filter)
    .init();
  Ok(Some(guard))
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  let _log_guard = init_tracing(&config.log)?;

  let instance = args
    .instance
    .or_else(|| config.default_instance.clone())
    .ok_or_else(|| eyre!("No con instance given. Pass --instance or set default_instance"))?;

  let mut app = app::App::new(&config, instance)?;
  match args.command.unwrap_or(Cmd::Show) {
    Cmd::Show => app.show().await?,
    Cmd::Reload => app.reload().await?,
    Cmd::Clear => app.clear()?,
    Cmd::Watch => app.watch().await?,
  }

  Ok(())
}
