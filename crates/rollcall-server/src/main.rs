//! `rollcall` server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), layers
//! `ROLLCALL_*` environment variables over it, opens the SQLite ledger, and
//! serves the JSON API over HTTP.
//!
//! ```toml
//! department   = "CSE"
//! store_path   = "~/.local/share/rollcall/ledger.db"
//! port         = 5240
//! # payload_secret = "..."   # sign QR payloads
//! # sign_payloads  = true    # sign with a per-process key when no secret is set
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use rollcall_server::{ServerConfig, expand_tilde};
use rollcall_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Rollcall attendance server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("ROLLCALL"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let state = server_cfg.app_state(Arc::new(store))?;
  if server_cfg.payload_secret.is_some() || server_cfg.sign_payloads {
    tracing::info!("payload signing enabled");
  }

  let app = rollcall_api::api_router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!(department = %server_cfg.department, "Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %e, "failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutting down");
}
