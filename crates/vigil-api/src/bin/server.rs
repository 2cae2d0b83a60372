//! Vigil server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered with
//! `VIGIL_*` environment variables, opens the SQLite store, and serves the
//! JSON API. With `scan_interval_secs` set, the escalation scan runs on an
//! internal timer; otherwise an external scheduler drives `POST /api/scan`.
//!
//! # Token generation
//!
//! To mint a token for `admin_token` in config.toml:
//!
//! ```
//! cargo run -p vigil-api --bin server -- --generate-token
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use vigil_api::{AppState, AuthConfig, ServerConfig, auth::generate_token};
use vigil_engine::Engine;
use vigil_store_sqlite::SqliteStore;

#[derive(Parser)]
#[command(author, version, about = "Vigil check-in server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print a fresh bearer token and exit.
  #[arg(long)]
  generate_token: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Helper mode: mint a token and exit.
  if cli.generate_token {
    println!("{}", generate_token());
    return Ok(());
  }

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("VIGIL"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Open the SQLite store.
  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  // Build the engine.
  let http = reqwest::Client::builder()
    .timeout(Duration::from_secs(10))
    .build()
    .context("failed to build http client")?;
  let engine = Engine::new(
    store,
    server_cfg.channel_set(http),
    server_cfg.engine_config(),
  );

  // Internal scan timer, if configured.
  if let Some(secs) = server_cfg.scan_interval_secs {
    let scanner = engine.clone();
    tracing::info!(interval_secs = secs, "starting internal scan timer");
    tokio::spawn(async move {
      let mut ticker = tokio::time::interval(Duration::from_secs(secs));
      loop {
        ticker.tick().await;
        match scanner.run_scan().await {
          Ok(report) => tracing::info!(
            scanned = report.scanned,
            to_grace = report.to_grace,
            escalated = report.escalated,
            "scan complete"
          ),
          Err(err) => tracing::error!(%err, "scan failed"),
        }
      }
    });
  }

  let state = AppState {
    engine,
    auth: Arc::new(AuthConfig::new(&server_cfg.admin_token)),
  };
  let app = vigil_api::api_router(state).layer(TraceLayer::new_for_http());

  let address = format!("{}:{}", server_cfg.host, server_cfg.port);
  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
