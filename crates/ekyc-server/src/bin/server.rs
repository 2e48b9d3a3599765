//! ekyc server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), layers
//! `EKYC_*` environment variables over it, opens the SQLite record store, and
//! serves the verification API over HTTP.
//!
//! Nested keys use a double underscore in the environment, e.g.
//! `EKYC_TIMEOUTS__OCR_SECS=90` or `EKYC_FALLBACK__ENABLED=true`.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use ekyc_server::{ServerConfig, build_pipeline, expand_tilde};
use ekyc_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "eKYC document verification server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
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

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("EKYC")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store.
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let pipeline = build_pipeline(&server_cfg, store.clone())
    .context("failed to assemble verification pipeline")?;
  tracing::info!(
    fallback = server_cfg.fallback.enabled,
    threshold = server_cfg.similarity_threshold,
    "verification pipeline ready"
  );

  let app = ekyc_server::app(Arc::new(pipeline), Arc::new(store));
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
