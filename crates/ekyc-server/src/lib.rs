//! The eKYC server: configuration, collaborator wiring, and the HTTP app.
//!
//! The `server` binary only loads configuration and serves. Everything it
//! assembles is built here so the wiring can be exercised without a socket.

pub mod clients;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use axum::Router;
use ekyc_core::{
  collaborator::NoFallback,
  decision::DEFAULT_THRESHOLD,
  extract::Extractor,
  pipeline::{Pipeline, PipelineConfig, StageTimeouts, VerificationService},
  store::RecordStore,
};
use ekyc_store_sqlite::SqliteStore;
use serde::Deserialize;
use thiserror::Error;
use tower_http::trace::TraceLayer;

use clients::{
  Endpoint, Fallback, FsStorage, HttpFaces, HttpOcr, HttpStorage, OllamaFallback,
  Storage, http_client,
};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `EKYC_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  pub host:                 String,
  pub port:                 u16,
  pub store_path:           PathBuf,
  pub storage:              StorageConfig,
  pub ocr:                  ServiceConfig,
  pub face:                 ServiceConfig,
  #[serde(default)]
  pub fallback:             FallbackConfig,
  #[serde(default)]
  pub timeouts:             TimeoutConfig,
  #[serde(default = "default_threshold")]
  pub similarity_threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StorageConfig {
  Http { url: String },
  Fs { dir: PathBuf },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
  pub enabled: bool,
  pub url:     String,
  pub model:   String,
}

impl Default for FallbackConfig {
  fn default() -> Self {
    Self {
      enabled: false,
      url:     "http://localhost:11434".into(),
      model:   "gemma2:2b".into(),
    }
  }
}

/// Deadlines in whole seconds. `connect_secs` bounds connection setup on the
/// shared HTTP client; the rest are per-stage deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
  pub connect_secs:     u64,
  pub upload_secs:      u64,
  pub ocr_secs:         u64,
  pub face_secs:        u64,
  pub fallback_secs:    u64,
  pub persistence_secs: u64,
}

impl Default for TimeoutConfig {
  fn default() -> Self {
    let stages = StageTimeouts::default();
    Self {
      connect_secs:     5,
      upload_secs:      stages.upload.as_secs(),
      ocr_secs:         stages.ocr.as_secs(),
      face_secs:        stages.face.as_secs(),
      fallback_secs:    stages.fallback.as_secs(),
      persistence_secs: stages.persistence.as_secs(),
    }
  }
}

impl TimeoutConfig {
  pub fn stages(&self) -> StageTimeouts {
    StageTimeouts {
      upload:      Duration::from_secs(self.upload_secs),
      ocr:         Duration::from_secs(self.ocr_secs),
      face:        Duration::from_secs(self.face_secs),
      fallback:    Duration::from_secs(self.fallback_secs),
      persistence: Duration::from_secs(self.persistence_secs),
    }
  }
}

fn default_threshold() -> f64 { DEFAULT_THRESHOLD }

impl ServerConfig {
  pub fn validate(&self) -> Result<(), Error> {
    if !(0.0..=1.0).contains(&self.similarity_threshold) {
      return Err(Error::InvalidThreshold(self.similarity_threshold));
    }
    if self.fallback.enabled && self.fallback.model.trim().is_empty() {
      return Err(Error::MissingModel);
    }
    Ok(())
  }

  pub fn pipeline_config(&self) -> PipelineConfig {
    PipelineConfig {
      timeouts:             self.timeouts.stages(),
      similarity_threshold: self.similarity_threshold,
    }
  }
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("similarity_threshold must lie in [0, 1], got {0}")]
  InvalidThreshold(f64),

  #[error("fallback.model must be set when the fallback is enabled")]
  MissingModel,

  #[error("failed to build HTTP client: {0}")]
  Client(#[from] reqwest::Error),
}

// ─── Wiring ──────────────────────────────────────────────────────────────────

pub type ServerPipeline = Pipeline<Storage, HttpOcr, HttpFaces, SqliteStore, Fallback>;

/// Assemble the verification pipeline from configuration.
///
/// The extraction rule table is compiled here, once, and shared by every run.
pub fn build_pipeline(
  config: &ServerConfig,
  store: SqliteStore,
) -> Result<ServerPipeline, Error> {
  config.validate()?;

  let connect = Duration::from_secs(config.timeouts.connect_secs);
  let client = http_client(connect)?;
  let endpoint = |url: &str| Endpoint::new(client.clone(), url, connect);

  let storage = match &config.storage {
    StorageConfig::Http { url } => Storage::Http(HttpStorage::new(endpoint(url))),
    StorageConfig::Fs { dir } => Storage::Fs(FsStorage::new(expand_tilde(dir))),
  };
  let fallback = if config.fallback.enabled {
    Fallback::Ollama(OllamaFallback::new(
      endpoint(&config.fallback.url),
      config.fallback.model.clone(),
    ))
  } else {
    Fallback::Disabled(NoFallback)
  };

  let pipeline = Pipeline::new(
    storage,
    HttpOcr::new(endpoint(&config.ocr.url)),
    HttpFaces::new(endpoint(&config.face.url)),
    store,
    Arc::new(Extractor::new()),
  )
  .with_fallback(fallback)
  .with_config(config.pipeline_config());

  Ok(pipeline)
}

/// The public HTTP app: the JSON API with request tracing.
pub fn app<V, S>(service: Arc<V>, store: Arc<S>) -> Router
where
  V: VerificationService + 'static,
  S: RecordStore + 'static,
{
  ekyc_api::api_router(service, store).layer(TraceLayer::new_for_http())
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
