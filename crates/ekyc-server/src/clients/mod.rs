//! HTTP and filesystem adapters for the pipeline's collaborators.
//!
//! Every adapter funnels its transport failures through [`Endpoint`], which
//! maps `reqwest` errors onto [`CollaboratorError`]. Overall call deadlines are
//! enforced by the pipeline; the client itself only bounds connection setup.

pub mod face;
pub mod fallback;
pub mod ocr;
pub mod storage;

use std::time::Duration;

use bytes::Bytes;
use ekyc_core::CollaboratorError;
use reqwest::multipart::{Form, Part};
use serde::{Serialize, de::DeserializeOwned};

pub use face::HttpFaces;
pub use fallback::{Fallback, OllamaFallback};
pub use ocr::HttpOcr;
pub use storage::{FsStorage, HttpStorage, Storage};

/// Build the `reqwest` client shared by every HTTP adapter.
pub fn http_client(connect_timeout: Duration) -> reqwest::Result<reqwest::Client> {
  reqwest::Client::builder().connect_timeout(connect_timeout).build()
}

// ─── Endpoint ────────────────────────────────────────────────────────────────

/// A base URL on a remote service plus the client used to reach it.
#[derive(Debug, Clone)]
pub struct Endpoint {
  client:          reqwest::Client,
  base_url:        String,
  connect_timeout: Duration,
}

impl Endpoint {
  pub fn new(
    client: reqwest::Client,
    base_url: impl Into<String>,
    connect_timeout: Duration,
  ) -> Self {
    let base_url = base_url.into().trim_end_matches('/').to_owned();
    Self { client, base_url, connect_timeout }
  }

  pub fn base_url(&self) -> &str { &self.base_url }

  fn url(&self, path: &str) -> String { format!("{}{path}", self.base_url) }

  pub(crate) async fn post_multipart<T: DeserializeOwned>(
    &self,
    path: &str,
    form: Form,
  ) -> Result<T, CollaboratorError> {
    let resp = self
      .client
      .post(self.url(path))
      .multipart(form)
      .send()
      .await
      .map_err(|e| self.send_error(e))?;
    self.read_json(resp).await
  }

  pub(crate) async fn post_json<B: Serialize, T: DeserializeOwned>(
    &self,
    path: &str,
    body: &B,
  ) -> Result<T, CollaboratorError> {
    let resp = self
      .client
      .post(self.url(path))
      .json(body)
      .send()
      .await
      .map_err(|e| self.send_error(e))?;
    self.read_json(resp).await
  }

  async fn read_json<T: DeserializeOwned>(
    &self,
    resp: reqwest::Response,
  ) -> Result<T, CollaboratorError> {
    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      return Err(CollaboratorError::Rejected { status: status.as_u16(), body });
    }
    let bytes = resp.bytes().await.map_err(|e| self.send_error(e))?;
    serde_json::from_slice(&bytes).map_err(|e| {
      CollaboratorError::invalid_response(format!(
        "{}: {e}",
        self.base_url
      ))
    })
  }

  /// Only connection setup carries a client-side deadline, so only a connect
  /// timeout is reported against `connect_timeout`.
  fn send_error(&self, e: reqwest::Error) -> CollaboratorError {
    match (e.is_connect(), e.is_timeout()) {
      (true, true) => CollaboratorError::timeout(self.connect_timeout),
      (true, false) => CollaboratorError::unavailable(format!(
        "cannot connect to {}: {e}",
        self.base_url
      )),
      (false, true) => CollaboratorError::other(format!(
        "request to {} timed out: {e}",
        self.base_url
      )),
      (false, false) => CollaboratorError::other(e.to_string()),
    }
  }
}

/// A multipart part carrying image bytes under a placeholder file name.
///
/// The upstream services read uploads as files, which requires a name.
pub(crate) fn image_part(image: Bytes, file_name: &'static str) -> Part {
  Part::bytes(image.to_vec()).file_name(file_name)
}

#[cfg(test)]
pub(crate) mod test_server {
  use axum::Router;
  use tokio::net::TcpListener;

  /// Serve `app` on an ephemeral local port and return its base URL.
  pub async fn spawn(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}")
  }
}
