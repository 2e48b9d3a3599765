//! Image storage adapters.
//!
//! [`HttpStorage`] talks to the storage service; [`FsStorage`] writes
//! content-addressed files under a local directory. [`Storage`] picks one at
//! startup from configuration.

use std::path::PathBuf;

use bytes::Bytes;
use ekyc_core::{
  CollaboratorError,
  collaborator::{ImageKind, ImageStorage},
  record::ImageRef,
};
use reqwest::multipart::Form;
use serde::Deserialize;
use sha2::{Digest as _, Sha256};
use tracing::debug;

use super::{Endpoint, image_part};

// ─── HTTP ────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct UploadResponse {
  filename: String,
}

/// Uploads to `POST /upload/file/`; the stored file name is the reference.
#[derive(Debug, Clone)]
pub struct HttpStorage {
  endpoint: Endpoint,
}

impl HttpStorage {
  pub fn new(endpoint: Endpoint) -> Self { Self { endpoint } }
}

impl ImageStorage for HttpStorage {
  async fn upload(
    &self,
    image: Bytes,
    kind: ImageKind,
  ) -> Result<ImageRef, CollaboratorError> {
    let file_name = match kind {
      ImageKind::Selfie => "selfie.jpg",
      ImageKind::Document => "document.jpg",
    };
    let form = Form::new().part("file", image_part(image, file_name));
    let resp: UploadResponse =
      self.endpoint.post_multipart("/upload/file/", form).await?;

    if resp.filename.is_empty() {
      return Err(CollaboratorError::invalid_response(
        "storage service returned an empty file name",
      ));
    }
    Ok(ImageRef(resp.filename))
  }
}

// ─── Filesystem ──────────────────────────────────────────────────────────────

/// Stores each image at `{root}/{kind}/{sha256}`.
///
/// Identical uploads land on the same path, so re-submitting an image does not
/// grow the directory.
#[derive(Debug, Clone)]
pub struct FsStorage {
  root: PathBuf,
}

impl FsStorage {
  pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

  fn io_error(&self, e: std::io::Error) -> CollaboratorError {
    CollaboratorError::unavailable(format!("{}: {e}", self.root.display()))
  }
}

impl ImageStorage for FsStorage {
  async fn upload(
    &self,
    image: Bytes,
    kind: ImageKind,
  ) -> Result<ImageRef, CollaboratorError> {
    let digest = hex::encode(Sha256::digest(&image));
    let reference = format!("{}/{digest}", kind.as_str());
    let dir = self.root.join(kind.as_str());
    let path = dir.join(&digest);

    if tokio::fs::try_exists(&path).await.map_err(|e| self.io_error(e))? {
      debug!(%reference, "image already stored");
      return Ok(ImageRef(reference));
    }

    tokio::fs::create_dir_all(&dir).await.map_err(|e| self.io_error(e))?;
    // Write to a sibling then rename so a reader never sees a partial file.
    let partial = dir.join(format!("{digest}.partial"));
    tokio::fs::write(&partial, &image).await.map_err(|e| self.io_error(e))?;
    tokio::fs::rename(&partial, &path).await.map_err(|e| self.io_error(e))?;

    debug!(%reference, bytes = image.len(), "image stored");
    Ok(ImageRef(reference))
  }
}

// ─── Dispatch ────────────────────────────────────────────────────────────────

/// The storage backend selected by configuration.
#[derive(Debug, Clone)]
pub enum Storage {
  Http(HttpStorage),
  Fs(FsStorage),
}

impl ImageStorage for Storage {
  async fn upload(
    &self,
    image: Bytes,
    kind: ImageKind,
  ) -> Result<ImageRef, CollaboratorError> {
    match self {
      Self::Http(s) => s.upload(image, kind).await,
      Self::Fs(s) => s.upload(image, kind).await,
    }
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use axum::{Json, Router, extract::Multipart, routing::post};
  use serde_json::json;

  use super::*;
  use crate::clients::{http_client, test_server};

  #[tokio::test]
  async fn fs_storage_is_content_addressed() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FsStorage::new(dir.path());

    let first = storage
      .upload(Bytes::from_static(b"face"), ImageKind::Selfie)
      .await
      .unwrap();
    let again = storage
      .upload(Bytes::from_static(b"face"), ImageKind::Selfie)
      .await
      .unwrap();
    let other = storage
      .upload(Bytes::from_static(b"face"), ImageKind::Document)
      .await
      .unwrap();

    assert_eq!(first, again);
    assert!(first.0.starts_with("selfie/"));
    assert!(other.0.starts_with("document/"));
    assert_eq!(first.0.len(), "selfie/".len() + 64);

    let stored = std::fs::read(dir.path().join(&first.0)).unwrap();
    assert_eq!(stored, b"face");
  }

  #[tokio::test]
  async fn fs_storage_reports_unwritable_root() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("not-a-dir");
    std::fs::write(&file, b"").unwrap();

    let err = FsStorage::new(&file)
      .upload(Bytes::from_static(b"face"), ImageKind::Selfie)
      .await
      .unwrap_err();
    assert!(matches!(err, CollaboratorError::Unavailable { .. }));
  }

  #[tokio::test]
  async fn http_storage_returns_stored_file_name() {
    let app = Router::new().route(
      "/upload/file/",
      post(|mut form: Multipart| async move {
        let field = form.next_field().await.unwrap().unwrap();
        assert_eq!(field.name(), Some("file"));
        assert_eq!(field.file_name(), Some("selfie.jpg"));
        Json(json!({ "filename": "4f1c.jpg", "original_filename": "selfie.jpg" }))
      }),
    );
    let url = test_server::spawn(app).await;
    let client = http_client(Duration::from_secs(2)).unwrap();
    let storage =
      Storage::Http(HttpStorage::new(Endpoint::new(client, url, Duration::from_secs(2))));

    let reference = storage
      .upload(Bytes::from_static(b"face"), ImageKind::Selfie)
      .await
      .unwrap();
    assert_eq!(reference, ImageRef("4f1c.jpg".into()));
  }
}
