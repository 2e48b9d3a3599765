//! Traits for the external services a verification run depends on.
//!
//! Implementations live outside this crate (`ekyc-server` ships HTTP and
//! filesystem adapters). Every adapter translates its transport failures into
//! a [`CollaboratorError`] so no transport-specific error type crosses this
//! boundary.

use std::{future::Future, time::Duration};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{identity::Field, record::ImageRef};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// The typed outcome of a failed collaborator call.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CollaboratorError {
  #[error("timed out after {millis}ms")]
  Timeout { millis: u64 },

  /// Connection refused, DNS failure, or similar.
  #[error("service unavailable: {message}")]
  Unavailable { message: String },

  /// The service answered with a non-2xx status.
  #[error("service rejected the request with status {status}: {body}")]
  Rejected { status: u16, body: String },

  /// The face comparator found no face in at least one of the images.
  #[error("no face detected")]
  NoFaceDetected,

  #[error("invalid response: {message}")]
  InvalidResponse { message: String },

  #[error("{message}")]
  Other { message: String },
}

impl CollaboratorError {
  /// A call that did not finish within `limit`.
  pub fn timeout(limit: Duration) -> Self {
    Self::Timeout { millis: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX) }
  }

  pub fn unavailable(message: impl Into<String>) -> Self {
    Self::Unavailable { message: message.into() }
  }

  pub fn invalid_response(message: impl Into<String>) -> Self {
    Self::InvalidResponse { message: message.into() }
  }

  pub fn other(message: impl Into<String>) -> Self {
    Self::Other { message: message.into() }
  }

  pub fn is_timeout(&self) -> bool { matches!(self, Self::Timeout { .. }) }
}

// ─── Storage ─────────────────────────────────────────────────────────────────

/// Which of the two submitted images is being stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
  Selfie,
  Document,
}

impl ImageKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Selfie => "selfie",
      Self::Document => "document",
    }
  }
}

/// Durable storage for raw image bytes.
pub trait ImageStorage: Send + Sync {
  fn upload(
    &self,
    image: Bytes,
    kind: ImageKind,
  ) -> impl Future<Output = Result<ImageRef, CollaboratorError>> + Send + '_;
}

// ─── OCR ─────────────────────────────────────────────────────────────────────

/// Image-to-text transcription.
pub trait Transcriber: Send + Sync {
  fn transcribe(
    &self,
    image: Bytes,
  ) -> impl Future<Output = Result<String, CollaboratorError>> + Send + '_;
}

// ─── Face similarity ─────────────────────────────────────────────────────────

/// Compares the faces in two images.
pub trait FaceComparator: Send + Sync {
  /// Returns the raw distance in `[0, 1]`; `0.0` means identical.
  fn compare(
    &self,
    selfie: Bytes,
    document: Bytes,
  ) -> impl Future<Output = Result<f64, CollaboratorError>> + Send + '_;
}

// ─── Remote extraction fallback ──────────────────────────────────────────────

/// A remote model asked to read fields the patterns missed.
///
/// Implementations return the model's raw reply. The extraction engine is
/// responsible for locating and validating the JSON object inside it.
pub trait ExtractionFallback: Send + Sync {
  fn infer<'a>(
    &'a self,
    text: &'a str,
    fields: &'a [Field],
  ) -> impl Future<Output = Result<String, CollaboratorError>> + Send + 'a;
}

/// A fallback that is never available. Lets a pipeline be built without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFallback;

impl ExtractionFallback for NoFallback {
  async fn infer<'a>(
    &'a self,
    _text: &'a str,
    _fields: &'a [Field],
  ) -> Result<String, CollaboratorError> {
    Err(CollaboratorError::unavailable("no extraction fallback configured"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sub_second_timeouts_keep_their_precision() {
    let err = CollaboratorError::timeout(Duration::from_millis(250));
    assert_eq!(err, CollaboratorError::Timeout { millis: 250 });
    assert_eq!(err.to_string(), "timed out after 250ms");
    assert!(err.is_timeout());
  }
}
