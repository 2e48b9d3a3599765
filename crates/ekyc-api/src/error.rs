//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use ekyc_core::pipeline::Stage;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// No caller identity was supplied.
  #[error("unauthorized: {0}")]
  Unauthorized(String),

  #[error(transparent)]
  Verification(#[from] ekyc_core::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("internal error: {0}")]
  Internal(String),
}

impl ApiError {
  pub(crate) fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }

  fn status(&self) -> StatusCode {
    use ekyc_core::Error as E;
    match self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      ApiError::Verification(e) => match e {
        E::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        E::InvalidInput(_) | E::MalformedText(_) => StatusCode::BAD_REQUEST,
        E::StageAborted { stage: Stage::UploadingSelfie, .. } => StatusCode::BAD_GATEWAY,
        E::StageAborted { .. } => StatusCode::INTERNAL_SERVER_ERROR,
      },
      ApiError::Store(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      error!(error = %self, "request failed");
    }
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}
