//! Handler for the caller-facing verification operation.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/verifications` | Body: base64 `document_image`, `selfie_image`, optional `allow_fallback`; caller from `x-subject-id` |
//!
//! The run is detached from the request: if the client goes away the pipeline
//! still finishes and writes its audit record.

use axum::{
  Json,
  extract::State,
  http::HeaderMap,
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use bytes::Bytes;
use ekyc_core::{
  extract::ExtractOptions,
  pipeline::{
    Degradation, VerificationOutcome, VerificationReport, VerificationRequest,
    VerificationService,
  },
  store::RecordStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

/// Header carrying the authenticated caller, set by the gateway in front of
/// this service.
pub const SUBJECT_HEADER: &str = "x-subject-id";

#[derive(Debug, Deserialize)]
pub struct VerifyBody {
  pub document_image: String,
  pub selfie_image:   String,
  #[serde(default)]
  pub allow_fallback: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
  Verified,
  Degraded,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
  pub outcome:      OutcomeKind,
  #[serde(flatten)]
  pub report:       VerificationReport,
  pub degradations: Vec<Degradation>,
}

impl From<VerificationOutcome> for VerifyResponse {
  fn from(outcome: VerificationOutcome) -> Self {
    match outcome {
      VerificationOutcome::Verified(report) => Self {
        outcome: OutcomeKind::Verified,
        report,
        degradations: Vec::new(),
      },
      VerificationOutcome::Degraded { report, degradations } => Self {
        outcome: OutcomeKind::Degraded,
        report,
        degradations,
      },
    }
  }
}

/// `POST /verifications`
pub async fn create<V, S>(
  State(state): State<ApiState<V, S>>,
  headers: HeaderMap,
  Json(body): Json<VerifyBody>,
) -> Result<Json<VerifyResponse>, ApiError>
where
  V: VerificationService + 'static,
  S: RecordStore + 'static,
{
  let subject_user_id = subject_from(&headers)?;
  let request = VerificationRequest {
    document_image: decode_image("document_image", &body.document_image)?,
    selfie_image: decode_image("selfie_image", &body.selfie_image)?,
    subject_user_id,
    options: ExtractOptions { allow_fallback: body.allow_fallback },
  };

  let service = state.service.clone();
  let outcome = tokio::spawn(async move { service.verify(request).await })
    .await
    .map_err(|e| ApiError::Internal(format!("verification task failed: {e}")))??;

  Ok(Json(outcome.into()))
}

fn subject_from(headers: &HeaderMap) -> Result<Uuid, ApiError> {
  let value = headers
    .get(SUBJECT_HEADER)
    .ok_or_else(|| ApiError::Unauthorized(format!("missing {SUBJECT_HEADER} header")))?;
  value
    .to_str()
    .ok()
    .and_then(|s| Uuid::parse_str(s.trim()).ok())
    .ok_or_else(|| ApiError::BadRequest(format!("{SUBJECT_HEADER} is not a UUID")))
}

fn decode_image(name: &str, encoded: &str) -> Result<Bytes, ApiError> {
  let bytes = B64
    .decode(encoded.trim())
    .map_err(|e| ApiError::BadRequest(format!("{name} is not valid base64: {e}")))?;
  if bytes.is_empty() {
    return Err(ApiError::BadRequest(format!("{name} is empty")));
  }
  Ok(Bytes::from(bytes))
}
