//! Handlers for `/records` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/records/{id}` | 404 if not found |
//! | `POST` | `/records/{id}/review` | Body: `{"status":"APPROVED","reviewer":"...","note":null}` |

use axum::{
  Json,
  extract::{Path, State},
};
use ekyc_core::{
  pipeline::VerificationService,
  record::{Review, VerificationRecord},
  store::RecordStore,
};
use tracing::info;
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

/// `GET /records/{id}`
pub async fn get_one<V, S>(
  State(state): State<ApiState<V, S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<VerificationRecord>, ApiError>
where
  V: VerificationService + 'static,
  S: RecordStore + 'static,
{
  let record = state
    .store
    .get_record(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("record {id} not found")))?;
  Ok(Json(record))
}

/// `POST /records/{id}/review`
pub async fn review<V, S>(
  State(state): State<ApiState<V, S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<Review>,
) -> Result<Json<VerificationRecord>, ApiError>
where
  V: VerificationService + 'static,
  S: RecordStore + 'static,
{
  if body.reviewer.trim().is_empty() {
    return Err(ApiError::BadRequest("reviewer must not be empty".into()));
  }
  let status = body.status;
  let record = state
    .store
    .review_record(id, body)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("record {id} not found")))?;
  info!(record_id = %id, %status, "record reviewed");
  Ok(Json(record))
}
