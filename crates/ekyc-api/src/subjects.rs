//! Handlers for `/subjects` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/subjects` | Registers a new subject |
//! | `GET`  | `/subjects/{id}/profile` | 404 if no profile yet |
//! | `GET`  | `/subjects/{id}/records` | Newest first |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use ekyc_core::{
  pipeline::VerificationService,
  record::{IdentityProfile, VerificationRecord},
  store::RecordStore,
};
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

/// `POST /subjects`
pub async fn create<V, S>(
  State(state): State<ApiState<V, S>>,
) -> Result<impl IntoResponse, ApiError>
where
  V: VerificationService + 'static,
  S: RecordStore + 'static,
{
  let subject = state.store.register_subject().await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(subject)))
}

/// `GET /subjects/{id}/profile`
pub async fn profile<V, S>(
  State(state): State<ApiState<V, S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<IdentityProfile>, ApiError>
where
  V: VerificationService + 'static,
  S: RecordStore + 'static,
{
  let profile = state
    .store
    .get_profile(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("no profile for subject {id}")))?;
  Ok(Json(profile))
}

/// `GET /subjects/{id}/records`
pub async fn records<V, S>(
  State(state): State<ApiState<V, S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<VerificationRecord>>, ApiError>
where
  V: VerificationService + 'static,
  S: RecordStore + 'static,
{
  let subject = state.store.resolve_subject(id).await.map_err(ApiError::store)?;
  if subject.is_none() {
    return Err(ApiError::NotFound(format!("subject {id} not found")));
  }
  let records = state.store.list_records(id).await.map_err(ApiError::store)?;
  Ok(Json(records))
}
