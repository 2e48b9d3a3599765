//! JSON REST API for the eKYC service.
//!
//! Exposes an axum [`Router`] over any [`VerificationService`] and
//! [`RecordStore`]. Authentication happens upstream: the gateway is expected
//! to set the `x-subject-id` header to the authenticated subject.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", ekyc_api::api_router(Arc::new(pipeline), Arc::new(store)))
//! ```

pub mod error;
pub mod records;
pub mod subjects;
pub mod verifications;

use std::sync::Arc;

use axum::{
  Json, Router,
  routing::{get, post},
};
use ekyc_core::{pipeline::VerificationService, store::RecordStore};
use serde_json::{Value, json};

pub use error::ApiError;

/// Shared state threaded through all handlers.
pub struct ApiState<V, S> {
  pub service: Arc<V>,
  pub store:   Arc<S>,
}

impl<V, S> Clone for ApiState<V, S> {
  fn clone(&self) -> Self {
    Self { service: self.service.clone(), store: self.store.clone() }
  }
}

/// Build a fully-materialised API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<V, S>(service: Arc<V>, store: Arc<S>) -> Router<()>
where
  V: VerificationService + 'static,
  S: RecordStore + 'static,
{
  Router::new()
    .route("/health", get(health))
    // Verification
    .route("/verifications", post(verifications::create::<V, S>))
    // Subjects
    .route("/subjects", post(subjects::create::<V, S>))
    .route("/subjects/{id}/profile", get(subjects::profile::<V, S>))
    .route("/subjects/{id}/records", get(subjects::records::<V, S>))
    // Records
    .route("/records/{id}", get(records::get_one::<V, S>))
    .route("/records/{id}/review", post(records::review::<V, S>))
    .with_state(ApiState { service, store })
}

/// `GET /health`
async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }
