//! The `RecordStore` trait: subjects, profiles, and the audit trail.
//!
//! The trait is implemented by storage backends (e.g. `ekyc-store-sqlite`).
//! The pipeline and the HTTP layer depend on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use uuid::Uuid;

use crate::{
  identity::ExtractedIdentity,
  record::{IdentityProfile, ImageRef, Review, Subject, VerificationRecord},
};

/// Abstraction over the account and persistence collaborator.
///
/// Verification records are append-only. The single permitted mutation is
/// [`RecordStore::review_record`], which a human reviewer issues out of band.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait RecordStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Subjects ──────────────────────────────────────────────────────────

  /// Create and persist a new subject.
  fn register_subject(
    &self,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + '_;

  /// Look up a subject by UUID. Returns `None` if it does not exist.
  fn resolve_subject(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + '_;

  // ── Profiles ──────────────────────────────────────────────────────────

  /// Write the subject's current profile, replacing any previous one.
  fn create_profile(
    &self,
    subject_id: Uuid,
    identity: ExtractedIdentity,
    selfie_image: Option<ImageRef>,
  ) -> impl Future<Output = Result<IdentityProfile, Self::Error>> + Send + '_;

  fn get_profile(
    &self,
    subject_id: Uuid,
  ) -> impl Future<Output = Result<Option<IdentityProfile>, Self::Error>> + Send + '_;

  // ── Verification records ──────────────────────────────────────────────

  /// Append a verification record. Records are never updated by the
  /// pipeline after this call.
  fn append_verification_record(
    &self,
    record: VerificationRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_record(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<VerificationRecord>, Self::Error>> + Send + '_;

  /// All records for a subject, newest first.
  fn list_records(
    &self,
    subject_id: Uuid,
  ) -> impl Future<Output = Result<Vec<VerificationRecord>, Self::Error>> + Send + '_;

  /// Apply a human review decision. Returns `None` if the record does not
  /// exist.
  fn review_record(
    &self,
    id: Uuid,
    review: Review,
  ) -> impl Future<Output = Result<Option<VerificationRecord>, Self::Error>> + Send + '_;
}
