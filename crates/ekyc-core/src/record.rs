//! Persisted records: subjects, identity profiles, and verification records.
//!
//! A subject has at most one current [`IdentityProfile`] (last write wins) and
//! any number of [`VerificationRecord`]s. Records are append-only; the only
//! later change is a human review setting the verification status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::identity::ExtractedIdentity;

// ─── Statuses ────────────────────────────────────────────────────────────────

/// Outcome of the face-comparison stage.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
  Pending,
  Matched,
  NotMatched,
  /// The comparison could not produce a score.
  Error,
}

/// The approve/reject decision, automated or human.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
  Approved,
  Rejected,
}

/// Opaque reference returned by the image storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(pub String);

impl ImageRef {
  pub fn as_str(&self) -> &str { &self.0 }
}

impl std::fmt::Display for ImageRef {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

// ─── Subject ─────────────────────────────────────────────────────────────────

/// An account that can be verified. Owned by the account collaborator; the
/// pipeline only resolves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
  pub subject_id: Uuid,
  pub created_at: DateTime<Utc>,
}

// ─── Profile ─────────────────────────────────────────────────────────────────

/// The subject's current best-known attributes. Overwritten by every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityProfile {
  pub subject_id:   Uuid,
  pub identity:     ExtractedIdentity,
  pub selfie_image: Option<ImageRef>,
  pub updated_at:   DateTime<Utc>,
}

// ─── VerificationRecord ──────────────────────────────────────────────────────

/// The audit record of one verification run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRecord {
  pub id:                  Uuid,
  pub subject_user_id:     Uuid,
  pub created_at:          DateTime<Utc>,
  pub updated_at:          DateTime<Utc>,
  pub match_status:        MatchStatus,
  /// In `[0, 1]`; `1.0` means identical faces.
  pub similarity_score:    Option<f64>,
  pub extracted:           ExtractedIdentity,
  pub document_image_ref:  Option<ImageRef>,
  pub selfie_image_ref:    Option<ImageRef>,
  pub raw_transcription:   Option<String>,
  pub verification_status: Option<VerificationStatus>,
  pub verification_note:   Option<String>,
  pub verified_at:         Option<DateTime<Utc>>,
  /// Set only by a human reviewer; `None` for the automated decision.
  pub verified_by:         Option<String>,
}

/// Input to [`crate::store::RecordStore::review_record`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
  pub status:   VerificationStatus,
  pub reviewer: String,
  pub note:     Option<String>,
}
