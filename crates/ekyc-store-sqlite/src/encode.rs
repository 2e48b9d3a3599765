//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, UUIDs hyphenated lowercase strings, and
//! the extracted identity compact JSON.

use chrono::{DateTime, Utc};
use ekyc_core::{
  identity::ExtractedIdentity,
  record::{
    IdentityProfile, ImageRef, MatchStatus, Subject, VerificationRecord,
    VerificationStatus,
  },
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_identity(identity: &ExtractedIdentity) -> Result<String> {
  Ok(serde_json::to_string(identity)?)
}

pub fn decode_identity(s: &str) -> Result<ExtractedIdentity> {
  Ok(serde_json::from_str(s)?)
}

// ─── Statuses ────────────────────────────────────────────────────────────────

pub fn decode_match_status(s: &str) -> Result<MatchStatus> {
  s.parse().map_err(|_| Error::UnknownStatus {
    column: "match_status",
    value:  s.to_owned(),
  })
}

pub fn decode_verification_status(s: &str) -> Result<VerificationStatus> {
  s.parse().map_err(|_| Error::UnknownStatus {
    column: "verification_status",
    value:  s.to_owned(),
  })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `subjects` row.
pub struct RawSubject {
  pub subject_id: String,
  pub created_at: String,
}

impl RawSubject {
  pub fn into_subject(self) -> Result<Subject> {
    Ok(Subject {
      subject_id: decode_uuid(&self.subject_id)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from an `identity_profiles` row.
pub struct RawProfile {
  pub subject_id:    String,
  pub identity_json: String,
  pub selfie_image:  Option<String>,
  pub updated_at:    String,
}

impl RawProfile {
  pub fn into_profile(self) -> Result<IdentityProfile> {
    Ok(IdentityProfile {
      subject_id:   decode_uuid(&self.subject_id)?,
      identity:     decode_identity(&self.identity_json)?,
      selfie_image: self.selfie_image.map(ImageRef),
      updated_at:   decode_dt(&self.updated_at)?,
    })
  }
}

/// Column list shared by every `verification_records` query, in the order
/// [`RawRecord::from_row`] reads them.
pub const RECORD_COLUMNS: &str = "record_id, subject_user_id, created_at, \
  updated_at, match_status, similarity_score, extracted_json, \
  document_image_ref, selfie_image_ref, raw_transcription, \
  verification_status, verification_note, verified_at, verified_by";

/// Raw values read directly from a `verification_records` row.
pub struct RawRecord {
  pub record_id:           String,
  pub subject_user_id:     String,
  pub created_at:          String,
  pub updated_at:          String,
  pub match_status:        String,
  pub similarity_score:    Option<f64>,
  pub extracted_json:      String,
  pub document_image_ref:  Option<String>,
  pub selfie_image_ref:    Option<String>,
  pub raw_transcription:   Option<String>,
  pub verification_status: Option<String>,
  pub verification_note:   Option<String>,
  pub verified_at:         Option<String>,
  pub verified_by:         Option<String>,
}

impl RawRecord {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      record_id:           row.get(0)?,
      subject_user_id:     row.get(1)?,
      created_at:          row.get(2)?,
      updated_at:          row.get(3)?,
      match_status:        row.get(4)?,
      similarity_score:    row.get(5)?,
      extracted_json:      row.get(6)?,
      document_image_ref:  row.get(7)?,
      selfie_image_ref:    row.get(8)?,
      raw_transcription:   row.get(9)?,
      verification_status: row.get(10)?,
      verification_note:   row.get(11)?,
      verified_at:         row.get(12)?,
      verified_by:         row.get(13)?,
    })
  }

  pub fn encode(record: &VerificationRecord) -> Result<Self> {
    Ok(Self {
      record_id:           encode_uuid(record.id),
      subject_user_id:     encode_uuid(record.subject_user_id),
      created_at:          encode_dt(record.created_at),
      updated_at:          encode_dt(record.updated_at),
      match_status:        record.match_status.to_string(),
      similarity_score:    record.similarity_score,
      extracted_json:      encode_identity(&record.extracted)?,
      document_image_ref:  record.document_image_ref.as_ref().map(|r| r.0.clone()),
      selfie_image_ref:    record.selfie_image_ref.as_ref().map(|r| r.0.clone()),
      raw_transcription:   record.raw_transcription.clone(),
      verification_status: record.verification_status.map(|s| s.to_string()),
      verification_note:   record.verification_note.clone(),
      verified_at:         record.verified_at.map(encode_dt),
      verified_by:         record.verified_by.clone(),
    })
  }

  pub fn into_record(self) -> Result<VerificationRecord> {
    Ok(VerificationRecord {
      id:                  decode_uuid(&self.record_id)?,
      subject_user_id:     decode_uuid(&self.subject_user_id)?,
      created_at:          decode_dt(&self.created_at)?,
      updated_at:          decode_dt(&self.updated_at)?,
      match_status:        decode_match_status(&self.match_status)?,
      similarity_score:    self.similarity_score,
      extracted:           decode_identity(&self.extracted_json)?,
      document_image_ref:  self.document_image_ref.map(ImageRef),
      selfie_image_ref:    self.selfie_image_ref.map(ImageRef),
      raw_transcription:   self.raw_transcription,
      verification_status: self
        .verification_status
        .as_deref()
        .map(decode_verification_status)
        .transpose()?,
      verification_note:   self.verification_note,
      verified_at:         self.verified_at.as_deref().map(decode_dt).transpose()?,
      verified_by:         self.verified_by,
    })
  }
}
