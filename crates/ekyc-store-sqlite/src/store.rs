//! [`SqliteStore`]: the SQLite implementation of [`RecordStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use tracing::debug;
use uuid::Uuid;

use ekyc_core::{
  identity::ExtractedIdentity,
  record::{IdentityProfile, ImageRef, Review, Subject, VerificationRecord},
  store::RecordStore,
};

use crate::{
  encode::{
    RECORD_COLUMNS, RawProfile, RawRecord, RawSubject, encode_dt, encode_identity,
    encode_uuid,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An eKYC record store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── RecordStore impl ────────────────────────────────────────────────────────

impl RecordStore for SqliteStore {
  type Error = Error;

  // ── Subjects ──────────────────────────────────────────────────────────────

  async fn register_subject(&self) -> Result<Subject> {
    let subject = Subject { subject_id: Uuid::new_v4(), created_at: Utc::now() };

    let id_str = encode_uuid(subject.subject_id);
    let at_str = encode_dt(subject.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO subjects (subject_id, created_at) VALUES (?1, ?2)",
          rusqlite::params![id_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    debug!(subject_id = %subject.subject_id, "subject registered");
    Ok(subject)
  }

  async fn resolve_subject(&self, id: Uuid) -> Result<Option<Subject>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawSubject> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT subject_id, created_at FROM subjects WHERE subject_id = ?1",
              rusqlite::params![id_str],
              |row| {
                Ok(RawSubject {
                  subject_id: row.get(0)?,
                  created_at: row.get(1)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSubject::into_subject).transpose()
  }

  // ── Profiles (last write wins) ───────────────────────────────────────────

  async fn create_profile(
    &self,
    subject_id: Uuid,
    identity: ExtractedIdentity,
    selfie_image: Option<ImageRef>,
  ) -> Result<IdentityProfile> {
    let profile = IdentityProfile {
      subject_id,
      identity,
      selfie_image,
      updated_at: Utc::now(),
    };

    let id_str = encode_uuid(subject_id);
    let json = encode_identity(&profile.identity)?;
    let selfie = profile.selfie_image.as_ref().map(|r| r.0.clone());
    let at_str = encode_dt(profile.updated_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO identity_profiles (subject_id, identity_json, selfie_image, updated_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (subject_id) DO UPDATE SET
             identity_json = excluded.identity_json,
             selfie_image  = excluded.selfie_image,
             updated_at    = excluded.updated_at",
          rusqlite::params![id_str, json, selfie, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(profile)
  }

  async fn get_profile(&self, subject_id: Uuid) -> Result<Option<IdentityProfile>> {
    let id_str = encode_uuid(subject_id);

    let raw: Option<RawProfile> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT subject_id, identity_json, selfie_image, updated_at
               FROM identity_profiles WHERE subject_id = ?1",
              rusqlite::params![id_str],
              |row| {
                Ok(RawProfile {
                  subject_id:    row.get(0)?,
                  identity_json: row.get(1)?,
                  selfie_image:  row.get(2)?,
                  updated_at:    row.get(3)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawProfile::into_profile).transpose()
  }

  // ── Verification records (append-only) ───────────────────────────────────

  async fn append_verification_record(&self, record: VerificationRecord) -> Result<()> {
    let raw = RawRecord::encode(&record)?;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "INSERT INTO verification_records ({RECORD_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
          ),
          rusqlite::params![
            raw.record_id,
            raw.subject_user_id,
            raw.created_at,
            raw.updated_at,
            raw.match_status,
            raw.similarity_score,
            raw.extracted_json,
            raw.document_image_ref,
            raw.selfie_image_ref,
            raw.raw_transcription,
            raw.verification_status,
            raw.verification_note,
            raw.verified_at,
            raw.verified_by,
          ],
        )?;
        Ok(())
      })
      .await?;

    debug!(record_id = %record.id, "verification record appended");
    Ok(())
  }

  async fn get_record(&self, id: Uuid) -> Result<Option<VerificationRecord>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawRecord> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {RECORD_COLUMNS} FROM verification_records WHERE record_id = ?1"
              ),
              rusqlite::params![id_str],
              RawRecord::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRecord::into_record).transpose()
  }

  async fn list_records(&self, subject_id: Uuid) -> Result<Vec<VerificationRecord>> {
    let id_str = encode_uuid(subject_id);

    // Insertion order is creation order; rowid avoids comparing timestamps
    // of varying precision as text.
    let raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RECORD_COLUMNS} FROM verification_records
           WHERE subject_user_id = ?1
           ORDER BY rowid DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawRecord::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }

  // ── Human review ──────────────────────────────────────────────────────────

  async fn review_record(
    &self,
    id: Uuid,
    review: Review,
  ) -> Result<Option<VerificationRecord>> {
    let id_str = encode_uuid(id);
    let status = review.status.to_string();
    let at_str = encode_dt(Utc::now());

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE verification_records SET
             verification_status = ?2,
             verification_note   = COALESCE(?3, verification_note),
             verified_by         = ?4,
             verified_at         = ?5,
             updated_at          = ?5
           WHERE record_id = ?1",
          rusqlite::params![id_str, status, review.note, review.reviewer, at_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Ok(None);
    }
    debug!(record_id = %id, "verification record reviewed");
    self.get_record(id).await
  }
}
