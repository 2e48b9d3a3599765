//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::Utc;
use ekyc_core::{
  identity::{ExtractedIdentity, ExtractionMethod, Field, FieldError},
  record::{
    ImageRef, MatchStatus, Review, VerificationRecord, VerificationStatus,
  },
  store::RecordStore,
};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn identity(name: &str) -> ExtractedIdentity {
  ExtractedIdentity {
    id_number: Some("060098002136".into()),
    full_name: Some(name.into()),
    extraction_method: ExtractionMethod::PatternWithFallback,
    field_errors: vec![FieldError {
      field:   Field::DateOfBirth,
      message: "date of birth not found".into(),
    }],
    ..Default::default()
  }
}

fn record(subject_id: Uuid, score: Option<f64>) -> VerificationRecord {
  let now = Utc::now();
  VerificationRecord {
    id: Uuid::new_v4(),
    subject_user_id: subject_id,
    created_at: now,
    updated_at: now,
    match_status: if score.is_some() { MatchStatus::Matched } else { MatchStatus::Error },
    similarity_score: score,
    extracted: identity("NGUYỄN VĂN AN"),
    document_image_ref: None,
    selfie_image_ref: Some(ImageRef("selfie/abc".into())),
    raw_transcription: Some("Họ và tên: NGUYỄN VĂN AN".into()),
    verification_status: Some(VerificationStatus::Approved),
    verification_note: Some("approved automatically".into()),
    verified_at: Some(now),
    verified_by: None,
  }
}

// ─── Subjects ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn register_and_resolve_subject() {
  let s = store().await;

  let subject = s.register_subject().await.unwrap();
  let fetched = s.resolve_subject(subject.subject_id).await.unwrap().unwrap();
  assert_eq!(fetched.subject_id, subject.subject_id);
}

#[tokio::test]
async fn resolve_missing_subject_returns_none() {
  let s = store().await;
  assert!(s.resolve_subject(Uuid::new_v4()).await.unwrap().is_none());
}

// ─── Profiles ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn profile_round_trips_and_last_write_wins() {
  let s = store().await;
  let subject = s.register_subject().await.unwrap().subject_id;

  s.create_profile(subject, identity("FIRST"), None).await.unwrap();
  let written = s
    .create_profile(subject, identity("SECOND"), Some(ImageRef("selfie/2".into())))
    .await
    .unwrap();

  let fetched = s.get_profile(subject).await.unwrap().unwrap();
  assert_eq!(fetched.identity, written.identity);
  assert_eq!(fetched.identity.full_name.as_deref(), Some("SECOND"));
  assert_eq!(fetched.selfie_image, Some(ImageRef("selfie/2".into())));
}

#[tokio::test]
async fn profile_requires_known_subject() {
  let s = store().await;
  let result = s.create_profile(Uuid::new_v4(), identity("X"), None).await;
  assert!(result.is_err());
}

#[tokio::test]
async fn missing_profile_returns_none() {
  let s = store().await;
  let subject = s.register_subject().await.unwrap().subject_id;
  assert!(s.get_profile(subject).await.unwrap().is_none());
}

// ─── Records ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn record_round_trips() {
  let s = store().await;
  let subject = s.register_subject().await.unwrap().subject_id;
  let original = record(subject, Some(0.75));

  s.append_verification_record(original.clone()).await.unwrap();
  let fetched = s.get_record(original.id).await.unwrap().unwrap();

  assert_eq!(fetched.id, original.id);
  assert_eq!(fetched.match_status, MatchStatus::Matched);
  assert_eq!(fetched.similarity_score, Some(0.75));
  assert_eq!(fetched.extracted, original.extracted);
  assert_eq!(fetched.selfie_image_ref, original.selfie_image_ref);
  assert_eq!(fetched.document_image_ref, None);
  assert_eq!(fetched.verification_status, Some(VerificationStatus::Approved));
  assert_eq!(fetched.raw_transcription, original.raw_transcription);
}

#[tokio::test]
async fn records_list_newest_first() {
  let s = store().await;
  let subject = s.register_subject().await.unwrap().subject_id;
  let other = s.register_subject().await.unwrap().subject_id;

  let first = record(subject, Some(0.7));
  let second = record(subject, None);
  s.append_verification_record(first.clone()).await.unwrap();
  s.append_verification_record(record(other, Some(0.9))).await.unwrap();
  s.append_verification_record(second.clone()).await.unwrap();

  let listed = s.list_records(subject).await.unwrap();
  let ids: Vec<Uuid> = listed.iter().map(|r| r.id).collect();
  assert_eq!(ids, vec![second.id, first.id]);
  assert_eq!(listed[0].match_status, MatchStatus::Error);
  assert_eq!(listed[0].similarity_score, None);
}

#[tokio::test]
async fn duplicate_record_id_is_rejected() {
  let s = store().await;
  let subject = s.register_subject().await.unwrap().subject_id;
  let r = record(subject, Some(0.7));

  s.append_verification_record(r.clone()).await.unwrap();
  assert!(s.append_verification_record(r).await.is_err());
}

#[tokio::test]
async fn score_outside_unit_interval_is_rejected() {
  let s = store().await;
  let subject = s.register_subject().await.unwrap().subject_id;
  assert!(
    s.append_verification_record(record(subject, Some(1.5)))
      .await
      .is_err()
  );
}

// ─── Review ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn review_updates_only_decision_columns() {
  let s = store().await;
  let subject = s.register_subject().await.unwrap().subject_id;
  let original = record(subject, Some(0.65));
  s.append_verification_record(original.clone()).await.unwrap();

  let reviewed = s
    .review_record(original.id, Review {
      status:   VerificationStatus::Rejected,
      reviewer: "analyst@example.com".into(),
      note:     None,
    })
    .await
    .unwrap()
    .unwrap();

  assert_eq!(reviewed.verification_status, Some(VerificationStatus::Rejected));
  assert_eq!(reviewed.verified_by.as_deref(), Some("analyst@example.com"));
  assert_eq!(reviewed.verification_note, original.verification_note);
  assert!(reviewed.updated_at >= original.updated_at);
  assert_eq!(reviewed.created_at, original.created_at);
  assert_eq!(reviewed.similarity_score, original.similarity_score);
  assert_eq!(reviewed.extracted, original.extracted);
}

#[tokio::test]
async fn review_of_missing_record_returns_none() {
  let s = store().await;
  let result = s
    .review_record(Uuid::new_v4(), Review {
      status:   VerificationStatus::Approved,
      reviewer: "analyst".into(),
      note:     Some("looks fine".into()),
    })
    .await
    .unwrap();
  assert!(result.is_none());
}
