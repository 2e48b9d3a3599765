//! The verification pipeline.
//!
//! A run moves through a fixed, linear sequence of [`Stage`]s. Each stage
//! declares its [`FailurePolicy`] once in [`Stage::policy`] and the
//! orchestrator applies it uniformly: abort, continue degraded, or log and
//! carry on.
//!
//! Runs share nothing mutable. The extraction rules are read-only and every
//! collaborator is reached through `&self`, so any number of runs may execute
//! concurrently against one [`Pipeline`].

use std::{future::Future, sync::Arc, time::Duration};

use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
  collaborator::{
    CollaboratorError, ExtractionFallback, FaceComparator, ImageKind,
    ImageStorage, NoFallback, Transcriber,
  },
  decision::{self, DEFAULT_THRESHOLD},
  error::{Error, Result},
  extract::{ExtractOptions, Extractor, FallbackOutcome},
  identity::{ExtractedIdentity, Field, RawTranscription},
  record::{
    IdentityProfile, ImageRef, MatchStatus, VerificationRecord,
    VerificationStatus,
  },
  store::RecordStore,
};


// ─── Stages ──────────────────────────────────────────────────────────────────

/// The states of one run, in execution order.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
  UploadingSelfie,
  TranscribingDocument,
  ExtractingFields,
  UploadingDocument,
  ComparingFaces,
  Deciding,
  PersistingProfile,
  PersistingRecord,
  Done,
}

/// What a failure of a stage does to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
  /// The run stops with [`Error::StageAborted`].
  Abort,
  /// The run continues with a placeholder and reports a [`Degradation`].
  Degrade,
  /// The failure is logged and otherwise invisible to the caller.
  BestEffort,
  /// The stage has no failure mode.
  Infallible,
}

impl Stage {
  pub const fn policy(self) -> FailurePolicy {
    match self {
      Self::UploadingSelfie | Self::PersistingProfile => FailurePolicy::Abort,
      Self::TranscribingDocument
      | Self::ExtractingFields
      | Self::UploadingDocument
      | Self::ComparingFaces => FailurePolicy::Degrade,
      Self::PersistingRecord => FailurePolicy::BestEffort,
      Self::Deciding | Self::Done => FailurePolicy::Infallible,
    }
  }
}

// ─── Configuration ───────────────────────────────────────────────────────────

/// Processing timeouts per collaborator call. Connect timeouts belong to the
/// adapters; these bound the whole call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
  pub upload:      Duration,
  pub ocr:         Duration,
  pub face:        Duration,
  pub fallback:    Duration,
  pub persistence: Duration,
}

impl Default for StageTimeouts {
  fn default() -> Self {
    Self {
      upload:      Duration::from_secs(30),
      ocr:         Duration::from_secs(60),
      face:        Duration::from_secs(60),
      fallback:    Duration::from_secs(60),
      persistence: Duration::from_secs(10),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
  pub timeouts:             StageTimeouts,
  /// Similarity scores strictly above this are approved.
  pub similarity_threshold: f64,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      timeouts:             StageTimeouts::default(),
      similarity_threshold: DEFAULT_THRESHOLD,
    }
  }
}

// ─── Results ─────────────────────────────────────────────────────────────────

/// A stage that failed without stopping the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Degradation {
  pub stage:  Stage,
  pub reason: String,
}

/// Everything one run produced.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
  pub record_id:           Uuid,
  pub subject_user_id:     Uuid,
  pub profile:             IdentityProfile,
  pub raw_transcription:   RawTranscription,
  pub extracted:           ExtractedIdentity,
  pub document_image_ref:  Option<ImageRef>,
  pub selfie_image_ref:    ImageRef,
  pub match_status:        MatchStatus,
  pub similarity_score:    Option<f64>,
  pub verification_status: VerificationStatus,
  pub verification_note:   String,
}

/// The result of a run that was not aborted.
#[derive(Debug, Clone)]
pub enum VerificationOutcome {
  /// Every stage succeeded.
  Verified(VerificationReport),
  /// At least one degradable stage failed; the report carries placeholders
  /// for what it could not produce.
  Degraded {
    report:       VerificationReport,
    degradations: Vec<Degradation>,
  },
}

impl VerificationOutcome {
  pub fn report(&self) -> &VerificationReport {
    match self {
      Self::Verified(report) | Self::Degraded { report, .. } => report,
    }
  }

  pub fn into_report(self) -> VerificationReport {
    match self {
      Self::Verified(report) | Self::Degraded { report, .. } => report,
    }
  }

  pub fn degradations(&self) -> &[Degradation] {
    match self {
      Self::Verified(_) => &[],
      Self::Degraded { degradations, .. } => degradations,
    }
  }

  pub fn is_degraded(&self) -> bool { matches!(self, Self::Degraded { .. }) }
}

// ─── Service trait ───────────────────────────────────────────────────────────

/// One submission from the caller.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
  pub document_image:  Bytes,
  pub selfie_image:    Bytes,
  pub subject_user_id: Uuid,
  pub options:         ExtractOptions,
}

/// The caller-facing verification operation, as consumed by the HTTP layer.
pub trait VerificationService: Send + Sync {
  fn verify(
    &self,
    request: VerificationRequest,
  ) -> impl Future<Output = Result<VerificationOutcome>> + Send + '_;
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

/// The orchestrator. Generic over every collaborator so tests and deployments
/// can plug in whatever adapters they need.
pub struct Pipeline<S, O, C, R, F = NoFallback> {
  storage:   S,
  ocr:       O,
  faces:     C,
  records:   R,
  fallback:  F,
  extractor: Arc<Extractor>,
  config:    PipelineConfig,
}

impl<S, O, C, R> Pipeline<S, O, C, R, NoFallback> {
  pub fn new(
    storage: S,
    ocr: O,
    faces: C,
    records: R,
    extractor: Arc<Extractor>,
  ) -> Self {
    Self {
      storage,
      ocr,
      faces,
      records,
      fallback: NoFallback,
      extractor,
      config: PipelineConfig::default(),
    }
  }
}

impl<S, O, C, R, F> Pipeline<S, O, C, R, F> {
  pub fn with_fallback<F2>(self, fallback: F2) -> Pipeline<S, O, C, R, F2> {
    Pipeline {
      storage: self.storage,
      ocr: self.ocr,
      faces: self.faces,
      records: self.records,
      fallback,
      extractor: self.extractor,
      config: self.config,
    }
  }

  pub fn with_config(mut self, config: PipelineConfig) -> Self {
    self.config = config;
    self
  }

  pub fn config(&self) -> &PipelineConfig { &self.config }

  pub fn records(&self) -> &R { &self.records }
}

impl<S, O, C, R, F> Pipeline<S, O, C, R, F>
where
  S: ImageStorage,
  O: Transcriber,
  C: FaceComparator,
  R: RecordStore,
  F: ExtractionFallback,
{
  /// Run one verification from raw images to a persisted decision.
  ///
  /// Returns `Err` only for the abort paths: selfie upload, an unresolvable
  /// subject, and the profile write. Every other failure is folded into a
  /// [`VerificationOutcome::Degraded`].
  pub async fn run_verification(
    &self,
    document_image: Bytes,
    selfie_image: Bytes,
    subject_user_id: Uuid,
    options: ExtractOptions,
  ) -> Result<VerificationOutcome> {
    if document_image.is_empty() {
      return Err(Error::InvalidInput("document image is empty".into()));
    }
    if selfie_image.is_empty() {
      return Err(Error::InvalidInput("selfie image is empty".into()));
    }

    let timeouts = self.config.timeouts;
    let mut run = Run { subject_user_id, degradations: Vec::new() };

    // Uploading the selfie.
    run.enter(Stage::UploadingSelfie);
    let result = within(
      timeouts.upload,
      self.storage.upload(selfie_image.clone(), ImageKind::Selfie),
    )
    .await;
    let selfie_image_ref = run.require(Stage::UploadingSelfie, result)?;

    // Transcribing the document. The bytes are kept for the face stage.
    run.enter(Stage::TranscribingDocument);
    let result =
      within(timeouts.ocr, self.ocr.transcribe(document_image.clone())).await;
    let raw_transcription = run
      .settle(Stage::TranscribingDocument, result)?
      .map(RawTranscription::ocr)
      .unwrap_or_else(RawTranscription::empty);

    // Extracting fields.
    run.enter(Stage::ExtractingFields);
    let fallback = TimedFallback { inner: &self.fallback, limit: timeouts.fallback };
    let extracted = match self
      .extractor
      .extract(&raw_transcription.text, options, &fallback)
      .await
    {
      Ok(extraction) => {
        if let FallbackOutcome::Failed(reason) = &extraction.fallback {
          debug!(%subject_user_id, %reason, "continuing with pattern fields only");
        }
        extraction.identity
      }
      Err(e) => {
        run.degrade(Stage::ExtractingFields, e.to_string());
        self.extractor.nothing_found()
      }
    };

    // Uploading the document.
    run.enter(Stage::UploadingDocument);
    let result = within(
      timeouts.upload,
      self.storage.upload(document_image.clone(), ImageKind::Document),
    )
    .await;
    let document_image_ref = run.settle(Stage::UploadingDocument, result)?;

    // Comparing faces.
    run.enter(Stage::ComparingFaces);
    let result = within(timeouts.face, async {
      let distance = self.faces.compare(selfie_image, document_image).await?;
      if distance.is_finite() {
        Ok(distance)
      } else {
        Err(CollaboratorError::invalid_response(format!(
          "face distance {distance} is not a number"
        )))
      }
    })
    .await;
    let threshold = self.config.similarity_threshold;
    let (match_status, similarity_score) =
      match run.settle(Stage::ComparingFaces, result)? {
        Some(distance) => {
          let score = decision::similarity_from_distance(distance);
          (decision::match_status_for(score, threshold), Some(score))
        }
        None => (MatchStatus::Error, None),
      };

    // The subject must resolve before anything is written on its behalf.
    let result = within(timeouts.persistence, async {
      self.records.resolve_subject(subject_user_id).await.map_err(store_error)
    })
    .await;
    if run.require(Stage::PersistingProfile, result)?.is_none() {
      error!(%subject_user_id, "subject could not be resolved, aborting run");
      return Err(Error::Unauthorized(subject_user_id));
    }

    // Deciding.
    run.enter(Stage::Deciding);
    let decision =
      decision::decide_with_threshold(match_status, similarity_score, threshold);
    info!(
      %subject_user_id,
      %match_status,
      score = ?similarity_score,
      status = %decision.verification_status,
      "verification decided"
    );

    // Persisting the profile.
    run.enter(Stage::PersistingProfile);
    let result = within(timeouts.persistence, async {
      self
        .records
        .create_profile(
          subject_user_id,
          extracted.clone(),
          Some(selfie_image_ref.clone()),
        )
        .await
        .map_err(store_error)
    })
    .await;
    let profile = run.require(Stage::PersistingProfile, result)?;

    // Persisting the audit record.
    run.enter(Stage::PersistingRecord);
    let now = Utc::now();
    let record = VerificationRecord {
      id: Uuid::new_v4(),
      subject_user_id,
      created_at: now,
      updated_at: now,
      match_status,
      similarity_score,
      extracted: extracted.clone(),
      document_image_ref: document_image_ref.clone(),
      selfie_image_ref: Some(selfie_image_ref.clone()),
      raw_transcription: Some(raw_transcription.text.clone()),
      verification_status: Some(decision.verification_status),
      verification_note: Some(decision.verification_note.clone()),
      verified_at: Some(now),
      verified_by: None,
    };
    let record_id = record.id;
    let result = within(timeouts.persistence, async {
      self.records.append_verification_record(record).await.map_err(store_error)
    })
    .await;
    run.settle(Stage::PersistingRecord, result)?;

    run.enter(Stage::Done);
    let report = VerificationReport {
      record_id,
      subject_user_id,
      profile,
      raw_transcription,
      extracted,
      document_image_ref,
      selfie_image_ref,
      match_status,
      similarity_score,
      verification_status: decision.verification_status,
      verification_note: decision.verification_note,
    };
    Ok(if run.degradations.is_empty() {
      VerificationOutcome::Verified(report)
    } else {
      VerificationOutcome::Degraded { report, degradations: run.degradations }
    })
  }
}

impl<S, O, C, R, F> VerificationService for Pipeline<S, O, C, R, F>
where
  S: ImageStorage,
  O: Transcriber,
  C: FaceComparator,
  R: RecordStore,
  F: ExtractionFallback,
{
  async fn verify(&self, request: VerificationRequest) -> Result<VerificationOutcome> {
    self
      .run_verification(
        request.document_image,
        request.selfie_image,
        request.subject_user_id,
        request.options,
      )
      .await
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Per-run bookkeeping.
struct Run {
  subject_user_id: Uuid,
  degradations:    Vec<Degradation>,
}

impl Run {
  fn enter(&self, stage: Stage) {
    debug!(subject_user_id = %self.subject_user_id, %stage, "entering stage");
  }

  fn degrade(&mut self, stage: Stage, reason: String) {
    warn!(
      subject_user_id = %self.subject_user_id,
      %stage,
      error = %reason,
      "stage failed, continuing degraded"
    );
    self.degradations.push(Degradation { stage, reason });
  }

  fn abort(&self, stage: Stage, source: CollaboratorError) -> Error {
    error!(
      subject_user_id = %self.subject_user_id,
      %stage,
      error = %source,
      "stage failed, aborting run"
    );
    Error::StageAborted { stage, source }
  }

  /// The output of a stage whose policy is [`FailurePolicy::Abort`].
  fn require<T>(
    &self,
    stage: Stage,
    result: std::result::Result<T, CollaboratorError>,
  ) -> Result<T> {
    debug_assert_eq!(stage.policy(), FailurePolicy::Abort);
    result.map_err(|source| self.abort(stage, source))
  }

  /// Apply `stage`'s failure policy to `result`. `Ok(None)` means the stage
  /// failed and the run continues without its output.
  fn settle<T>(
    &mut self,
    stage: Stage,
    result: std::result::Result<T, CollaboratorError>,
  ) -> Result<Option<T>> {
    let source = match result {
      Ok(value) => return Ok(Some(value)),
      Err(source) => source,
    };
    match stage.policy() {
      FailurePolicy::Abort => Err(self.abort(stage, source)),
      FailurePolicy::Degrade | FailurePolicy::Infallible => {
        self.degrade(stage, source.to_string());
        Ok(None)
      }
      FailurePolicy::BestEffort => {
        warn!(
          subject_user_id = %self.subject_user_id,
          %stage,
          error = %source,
          "best-effort stage failed"
        );
        Ok(None)
      }
    }
  }
}

/// Bound a collaborator call, turning an elapsed deadline into
/// [`CollaboratorError::Timeout`].
async fn within<T>(
  limit: Duration,
  call: impl Future<Output = std::result::Result<T, CollaboratorError>>,
) -> std::result::Result<T, CollaboratorError> {
  match tokio::time::timeout(limit, call).await {
    Ok(result) => result,
    Err(_) => Err(CollaboratorError::timeout(limit)),
  }
}

fn store_error(e: impl std::error::Error) -> CollaboratorError {
  CollaboratorError::other(e.to_string())
}

/// Applies the fallback timeout inside the extraction engine.
struct TimedFallback<'f, F> {
  inner: &'f F,
  limit: Duration,
}

impl<F: ExtractionFallback> ExtractionFallback for TimedFallback<'_, F> {
  async fn infer<'a>(
    &'a self,
    text: &'a str,
    fields: &'a [Field],
  ) -> std::result::Result<String, CollaboratorError> {
    within(self.limit, self.inner.infer(text, fields)).await
  }
}
