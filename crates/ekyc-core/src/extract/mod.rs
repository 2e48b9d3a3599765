//! The field extraction engine.
//!
//! Turns noisy transcribed text into an [`ExtractedIdentity`]: normalize the
//! text, run each field's ordered patterns, validate the captures, and, when a
//! mandatory field is still missing and the caller allows it, ask a remote
//! model for the rest.
//!
//! The pattern table is compiled once by [`Extractor::new`] and shared
//! read-only between runs.

mod fallback;
pub mod normalize;
mod rules;

use tracing::{debug, warn};

pub use self::fallback::{ReplyError, find_json_object, parse_reply};
use self::rules::Rules;
use crate::{
  collaborator::ExtractionFallback,
  error::{Error, Result},
  identity::{ExtractedIdentity, ExtractionMethod, Field, FieldError},
};

/// Transcriptions larger than this are refused rather than scanned.
pub const MAX_TEXT_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
  /// Whether a remote model may be asked for missing mandatory fields.
  pub allow_fallback: bool,
}

/// What happened with the remote fallback during one extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackOutcome {
  /// Every mandatory field was found by the patterns.
  NotNeeded,
  /// A mandatory field was missing but the caller did not allow the fallback.
  Disabled,
  /// The transcription was empty, so there was nothing to send.
  NoText,
  /// The reply parsed; `accepted` lists the fields it filled.
  Applied { accepted: Vec<Field> },
  /// The call or its reply failed. Pattern results were kept unchanged.
  Failed(String),
}

#[derive(Debug, Clone)]
pub struct Extraction {
  pub identity: ExtractedIdentity,
  pub fallback: FallbackOutcome,
}

/// The compiled extraction engine.
pub struct Extractor {
  rules: Rules,
}

impl Default for Extractor {
  fn default() -> Self { Self::new() }
}

impl std::fmt::Debug for Extractor {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Extractor").finish_non_exhaustive()
  }
}

impl Extractor {
  pub fn new() -> Self { Self { rules: Rules::new() } }

  /// Collapse whitespace and repair known OCR confusions.
  pub fn normalize_text(&self, raw: &str) -> String {
    self.rules.normalize_text(raw)
  }

  /// Validate a single value for `field` with the same rules the patterns use.
  pub fn normalize_value(&self, field: Field, raw: &str) -> Option<String> {
    self.rules.normalize_value(field, raw)
  }

  /// Pattern-only extraction. Never fails for text that simply contains no
  /// recognisable fields.
  pub fn extract_patterns(&self, raw: &str) -> Result<ExtractedIdentity> {
    check_input(raw)?;
    let text = self.rules.normalize_text(raw);
    Ok(self.from_text(&text))
  }

  /// The identity reported when there is no usable text at all.
  pub fn nothing_found(&self) -> ExtractedIdentity { self.from_text("") }

  /// Full extraction, escalating to `fallback` when allowed and needed.
  pub async fn extract<F: ExtractionFallback>(
    &self,
    raw: &str,
    options: ExtractOptions,
    fallback: &F,
  ) -> Result<Extraction> {
    check_input(raw)?;
    let text = self.rules.normalize_text(raw);
    let mut identity = self.from_text(&text);

    let missing = identity.missing_mandatory();
    let outcome = if missing.is_empty() {
      FallbackOutcome::NotNeeded
    } else if !options.allow_fallback {
      FallbackOutcome::Disabled
    } else if text.is_empty() {
      FallbackOutcome::NoText
    } else {
      self.escalate(&text, &mut identity, fallback).await
    };

    Ok(Extraction { identity, fallback: outcome })
  }

  fn from_text(&self, text: &str) -> ExtractedIdentity {
    let mut identity = ExtractedIdentity::default();
    for (field, value) in self.rules.match_fields(text) {
      *identity.slot_mut(field) = Some(value);
    }
    identity.document_kind =
      self.rules.document_kind(text, identity.id_number.as_deref());
    identity.field_errors = field_errors(&identity);
    debug!(
      present = identity.present_count(),
      kind = ?identity.document_kind,
      "pattern extraction finished"
    );
    identity
  }

  async fn escalate<F: ExtractionFallback>(
    &self,
    text: &str,
    identity: &mut ExtractedIdentity,
    fallback: &F,
  ) -> FallbackOutcome {
    let absent: Vec<Field> =
      Field::all().filter(|f| !identity.is_present(*f)).collect();

    let reply = match fallback.infer(text, &absent).await {
      Ok(reply) => reply,
      Err(e) => {
        warn!(error = %e, "extraction fallback failed");
        return FallbackOutcome::Failed(e.to_string());
      }
    };
    let map = match fallback::parse_reply(&reply) {
      Ok(map) => map,
      Err(e) => {
        warn!(error = %e, "extraction fallback reply rejected");
        return FallbackOutcome::Failed(e.to_string());
      }
    };

    let mut found = fallback::candidates(&self.rules, &map, &absent);
    found.accepted.sort_by_key(|(field, _)| *field);
    if !found.rejected.is_empty() || !found.unknown.is_empty() {
      warn!(
        rejected = ?found.rejected,
        unknown = ?found.unknown,
        "extraction fallback returned unusable values"
      );
    }

    let mut accepted = Vec::with_capacity(found.accepted.len());
    for (field, value) in found.accepted {
      *identity.slot_mut(field) = Some(value);
      accepted.push(field);
    }
    identity.extraction_method = ExtractionMethod::PatternWithFallback;
    if accepted.contains(&Field::IdNumber) {
      identity.document_kind =
        self.rules.document_kind(text, identity.id_number.as_deref());
    }
    identity.field_errors = field_errors(identity);
    debug!(?accepted, "extraction fallback applied");
    FallbackOutcome::Applied { accepted }
  }
}

fn check_input(raw: &str) -> Result<()> {
  if raw.len() > MAX_TEXT_BYTES {
    return Err(Error::MalformedText(format!(
      "transcription is {} bytes, limit is {MAX_TEXT_BYTES}",
      raw.len()
    )));
  }
  if raw.contains('\0') {
    return Err(Error::MalformedText("transcription contains NUL bytes".into()));
  }
  Ok(())
}

fn field_errors(identity: &ExtractedIdentity) -> Vec<FieldError> {
  identity
    .missing_mandatory()
    .into_iter()
    .map(|field| FieldError {
      field,
      message: format!("{} not found", field.description()),
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use std::{
    sync::{
      Mutex,
      atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
  };

  use super::*;
  use crate::{
    collaborator::{CollaboratorError, NoFallback},
    identity::{DocumentKind, NO_EXPIRY},
  };

  const CCCD: &str = "CỘNG HÒA XÃ HỘI CHỦ NGHĨA VIỆT NAM
Độc lập - Tự do - Hạnh phúc
CĂN CƯỚC CÔNG DÂN
Citizen Identity Card
Số / No.: 060098002136
Họ và tên / Full name:
NGUYỄN VĂN AN
Ngày sinh / Date of birth: 12/04/1998
Giới tính / Sex: Nam Quốc tịch / Nationality: Việt Nam
Quê quán / Place of origin: Tân Thành, Kim Sơn, Ninh Bình
Nơi thường trú / Place of residence: Thôn 3, Xã Tân Lập, Đan Phượng, Hà Nội
Có giá trị đến / Date of expiry: 12/04/2038";

  /// A fallback that replays a fixed reply and records its calls.
  struct Scripted {
    reply: std::result::Result<String, CollaboratorError>,
    calls: AtomicUsize,
    asked: Mutex<Vec<Field>>,
  }

  impl Scripted {
    fn new(reply: std::result::Result<&str, CollaboratorError>) -> Self {
      Self {
        reply: reply.map(str::to_string),
        calls: AtomicUsize::new(0),
        asked: Mutex::new(Vec::new()),
      }
    }

    fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
  }

  impl ExtractionFallback for Scripted {
    async fn infer<'a>(
      &'a self,
      _text: &'a str,
      fields: &'a [Field],
    ) -> std::result::Result<String, CollaboratorError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      *self.asked.lock().unwrap() = fields.to_vec();
      self.reply.clone()
    }
  }

  const ALLOW: ExtractOptions = ExtractOptions { allow_fallback: true };

  #[tokio::test]
  async fn zero_match_text_yields_three_field_errors() {
    let extractor = Extractor::new();
    let out = extractor
      .extract("lorem ipsum dolor", ExtractOptions::default(), &NoFallback)
      .await
      .unwrap();

    assert_eq!(out.identity.present_count(), 0);
    assert_eq!(out.identity.extraction_method, ExtractionMethod::Pattern);
    let fields: Vec<Field> =
      out.identity.field_errors.iter().map(|e| e.field).collect();
    assert_eq!(fields, Field::MANDATORY.to_vec());
    assert_eq!(out.fallback, FallbackOutcome::Disabled);
  }

  #[tokio::test]
  async fn empty_text_is_not_an_error() {
    let identity = Extractor::new().extract_patterns("").unwrap();
    assert_eq!(identity.field_errors.len(), 3);
  }

  #[tokio::test]
  async fn blank_text_never_reaches_the_fallback() {
    let fallback = Scripted::new(Ok(
      r#"{"id_number": "079123456789", "full_name": "TRẦN VĂN C"}"#,
    ));
    let out = Extractor::new().extract(" \n\t ", ALLOW, &fallback).await.unwrap();

    assert_eq!(fallback.calls(), 0);
    assert_eq!(out.fallback, FallbackOutcome::NoText);
    assert_eq!(out.identity.present_count(), 0);
    assert_eq!(out.identity.field_errors.len(), 3);
    assert_eq!(out.identity.extraction_method, ExtractionMethod::Pattern);
  }

  #[test]
  fn malformed_input_is_refused() {
    let extractor = Extractor::new();
    assert!(matches!(
      extractor.extract_patterns("a\0b"),
      Err(Error::MalformedText(_))
    ));
    let huge = "a".repeat(MAX_TEXT_BYTES + 1);
    assert!(matches!(
      extractor.extract_patterns(&huge),
      Err(Error::MalformedText(_))
    ));
  }

  #[test]
  fn full_citizen_card() {
    let identity = Extractor::new().extract_patterns(CCCD).unwrap();

    assert_eq!(identity.id_number.as_deref(), Some("060098002136"));
    assert_eq!(identity.full_name.as_deref(), Some("NGUYỄN VĂN AN"));
    assert_eq!(identity.date_of_birth.as_deref(), Some("12/04/1998"));
    assert_eq!(identity.gender.as_deref(), Some("Nam"));
    assert_eq!(identity.nationality.as_deref(), Some("Việt Nam"));
    assert_eq!(
      identity.place_of_origin.as_deref(),
      Some("Tân Thành, Kim Sơn, Ninh Bình")
    );
    assert_eq!(
      identity.place_of_residence.as_deref(),
      Some("Thôn 3, Xã Tân Lập, Đan Phượng, Hà Nội")
    );
    assert_eq!(identity.expiry_date.as_deref(), Some("12/04/2038"));
    assert_eq!(identity.document_kind, DocumentKind::CitizenId);
    assert!(identity.field_errors.is_empty());
  }

  #[tokio::test]
  async fn fallback_is_not_called_when_mandatory_fields_match() {
    let fallback = Scripted::new(Ok("{}"));
    let out = Extractor::new().extract(CCCD, ALLOW, &fallback).await.unwrap();

    assert_eq!(fallback.calls(), 0);
    assert_eq!(out.fallback, FallbackOutcome::NotNeeded);
    assert_eq!(out.identity.extraction_method, ExtractionMethod::Pattern);
  }

  #[tokio::test]
  async fn fallback_is_not_called_when_disabled() {
    let fallback = Scripted::new(Ok("{}"));
    Extractor::new()
      .extract("nothing here", ExtractOptions::default(), &fallback)
      .await
      .unwrap();
    assert_eq!(fallback.calls(), 0);
  }

  #[tokio::test]
  async fn fenced_reply_fills_only_absent_fields() {
    let text = "Họ và tên: TRẦN THỊ B Có giá trị đến: Không thời hạn";
    let fallback = Scripted::new(Ok(
      "Here you go:\n```json\n{\"id_number\": \"123 456 789\", \
       \"full_name\": \"SOMEONE ELSE\", \"date_of_birth\": \"1/2/1980\", \
       \"religion\": null}\n```",
    ));
    let out = Extractor::new().extract(text, ALLOW, &fallback).await.unwrap();
    let identity = out.identity;

    assert_eq!(fallback.calls(), 1);
    assert!(!fallback.asked.lock().unwrap().contains(&Field::FullName));
    assert_eq!(identity.full_name.as_deref(), Some("TRẦN THỊ B"));
    assert_eq!(identity.id_number.as_deref(), Some("123456789"));
    assert_eq!(identity.date_of_birth.as_deref(), Some("01/02/1980"));
    assert_eq!(identity.expiry_date.as_deref(), Some(NO_EXPIRY));
    assert_eq!(identity.document_kind, DocumentKind::LegacyId);
    assert_eq!(identity.extraction_method, ExtractionMethod::PatternWithFallback);
    assert!(identity.field_errors.is_empty());
    assert_eq!(
      out.fallback,
      FallbackOutcome::Applied { accepted: vec![Field::IdNumber, Field::DateOfBirth] }
    );
  }

  #[tokio::test]
  async fn invalid_reply_leaves_pattern_fields_unchanged() {
    let text = "Họ và tên: TRẦN THỊ B";
    let before = Extractor::new().extract_patterns(text).unwrap();

    for reply in [
      Ok("I could not read the card."),
      Ok("{\"id_number\": \"123456789\""),
      Err(CollaboratorError::timeout(Duration::from_secs(30))),
    ] {
      let fallback = Scripted::new(reply);
      let out = Extractor::new().extract(text, ALLOW, &fallback).await.unwrap();
      assert_eq!(out.identity, before);
      assert!(matches!(out.fallback, FallbackOutcome::Failed(_)));
    }
  }

  #[tokio::test]
  async fn invalid_values_in_reply_are_discarded() {
    let fallback = Scripted::new(Ok(
      r#"{"id_number": "12345", "full_name": "1", "date_of_birth": "30/02/3000"}"#,
    ));
    let out = Extractor::new()
      .extract("unreadable", ALLOW, &fallback)
      .await
      .unwrap();

    assert_eq!(out.identity.present_count(), 0);
    assert_eq!(out.identity.field_errors.len(), 3);
    assert_eq!(
      out.identity.extraction_method,
      ExtractionMethod::PatternWithFallback
    );
    assert_eq!(out.fallback, FallbackOutcome::Applied { accepted: vec![] });
  }
}
