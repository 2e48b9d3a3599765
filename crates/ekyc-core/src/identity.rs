//! Identity attributes read off a government ID card.
//!
//! An [`ExtractedIdentity`] is produced once per verification run by the
//! extraction engine and never mutated afterwards; it is copied verbatim into
//! the audit record and the subject's profile.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator as _};

// ─── Transcription ───────────────────────────────────────────────────────────

/// Where a transcription came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionSource {
  Ocr,
  /// The OCR stage failed; the text is empty.
  None,
}

/// The raw OCR output for the document image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTranscription {
  pub text:   String,
  pub source: TranscriptionSource,
}

impl RawTranscription {
  pub fn ocr(text: impl Into<String>) -> Self {
    Self { text: text.into(), source: TranscriptionSource::Ocr }
  }

  pub fn empty() -> Self {
    Self { text: String::new(), source: TranscriptionSource::None }
  }
}

// ─── Fields ──────────────────────────────────────────────────────────────────

/// The attributes the extraction engine targets. The snake_case name doubles
/// as the JSON key used by the remote fallback and the API.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumIter,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Field {
  IdNumber,
  FullName,
  DateOfBirth,
  Gender,
  Nationality,
  PlaceOfOrigin,
  PlaceOfResidence,
  ExpiryDate,
  DateOfIssue,
  PlaceOfIssue,
  PersonalIdentificationFeatures,
  Ethnicity,
  Religion,
}

impl Field {
  /// Fields whose absence triggers the remote fallback and is reported in
  /// [`ExtractedIdentity::field_errors`].
  pub const MANDATORY: [Field; 3] =
    [Field::IdNumber, Field::FullName, Field::DateOfBirth];

  pub fn is_mandatory(self) -> bool { Self::MANDATORY.contains(&self) }

  pub fn all() -> impl Iterator<Item = Field> { Field::iter() }

  /// Human-readable label used in prompts and error messages.
  pub fn description(self) -> &'static str {
    match self {
      Self::IdNumber => "ID card number (9 or 12 digits)",
      Self::FullName => "full name",
      Self::DateOfBirth => "date of birth (dd/mm/yyyy)",
      Self::Gender => "gender",
      Self::Nationality => "nationality",
      Self::PlaceOfOrigin => "place of origin",
      Self::PlaceOfResidence => "place of residence",
      Self::ExpiryDate => "date of expiry (dd/mm/yyyy)",
      Self::DateOfIssue => "date of issue (dd/mm/yyyy)",
      Self::PlaceOfIssue => "place of issue",
      Self::PersonalIdentificationFeatures => "personal identification features",
      Self::Ethnicity => "ethnicity",
      Self::Religion => "religion",
    }
  }
}

/// Fixed value stored in a date field when the card states it never expires.
pub const NO_EXPIRY: &str = "KHÔNG THỜI HẠN";

/// Which card generation the text appears to come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
  /// Chip-based citizen identity card with a 12-digit number.
  CitizenId,
  /// Legacy people's identity card with a 9-digit number.
  LegacyId,
  #[default]
  Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExtractionMethod {
  #[default]
  #[serde(rename = "pattern")]
  Pattern,
  #[serde(rename = "pattern+fallback")]
  PatternWithFallback,
}

/// A mandatory field that could not be extracted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
  pub field:   Field,
  pub message: String,
}

// ─── ExtractedIdentity ───────────────────────────────────────────────────────

/// Structured attributes read from a transcription. Every attribute is
/// optional; absence of a mandatory one is recorded in `field_errors` rather
/// than raised.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedIdentity {
  pub id_number:                        Option<String>,
  pub full_name:                        Option<String>,
  pub date_of_birth:                    Option<String>,
  pub gender:                           Option<String>,
  pub nationality:                      Option<String>,
  pub place_of_origin:                  Option<String>,
  pub place_of_residence:               Option<String>,
  pub expiry_date:                      Option<String>,
  pub date_of_issue:                    Option<String>,
  pub place_of_issue:                   Option<String>,
  pub personal_identification_features: Option<String>,
  pub ethnicity:                        Option<String>,
  pub religion:                         Option<String>,
  #[serde(default)]
  pub document_kind:                    DocumentKind,
  #[serde(default)]
  pub extraction_method:                ExtractionMethod,
  #[serde(default)]
  pub field_errors:                     Vec<FieldError>,
}

impl ExtractedIdentity {
  pub fn get(&self, field: Field) -> Option<&str> {
    let slot = match field {
      Field::IdNumber => &self.id_number,
      Field::FullName => &self.full_name,
      Field::DateOfBirth => &self.date_of_birth,
      Field::Gender => &self.gender,
      Field::Nationality => &self.nationality,
      Field::PlaceOfOrigin => &self.place_of_origin,
      Field::PlaceOfResidence => &self.place_of_residence,
      Field::ExpiryDate => &self.expiry_date,
      Field::DateOfIssue => &self.date_of_issue,
      Field::PlaceOfIssue => &self.place_of_issue,
      Field::PersonalIdentificationFeatures => {
        &self.personal_identification_features
      }
      Field::Ethnicity => &self.ethnicity,
      Field::Religion => &self.religion,
    };
    slot.as_deref()
  }

  pub(crate) fn slot_mut(&mut self, field: Field) -> &mut Option<String> {
    match field {
      Field::IdNumber => &mut self.id_number,
      Field::FullName => &mut self.full_name,
      Field::DateOfBirth => &mut self.date_of_birth,
      Field::Gender => &mut self.gender,
      Field::Nationality => &mut self.nationality,
      Field::PlaceOfOrigin => &mut self.place_of_origin,
      Field::PlaceOfResidence => &mut self.place_of_residence,
      Field::ExpiryDate => &mut self.expiry_date,
      Field::DateOfIssue => &mut self.date_of_issue,
      Field::PlaceOfIssue => &mut self.place_of_issue,
      Field::PersonalIdentificationFeatures => {
        &mut self.personal_identification_features
      }
      Field::Ethnicity => &mut self.ethnicity,
      Field::Religion => &mut self.religion,
    }
  }

  pub fn is_present(&self, field: Field) -> bool { self.get(field).is_some() }

  /// Mandatory fields that are still absent, in [`Field::MANDATORY`] order.
  pub fn missing_mandatory(&self) -> Vec<Field> {
    Field::MANDATORY
      .into_iter()
      .filter(|f| !self.is_present(*f))
      .collect()
  }

  /// Number of attributes that carry a value.
  pub fn present_count(&self) -> usize {
    Field::all().filter(|f| self.is_present(*f)).count()
  }
}
