//! Error types for `ekyc-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::{collaborator::CollaboratorError, pipeline::Stage};

/// A hard failure of a verification run. Degraded stages never produce one of
/// these; they are reported inline on the outcome instead.
#[derive(Debug, Error)]
pub enum Error {
  /// A stage whose failure policy is abort did not complete.
  #[error("{stage} failed: {source}")]
  StageAborted {
    stage:  Stage,
    #[source]
    source: CollaboratorError,
  },

  /// The caller identity does not resolve to a known subject.
  #[error("subject {0} could not be resolved")]
  Unauthorized(Uuid),

  #[error("invalid input: {0}")]
  InvalidInput(String),

  /// Transcribed text the extraction engine refuses to process.
  #[error("malformed transcription: {0}")]
  MalformedText(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
