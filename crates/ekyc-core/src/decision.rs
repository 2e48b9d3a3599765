//! The approve/reject rule applied to a face-similarity score.
//!
//! Pure and deterministic; the note it produces is stored on the audit record
//! so a human reviewer can see exactly why a run was approved or rejected.

use serde::{Deserialize, Serialize};

use crate::record::{MatchStatus, VerificationStatus};

/// Scores strictly above this are approved.
pub const DEFAULT_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
  pub verification_status: VerificationStatus,
  pub verification_note:   String,
}

/// Convert a raw face distance into a similarity score in `[0, 1]`.
pub fn similarity_from_distance(distance: f64) -> f64 {
  (1.0 - distance).clamp(0.0, 1.0)
}

/// Classify a similarity score against `threshold`.
pub fn match_status_for(score: f64, threshold: f64) -> MatchStatus {
  if score > threshold { MatchStatus::Matched } else { MatchStatus::NotMatched }
}

/// [`decide_with_threshold`] at [`DEFAULT_THRESHOLD`].
pub fn decide(match_status: MatchStatus, similarity_score: Option<f64>) -> Decision {
  decide_with_threshold(match_status, similarity_score, DEFAULT_THRESHOLD)
}

pub fn decide_with_threshold(
  match_status: MatchStatus,
  similarity_score: Option<f64>,
  threshold: f64,
) -> Decision {
  match (match_status, similarity_score) {
    (MatchStatus::Error, _) | (_, None) => Decision {
      verification_status: VerificationStatus::Rejected,
      verification_note:   "Automatically rejected: face comparison failed with a \
                            processing error, no similarity score available"
        .to_string(),
    },
    (_, Some(score)) if score > threshold => Decision {
      verification_status: VerificationStatus::Approved,
      verification_note:   format!(
        "Automatically approved: similarity score {score:.4} is above threshold {threshold:.2}"
      ),
    },
    (_, Some(score)) => Decision {
      verification_status: VerificationStatus::Rejected,
      verification_note:   format!(
        "Automatically rejected: similarity score {score:.4} is at or below threshold {threshold:.2}"
      ),
    },
  }
}
