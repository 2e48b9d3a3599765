//! Parsing the remote model's reply.
//!
//! Models wrap their JSON in commentary or markdown fences. The first
//! top-level `{...}` object is located by brace matching (string-aware), parsed
//! into an untyped map, and only then converted field by field.

use serde_json::{Map, Value};
use thiserror::Error;

use super::rules::Rules;
use crate::identity::Field;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReplyError {
  #[error("no JSON object found in fallback reply")]
  NoObject,
  #[error("fallback reply is not valid JSON: {0}")]
  InvalidJson(String),
}

/// Return the first balanced top-level JSON object in `reply`.
pub fn find_json_object(reply: &str) -> Option<&str> {
  let start = reply.find('{')?;
  let mut depth = 0usize;
  let mut in_string = false;
  let mut escaped = false;

  for (offset, ch) in reply[start..].char_indices() {
    if in_string {
      match ch {
        _ if escaped => escaped = false,
        '\\' => escaped = true,
        '"' => in_string = false,
        _ => {}
      }
      continue;
    }
    match ch {
      '"' => in_string = true,
      '{' => depth += 1,
      '}' => {
        depth -= 1;
        if depth == 0 {
          return Some(&reply[start..=start + offset]);
        }
      }
      _ => {}
    }
  }
  None
}

/// Parse the reply into an untyped JSON object.
pub fn parse_reply(reply: &str) -> Result<Map<String, Value>, ReplyError> {
  let object = find_json_object(reply).ok_or(ReplyError::NoObject)?;
  match serde_json::from_str::<Value>(object) {
    Ok(Value::Object(map)) => Ok(map),
    Ok(_) => Err(ReplyError::NoObject),
    Err(e) => Err(ReplyError::InvalidJson(e.to_string())),
  }
}

/// The outcome of validating one reply.
#[derive(Debug, Default)]
pub(crate) struct Candidates {
  pub accepted: Vec<(Field, String)>,
  /// Keys that named a field but whose value failed validation.
  pub rejected: Vec<Field>,
  /// Keys that named no known field.
  pub unknown:  Vec<String>,
}

/// Validate every value in `map` through the same normalizers the patterns
/// use. `wanted` restricts which fields may be accepted.
pub(crate) fn candidates(
  rules: &Rules,
  map: &Map<String, Value>,
  wanted: &[Field],
) -> Candidates {
  let mut out = Candidates::default();
  for (key, value) in map {
    let Ok(field) = key.parse::<Field>() else {
      out.unknown.push(key.clone());
      continue;
    };
    if !wanted.contains(&field) {
      continue;
    }
    let raw = match value {
      Value::Null => continue,
      Value::String(s) if s.trim().is_empty() => continue,
      Value::String(s) => s.clone(),
      Value::Number(n) => n.to_string(),
      _ => {
        out.rejected.push(field);
        continue;
      }
    };
    match rules.normalize_value(field, &raw) {
      Some(v) => out.accepted.push((field, v)),
      None => out.rejected.push(field),
    }
  }
  out
}
