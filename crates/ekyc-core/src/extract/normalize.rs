//! Per-field value normalizers.
//!
//! Each normalizer returns `None` when the raw capture does not survive
//! validation. All of them are idempotent: feeding a normalized value back in
//! returns it unchanged.

use std::sync::LazyLock;

use regex::Regex;

use crate::identity::NO_EXPIRY;

static NON_DIGIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^0-9]+").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static NOT_NAME_CHAR: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"[^\p{L}\p{M}\s]+").unwrap());
static DATE_PARTS: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^([0-9]{1,2})[/\-.]([0-9]{1,2})[/\-.]([0-9]{4})$").unwrap()
});
static COMPACT_DATE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^([0-9]{2})([0-9]{2})([0-9]{4})$").unwrap());
static NO_EXPIRY_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(
    r"(?i)^(?:(?:kh[oôóố]ng|v[oôó])\s*(?:x[aá]c\s*đ[iị]nh\s*)?th[oờơớ]i\s*h[aạ]n|không\s*có\s*giá\s*trị\s*hết\s*hạn|indefinite|unlimited|no\s*expiry)$",
  )
  .unwrap()
});
static LEADING_ARTIFACTS: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^[\s:.,;/\\\-|_~*'`\x22«»•●]+").unwrap());
static TRAILING_ARTIFACTS: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"[\s:.,;/\\\-|_~*'`\x22«»•●]+$").unwrap());
static VIETNAM: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?i)^v[iíìịỉ1l]?[eêệếềẹé]?t\s*n[aăâ][mn]?(?:\s*nam)?$|^vietnam(?:ese)?$|^việt\s*nain$").unwrap()
});

/// Collapse every whitespace run (including newlines) to a single space.
pub fn collapse_whitespace(s: &str) -> String {
  WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

/// Keep digits only; accept 9 (legacy) or 12 (citizen) digit numbers.
pub fn id_number(raw: &str) -> Option<String> {
  let digits = NON_DIGIT.replace_all(raw, "");
  matches!(digits.len(), 9 | 12).then(|| digits.into_owned())
}

/// Restrict to letters and spaces, collapse whitespace, upper-case.
pub fn full_name(raw: &str) -> Option<String> {
  let letters = NOT_NAME_CHAR.replace_all(raw, " ");
  let name = collapse_whitespace(&letters).to_uppercase();
  (name.chars().count() > 1).then_some(name)
}

/// Whether `raw`, as a whole, states that a document never expires.
pub fn is_no_expiry(raw: &str) -> bool {
  let value = strip_artifacts(&collapse_whitespace(raw));
  value == NO_EXPIRY || NO_EXPIRY_PHRASE.is_match(&value)
}

/// Reparse a day-first date into `dd/mm/yyyy`.
///
/// With `allow_no_expiry`, a "no expiry" phrasing becomes [`NO_EXPIRY`]
/// rather than being rejected.
pub fn date(raw: &str, allow_no_expiry: bool) -> Option<String> {
  let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
  let Some(caps) = DATE_PARTS
    .captures(&compact)
    .or_else(|| COMPACT_DATE.captures(&compact))
  else {
    return (allow_no_expiry && is_no_expiry(raw)).then(|| NO_EXPIRY.to_string());
  };

  let day: u32 = caps[1].parse().ok()?;
  let month: u32 = caps[2].parse().ok()?;
  let year: u32 = caps[3].parse().ok()?;

  let valid = (1..=31).contains(&day)
    && (1..=12).contains(&month)
    && (1900..=2100).contains(&year);
  valid.then(|| format!("{day:02}/{month:02}/{year:04}"))
}

/// Fold gender spellings, including common OCR misreads, into `Nam`/`Nữ`.
pub fn gender(raw: &str) -> Option<String> {
  let token = collapse_whitespace(raw).to_lowercase();
  let token = token.trim_matches(|c: char| !c.is_alphanumeric());
  let value = match token {
    "nam" | "narn" | "nan" | "male" | "m" => "Nam",
    "nữ" | "nu" | "nừ" | "nứ" | "nũ" | "nự" | "nử" | "nù" | "nú" | "nụ" | "nư"
    | "female" | "f" => "Nữ",
    _ => return None,
  };
  Some(value.to_string())
}

/// Canonicalize the many OCR renderings of the Vietnamese nationality; other
/// values are kept as cleaned free text.
pub fn nationality(raw: &str) -> Option<String> {
  let value = strip_artifacts(&collapse_whitespace(raw));
  if VIETNAM.is_match(&value) {
    return Some("Việt Nam".to_string());
  }
  (value.chars().filter(|c| c.is_alphabetic()).count() >= 2).then_some(value)
}

/// Trim leading and trailing punctuation left behind by OCR.
pub fn strip_artifacts(s: &str) -> String {
  let s = LEADING_ARTIFACTS.replace(s, "");
  TRAILING_ARTIFACTS.replace(&s, "").into_owned()
}

/// Clean an address or other free-text value. `labels` matches any label
/// text that may have bled into the capture.
pub fn free_text(raw: &str, labels: &Regex) -> Option<String> {
  let mut current = raw.to_string();
  // Removing one label can splice together the halves of another.
  for _ in 0..4 {
    let stripped = labels.replace_all(&current, " ");
    let next = strip_artifacts(&collapse_whitespace(&stripped));
    if next == current {
      break;
    }
    current = next;
  }
  (current.chars().filter(|c| c.is_alphanumeric()).count() >= 2).then_some(current)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn id_number_accepts_nine_or_twelve_digits() {
    assert_eq!(id_number("06 0098 0021 36").as_deref(), Some("060098002136"));
    assert_eq!(id_number("123.456.789").as_deref(), Some("123456789"));
    assert_eq!(id_number("1234567"), None);
    assert_eq!(id_number("1234567890"), None);
  }

  #[test]
  fn date_reparses_and_range_checks() {
    assert_eq!(date("12/ 04/1998", false).as_deref(), Some("12/04/1998"));
    assert_eq!(date("1-4-1998", false).as_deref(), Some("01/04/1998"));
    assert_eq!(date("12041998", false).as_deref(), Some("12/04/1998"));
    assert_eq!(date("32/01/2000", false), None);
    assert_eq!(date("01/13/2000", false), None);
    assert_eq!(date("01/01/1899", false), None);
    assert_eq!(date("01/01/2101", false), None);
  }

  #[test]
  fn no_expiry_phrasings_become_the_sentinel() {
    for raw in ["Không thời hạn", "KHONG THOI HAN", "Vô thời hạn", NO_EXPIRY] {
      assert_eq!(date(raw, true).as_deref(), Some(NO_EXPIRY), "{raw}");
    }
    assert_eq!(date("Không thời hạn", false), None);
    assert_eq!(date("Không thời hạn.", true).as_deref(), Some(NO_EXPIRY));
  }

  #[test]
  fn no_expiry_words_inside_a_date_do_not_replace_it() {
    assert_eq!(date("12/04/2038 indefinite", true), None);
    assert_eq!(date("indefinite 12/04/2038", true), None);
    assert!(!is_no_expiry("valid until 12/04/2038, not unlimited"));
    assert_eq!(date("12/04/2038", true).as_deref(), Some("12/04/2038"));
  }

  #[test]
  fn names_are_cleaned_and_upper_cased() {
    assert_eq!(full_name(" nguyễn  văn\nA. ").as_deref(), Some("NGUYỄN VĂN A"));
    assert_eq!(full_name("1 A 2"), None);
  }

  #[test]
  fn gender_folds_misspellings() {
    assert_eq!(gender("Nừ").as_deref(), Some("Nữ"));
    assert_eq!(gender(" NAM ").as_deref(), Some("Nam"));
    assert_eq!(gender("Unknown"), None);
  }

  #[test]
  fn nationality_variants_are_canonicalized() {
    for raw in ["Viet Nam", "Việt Nain", "ViệtNam", "VIỆT NAM.", "Vietnamese"] {
      assert_eq!(nationality(raw).as_deref(), Some("Việt Nam"), "{raw}");
    }
    assert_eq!(nationality("Lào").as_deref(), Some("Lào"));
  }

  #[test]
  fn normalizers_are_idempotent() {
    let labels = Regex::new(r"(?i)quê\s*quán").unwrap();
    let once = free_text(": Quê Quê quán quán Hà Nội, ", &labels);
    assert_eq!(once.as_deref().and_then(|v| free_text(v, &labels)), once);

    let id = id_number("06 0098 0021 36").unwrap();
    assert_eq!(id_number(&id).as_deref(), Some(id.as_str()));

    let d = date("5.6.2001", false).unwrap();
    assert_eq!(date(&d, false).as_deref(), Some(d.as_str()));

    let n = full_name("trần thị b").unwrap();
    assert_eq!(full_name(&n).as_deref(), Some(n.as_str()));

    let g = gender("nu").unwrap();
    assert_eq!(gender(&g).as_deref(), Some(g.as_str()));

    let v = nationality("Viet Nam").unwrap();
    assert_eq!(nationality(&v).as_deref(), Some(v.as_str()));

    let e = date("Khong thoi han", true).unwrap();
    assert_eq!(date(&e, true).as_deref(), Some(e.as_str()));
  }

  #[test]
  fn free_text_strips_labels_and_artifacts() {
    let labels = Regex::new(r"(?i)place\s*of\s*residence").unwrap();
    assert_eq!(
      free_text("/ Place of residence: Thôn 3, Xã Tân Lập |", &labels).as_deref(),
      Some("Thôn 3, Xã Tân Lập"),
    );
    assert_eq!(free_text(" : ", &labels), None);
  }
}
