//! The label and value pattern table for Vietnamese identity cards.
//!
//! Every field has an ordered list of patterns. Labelled patterns come first,
//! strict bilingual labels before bare or abbreviated ones; positional patterns
//! that ignore labels come last. A labelled value runs from the end of its
//! label to the start of the next recognised label, so a missing or garbled
//! value never bleeds into a neighbouring field.

use regex::Regex;

use super::normalize;
use crate::identity::{DocumentKind, Field};

// ─── Static tables ───────────────────────────────────────────────────────────

/// How a captured value is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValueKind {
  IdNumber,
  Name,
  Date,
  /// A date that may also read "no expiry".
  ExpiryDate,
  Gender,
  Nationality,
  FreeText,
}

impl ValueKind {
  fn value_pattern(self) -> &'static str {
    match self {
      Self::IdNumber => r"^[^0-9]{0,8}([0-9][0-9 .]{7,22}[0-9])",
      Self::Name => r"^[^\p{L}]*(\p{L}[\p{L}\p{M} ]*)",
      Self::Date => {
        r"^[^0-9]{0,16}?([0-9]{1,2} ?[/\-.] ?[0-9]{1,2} ?[/\-.] ?[0-9]{4}|[0-9]{8})"
      }
      Self::ExpiryDate => {
        r"(?i)^[^0-9]{0,16}?([0-9]{1,2} ?[/\-.] ?[0-9]{1,2} ?[/\-.] ?[0-9]{4}|[0-9]{8}|(?:kh[oôóố]ng|v[oôó]) ?th[oờơớ]i ?h[aạ]n)"
      }
      Self::Gender => r"^[^\p{L}]*(\p{L}+)",
      Self::Nationality => r"^[^\p{L}]*(\p{L}[\p{L}\p{M} ]{0,30})",
      Self::FreeText => r"(?s)^(.+)$",
    }
  }
}

struct FieldDef {
  field:      Field,
  kind:       ValueKind,
  /// Labels that also terminate other fields' values.
  labels:     &'static [&'static str],
  /// Labels too ambiguous to terminate other values (e.g. a bare "Số" also
  /// starts street addresses).
  weak:       &'static [&'static str],
  positional: &'static [&'static str],
}

const FIELDS: &[FieldDef] = &[
  FieldDef {
    field:      Field::IdNumber,
    kind:       ValueKind::IdNumber,
    labels:     &[
      r"s[ốôoóồ] ?đ[iịí]nh ?danh ?c[aá] ?nh[aâ]n(?: ?/? ?personal ?identification ?number)?",
      r"s[ốôoóồ] ?/ ?n[oọ0]\.?",
      r"personal ?identification ?number",
    ],
    weak:       &[r"s[ốôó](?: ?cmnd| ?cccd)? ?:"],
    positional: &[
      r"\b([0-9]{12})\b",
      r"\b([0-9]{9})\b",
      r"\b([0-9]{2,4}(?:[ .][0-9]{2,4}){2,5})\b",
    ],
  },
  FieldDef {
    field:      Field::FullName,
    kind:       ValueKind::Name,
    labels:     &[
      r"h[oọ] ?v[aà] ?t[eêế]n(?: ?/? ?full ?name)?",
      r"h[oọ] ?t[eêế]n(?: ?khai ?sinh)?(?: ?/? ?full ?name)?",
      r"full ?name",
    ],
    weak:       &[],
    positional: &[],
  },
  FieldDef {
    field:      Field::DateOfBirth,
    kind:       ValueKind::Date,
    labels:     &[
      r"ng[aà]y,? ?th[aá]ng,? ?n[aă]m ?sinh(?: ?/? ?date ?of ?birth)?",
      r"ng[aà]y ?sinh(?: ?/? ?date ?of ?birth)?",
      r"date ?of ?birth",
    ],
    weak:       &[r"\bsinh ?ng[aà]y"],
    positional: &[r"([0-9]{1,2} ?/ ?[0-9]{1,2} ?/ ?[0-9]{4})"],
  },
  FieldDef {
    field:      Field::Gender,
    kind:       ValueKind::Gender,
    labels:     &[r"gi[oớ][iíì] ?t[iíì]nh(?: ?/? ?sex)?", r"\bsex\b"],
    weak:       &[],
    positional: &[],
  },
  FieldDef {
    field:      Field::Nationality,
    kind:       ValueKind::Nationality,
    labels:     &[r"qu[oố]c ?t[iịí]ch(?: ?/? ?nationality)?", r"nationality"],
    weak:       &[],
    positional: &[],
  },
  FieldDef {
    field:      Field::PlaceOfOrigin,
    kind:       ValueKind::FreeText,
    labels:     &[
      r"qu[eê] ?qu[aá]n(?: ?/? ?place ?of ?origin)?",
      r"nguy[eê]n ?qu[aá]n",
      r"place ?of ?origin",
    ],
    weak:       &[],
    positional: &[],
  },
  FieldDef {
    field:      Field::PlaceOfResidence,
    kind:       ValueKind::FreeText,
    labels:     &[
      r"n[oơ]i ?th[uư][oờơ]ng ?tr[uú](?: ?/? ?place ?of ?residence)?",
      r"n[oơ]i ?c[uư] ?tr[uú](?: ?/? ?place ?of ?residence)?",
      r"n[oơ]i ?đkhk ?th[uư][oờơ]ng ?tr[uú]",
      r"place ?of ?residence",
    ],
    weak:       &[],
    positional: &[],
  },
  FieldDef {
    field:      Field::ExpiryDate,
    kind:       ValueKind::ExpiryDate,
    labels:     &[
      r"c[oó] ?gi[aá] ?tr[iị] ?đ[eếê]n(?: ?/? ?date ?of ?expiry)?",
      r"ng[aà]y ?h[eế]t ?h[aạ]n",
      r"date ?of ?expiry",
    ],
    weak:       &[],
    positional: &[],
  },
  FieldDef {
    field:      Field::DateOfIssue,
    kind:       ValueKind::Date,
    labels:     &[
      r"ng[aà]y,? ?th[aá]ng,? ?n[aă]m ?/ ?date,? ?month,? ?year",
      r"ng[aà]y ?c[aấ]p(?: ?/? ?date ?of ?issue)?",
      r"date ?of ?issue",
    ],
    weak:       &[r"ng[aà]y,? ?th[aá]ng,? ?n[aă]m ?:"],
    positional: &[],
  },
  FieldDef {
    field:      Field::PlaceOfIssue,
    kind:       ValueKind::FreeText,
    labels:     &[
      r"n[oơ]i ?c[aấ]p(?: ?/? ?place ?of ?issue)?",
      r"place ?of ?issue",
    ],
    weak:       &[],
    positional: &[
      r"(?i)(c[uụ]c ?c[aả]nh ?s[aá]t ?qu[aả]n ?l[yý] ?h[aà]nh ?ch[ií]nh ?v[eề] ?tr[aậ]t ?t[uự] ?x[aã] ?h[oộ]i)",
      r"(?i)(c[uụ]c ?c[aả]nh ?s[aá]t ?đkql ?c[uư] ?tr[uú] ?v[aà] ?dlqg ?v[eề] ?d[aâ]n ?c[uư])",
    ],
  },
  FieldDef {
    field:      Field::PersonalIdentificationFeatures,
    kind:       ValueKind::FreeText,
    labels:     &[
      r"đ[aặ]c ?đi[eể]m ?nh[aâ]n ?d[aạ]ng(?: ?/? ?personal ?identification)?",
      r"d[aấ]u ?v[eế]t ?ri[eê]ng ?v[aà] ?d[iị] ?h[iì]nh",
    ],
    weak:       &[],
    positional: &[],
  },
  FieldDef {
    field:      Field::Ethnicity,
    kind:       ValueKind::FreeText,
    labels:     &[r"d[aâ]n ?t[oộ]c(?: ?/? ?ethnicity)?", r"ethnicity"],
    weak:       &[],
    positional: &[],
  },
  FieldDef {
    field:      Field::Religion,
    kind:       ValueKind::FreeText,
    labels:     &[r"t[oô]n ?gi[aá]o(?: ?/? ?religion)?", r"religion"],
    weak:       &[],
    positional: &[],
  },
];

/// Card boilerplate that terminates a value but belongs to no field.
const BOILERPLATE: &[&str] = &[
  r"c[oộ]ng ?h[oò]a ?x[aã] ?h[oộ]i ?ch[uủ] ?ngh[iĩ]a ?vi[eệ]t ?nam",
  r"socialist ?republic ?of ?viet ?nam",
  r"đ[oộ]c ?l[aậ]p ?-? ?t[uự] ?do ?-? ?h[aạ]nh ?ph[uú]c",
  r"independence ?-? ?freedom ?-? ?happiness",
  r"c[aă]n ?c[uư][oớ]c ?c[oô]ng ?d[aâ]n",
  r"citizen ?identity ?card",
  r"ch[uứ]ng ?minh ?nh[aâ]n ?d[aâ]n",
  r"c[uụ]c ?tr[uư][oở]ng",
  r"ng[oó]n ?tr[oỏ] ?(?:tr[aá]i|ph[aả]i)",
  r"(?:left|right) ?index ?finger",
];

/// Known OCR confusions, applied in order after whitespace has been
/// collapsed: unaccented labels, merged keywords, and stray glyphs.
const SUBSTITUTIONS: &[(&str, &str)] = &[
  (r"[|¦]", " "),
  (r"h[oọ]v[aà]t[eêế]n", "Họ và tên "),
  (r"ng[aà]ysinh", "Ngày sinh "),
  (r"gi[oớ]it[ií]nh", "Giới tính "),
  (r"qu[oố]ct[iị]ch", "Quốc tịch "),
  (r"qu[eê]qu[aá]n", "Quê quán "),
  (r"n[oơ]ith[uư][oờ]ngtr[uú]", "Nơi thường trú "),
  (r"c[oó]gi[aá]tr[iị]đ[eế]n", "Có giá trị đến "),
  (r"\bho va ten\b", "Họ và tên"),
  (r"\bngay, ?thang, ?nam sinh\b", "Ngày, tháng, năm sinh"),
  (r"\bngay sinh\b", "Ngày sinh"),
  (r"\bgioi tinh\b", "Giới tính"),
  (r"\bquoc tich\b", "Quốc tịch"),
  (r"\bque quan\b", "Quê quán"),
  (r"\bnoi thuong tru\b", "Nơi thường trú"),
  (r"\bnoi cu tru\b", "Nơi cư trú"),
  (r"\bco gia tri den\b", "Có giá trị đến"),
  (r"\bdac diem nhan dang\b", "Đặc điểm nhân dạng"),
  (r"\bdan toc\b", "Dân tộc"),
  (r"\bton giao\b", "Tôn giáo"),
  (r"\bcan cuoc cong dan\b", "CĂN CƯỚC CÔNG DÂN"),
  (r"\bchung minh nhan dan\b", "CHỨNG MINH NHÂN DÂN"),
  (r"\bcong hoa xa hoi chu nghia viet nam\b", "CỘNG HÒA XÃ HỘI CHỦ NGHĨA VIỆT NAM"),
  (r"\bdoc lap - tu do - hanh phuc\b", "Độc lập - Tự do - Hạnh phúc"),
  (r"\bkhong thoi han\b", "Không thời hạn"),
];

const CITIZEN_HEADER: &str = r"(?i)c[aă]n ?c[uư][oớ]c";
const LEGACY_HEADER: &str = r"(?i)ch[uứ]ng ?minh";

// ─── Compiled rules ──────────────────────────────────────────────────────────

enum Pattern {
  Labelled { label: Regex, value: Regex },
  Positional { value: Regex },
}

struct FieldRule {
  field:    Field,
  kind:     ValueKind,
  /// Union of this field's own labels, strong and weak.
  own:      Regex,
  patterns: Vec<Pattern>,
}

/// The compiled pattern table. Built once and shared read-only.
pub(crate) struct Rules {
  fields:        Vec<FieldRule>,
  /// Any strong label or boilerplate; marks where a value ends.
  stops:         Regex,
  substitutions: Vec<(Regex, &'static str)>,
  citizen:       Regex,
  legacy:        Regex,
}

fn compile(pattern: &str) -> Regex {
  Regex::new(pattern).expect("static extraction pattern")
}

fn label_regex(alternatives: impl IntoIterator<Item = &'static str>) -> Regex {
  let joined: Vec<String> = alternatives
    .into_iter()
    .map(|p| format!("(?:{p})"))
    .collect();
  compile(&format!(r"(?i)\b(?:{})", joined.join("|")))
}

impl Rules {
  pub(crate) fn new() -> Self {
    let fields = FIELDS
      .iter()
      .map(|def| {
        let value = def.kind.value_pattern();
        let patterns = def
          .labels
          .iter()
          .chain(def.weak)
          .map(|label| Pattern::Labelled {
            label: label_regex([*label]),
            value: compile(value),
          })
          .chain(def.positional.iter().map(|p| Pattern::Positional {
            value: compile(p),
          }))
          .collect();
        FieldRule {
          field: def.field,
          kind: def.kind,
          own: label_regex(def.labels.iter().chain(def.weak).copied()),
          patterns,
        }
      })
      .collect();

    let stops = label_regex(
      FIELDS
        .iter()
        .flat_map(|def| def.labels.iter().copied())
        .chain(BOILERPLATE.iter().copied()),
    );

    let substitutions = SUBSTITUTIONS
      .iter()
      .map(|(pattern, replacement)| (compile(&format!("(?i){pattern}")), *replacement))
      .collect();

    Self {
      fields,
      stops,
      substitutions,
      citizen: compile(CITIZEN_HEADER),
      legacy: compile(LEGACY_HEADER),
    }
  }

  /// Collapse whitespace and repair known OCR confusions.
  pub(crate) fn normalize_text(&self, raw: &str) -> String {
    let mut text = normalize::collapse_whitespace(raw);
    for (pattern, replacement) in &self.substitutions {
      if pattern.is_match(&text) {
        text = pattern.replace_all(&text, *replacement).into_owned();
      }
    }
    normalize::collapse_whitespace(&text)
  }

  /// Validate a raw value for `field`, whatever its origin.
  pub(crate) fn normalize_value(&self, field: Field, raw: &str) -> Option<String> {
    let kind = self
      .fields
      .iter()
      .find(|rule| rule.field == field)
      .map(|rule| rule.kind)?;
    match kind {
      ValueKind::IdNumber => normalize::id_number(raw),
      ValueKind::Name => normalize::full_name(raw),
      ValueKind::Date => normalize::date(raw, false),
      ValueKind::ExpiryDate => normalize::date(raw, true),
      ValueKind::Gender => normalize::gender(raw),
      ValueKind::Nationality => normalize::nationality(raw),
      ValueKind::FreeText => normalize::free_text(raw, &self.stops),
    }
  }

  /// Run every field's patterns over normalized `text`.
  pub(crate) fn match_fields(&self, text: &str) -> Vec<(Field, String)> {
    self
      .fields
      .iter()
      .filter_map(|rule| self.match_field(rule, text).map(|v| (rule.field, v)))
      .collect()
  }

  fn match_field(&self, rule: &FieldRule, text: &str) -> Option<String> {
    for pattern in &rule.patterns {
      let found = match pattern {
        Pattern::Labelled { label, value } => label.find_iter(text).find_map(|m| {
          let segment = self.segment(rule, text, m.end());
          self.capture(rule.field, value, segment)
        }),
        Pattern::Positional { value } => value
          .captures_iter(text)
          .find_map(|caps| self.normalize_value(rule.field, caps.get(1)?.as_str())),
      };
      if found.is_some() {
        return found;
      }
    }
    None
  }

  fn capture(&self, field: Field, value: &Regex, segment: &str) -> Option<String> {
    let raw = value.captures(segment)?.get(1)?.as_str();
    self.normalize_value(field, raw)
  }

  /// The text between `from` and the next label. A label of the same field
  /// directly after `from` (e.g. the English half of a bilingual label the
  /// first pattern missed) is skipped rather than ending an empty value.
  fn segment<'t>(&self, rule: &FieldRule, text: &'t str, from: usize) -> &'t str {
    let mut start = from;
    while let Some(stop) = self.stops.find_at(text, start) {
      let gap = &text[start..stop.start()];
      let empty = !gap.chars().any(char::is_alphanumeric);
      if empty && rule.own.is_match(stop.as_str()) {
        start = stop.end();
        continue;
      }
      return &text[start..stop.start()];
    }
    &text[start..]
  }

  pub(crate) fn document_kind(&self, text: &str, id_number: Option<&str>) -> DocumentKind {
    match id_number.map(str::len) {
      Some(12) => DocumentKind::CitizenId,
      Some(9) => DocumentKind::LegacyId,
      _ if self.citizen.is_match(text) => DocumentKind::CitizenId,
      _ if self.legacy.is_match(text) => DocumentKind::LegacyId,
      _ => DocumentKind::Unknown,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn rules() -> Rules { Rules::new() }

  fn value(rules: &Rules, text: &str, field: Field) -> Option<String> {
    let text = rules.normalize_text(text);
    rules
      .match_fields(&text)
      .into_iter()
      .find(|(f, _)| *f == field)
      .map(|(_, v)| v)
  }

  #[test]
  fn every_field_has_a_rule() {
    let rules = rules();
    for field in Field::all() {
      assert!(rules.fields.iter().any(|r| r.field == field), "{field}");
    }
  }

  #[test]
  fn unaccented_labels_are_repaired() {
    let rules = rules();
    let text = rules.normalize_text("Ho va ten:  NGUYEN VAN A\nNgay sinh: 01/02/1990");
    assert!(text.contains("Họ và tên"));
    assert!(text.contains("Ngày sinh"));
    assert!(!text.contains('\n'));
  }

  #[test]
  fn merged_keywords_are_split() {
    let rules = rules();
    let text = rules.normalize_text("HọvàtênTRẦN THỊ B");
    assert_eq!(value(&rules, &text, Field::FullName).as_deref(), Some("TRẦN THỊ B"));
  }

  #[test]
  fn values_stop_at_the_next_label() {
    let rules = rules();
    let text = "Quê quán / Place of origin: Tân Thành, Kim Sơn, Ninh Bình \
                Nơi thường trú / Place of residence: Số 5 ngõ 10, Hà Nội";
    assert_eq!(
      value(&rules, text, Field::PlaceOfOrigin).as_deref(),
      Some("Tân Thành, Kim Sơn, Ninh Bình"),
    );
    assert_eq!(
      value(&rules, text, Field::PlaceOfResidence).as_deref(),
      Some("Số 5 ngõ 10, Hà Nội"),
    );
  }

  #[test]
  fn duplicated_english_label_is_skipped() {
    let rules = rules();
    let text = "Giới tính / Sex / Sex: Nữ Quốc tịch: Viet Nam";
    assert_eq!(value(&rules, text, Field::Gender).as_deref(), Some("Nữ"));
    assert_eq!(value(&rules, text, Field::Nationality).as_deref(), Some("Việt Nam"));
  }

  #[test]
  fn missing_value_does_not_steal_the_next_field() {
    let rules = rules();
    let text = "Họ và tên: Ngày sinh: 12/04/1998";
    assert_eq!(value(&rules, text, Field::FullName), None);
    assert_eq!(value(&rules, text, Field::DateOfBirth).as_deref(), Some("12/04/1998"));
  }

  #[test]
  fn positional_id_number_is_the_last_resort() {
    let rules = rules();
    assert_eq!(
      value(&rules, "CĂN CƯỚC CÔNG DÂN 060098002136", Field::IdNumber).as_deref(),
      Some("060098002136"),
    );
    assert_eq!(
      value(&rules, "Số / No.: 001 099 012 345 Họ và tên: A B", Field::IdNumber).as_deref(),
      Some("001099012345"),
    );
  }

  #[test]
  fn issue_date_label_does_not_capture_birth_date() {
    let rules = rules();
    let text = "Ngày, tháng, năm sinh / Date of birth: 12/04/1998";
    assert_eq!(value(&rules, text, Field::DateOfIssue), None);
    assert_eq!(value(&rules, text, Field::DateOfBirth).as_deref(), Some("12/04/1998"));
  }

  #[test]
  fn expiry_reads_no_expiry_phrasing() {
    let rules = rules();
    let text = "Có giá trị đến: Không thời hạn";
    assert_eq!(
      value(&rules, text, Field::ExpiryDate).as_deref(),
      Some(crate::identity::NO_EXPIRY),
    );
  }

  #[test]
  fn place_of_issue_falls_back_to_the_issuing_authority() {
    let rules = rules();
    let text = "CỤC TRƯỞNG CỤC CẢNH SÁT QUẢN LÝ HÀNH CHÍNH VỀ TRẬT TỰ XÃ HỘI";
    assert_eq!(
      value(&rules, text, Field::PlaceOfIssue).as_deref(),
      Some("CỤC CẢNH SÁT QUẢN LÝ HÀNH CHÍNH VỀ TRẬT TỰ XÃ HỘI"),
    );
  }

  #[test]
  fn document_kind_prefers_id_length() {
    let rules = rules();
    assert_eq!(rules.document_kind("", Some("123456789")), DocumentKind::LegacyId);
    assert_eq!(
      rules.document_kind("CĂN CƯỚC CÔNG DÂN", None),
      DocumentKind::CitizenId,
    );
    assert_eq!(rules.document_kind("", None), DocumentKind::Unknown);
  }
}
