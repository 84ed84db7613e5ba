use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Number, Value};

use crate::{
    booths::BoothLookup,
    partition::EntityKind,
    registry::{AcKey, AcRegistry},
    store::Document,
};

/// Legacy field resolution is data, not branching: each canonical field
/// carries an ordered candidate list evaluated first-match-wins.
pub const AC_ID_FIELDS: &[&str] = &["aci_id", "acId", "_acId", "ac_id"];
pub const BOOTH_ID_FIELDS: &[&str] = &["booth_id", "boothId", "booth"];
pub const BOOTH_NAME_FIELDS: &[&str] = &["boothname", "booth_name"];
pub const BOOTH_NO_FIELDS: &[&str] = &["boothno", "booth_no"];

/// Canonical output fields every reconciled document exposes.
pub const AC_NAME_FIELD: &str = "aci_name";
pub const BOOTH_NAME_FIELD: &str = "boothname";
pub const BOOTH_NO_FIELD: &str = "boothno";

pub fn first_value<'a>(document: &'a Document, candidates: &[&str]) -> Option<&'a Value> {
    candidates
        .iter()
        .find_map(|field| document.get(*field))
        .filter(|value| !value.is_null())
}

pub fn first_string<'a>(document: &'a Document, candidates: &[&str]) -> Option<&'a str> {
    first_value(document, candidates).and_then(Value::as_str)
}

/// Resolves the document's constituency key through the candidate list and
/// the registry's identifier normalizer.
pub fn resolve_ac_key(document: &Document, registry: &AcRegistry) -> Option<AcKey> {
    first_value(document, AC_ID_FIELDS).and_then(|value| registry.resolve(value))
}

/// Fallback booth number extraction for free-text booth references of the
/// form `BOOTH<digits>...` (e.g. `BOOTH3-119` yields `BOOTH3`).
pub fn extract_booth_prefix(text: &str) -> Option<&str> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"^BOOTH[0-9]+").expect("valid booth pattern"));
    pattern.find(text.trim()).map(|found| found.as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetType {
    String,
    Number,
}

/// Declarative coercion rule: `field` should be of `target` type. A value
/// already of the target type is untouched; a mismatched value converts
/// only when the conversion is unambiguous.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub field: &'static str,
    pub target: TargetType,
}

const fn rule(field: &'static str, target: TargetType) -> FieldRule {
    FieldRule { field, target }
}

const VOTER_RULES: &[FieldRule] = &[
    rule("age", TargetType::Number),
    rule("serialno", TargetType::Number),
    rule("boothno", TargetType::String),
    rule("is_voted", TargetType::String),
];

const SURVEY_RESPONSE_RULES: &[FieldRule] = &[
    rule("aci_id", TargetType::Number),
    rule("boothno", TargetType::String),
    rule("rating", TargetType::Number),
];

const MOBILE_ANSWER_RULES: &[FieldRule] = &[
    rule("aci_id", TargetType::Number),
    rule("boothno", TargetType::String),
    rule("question_no", TargetType::Number),
];

const AGENT_ACTIVITY_RULES: &[FieldRule] = &[
    rule("aci_id", TargetType::Number),
    rule("boothno", TargetType::String),
    rule("activity_count", TargetType::Number),
];

pub fn coercion_rules(kind: EntityKind) -> &'static [FieldRule] {
    match kind {
        EntityKind::Voters => VOTER_RULES,
        EntityKind::SurveyResponses => SURVEY_RESPONSE_RULES,
        EntityKind::MobileAnswers => MOBILE_ANSWER_RULES,
        EntityKind::AgentActivities => AGENT_ACTIVITY_RULES,
    }
}

/// Attempts the unambiguous conversion of `value` to `target`. Returns
/// `None` both when the value already conforms and when it cannot be
/// converted safely; skipping is an outcome, not an error, and either way
/// the stored field stays as-is.
pub fn coerce(value: &Value, target: TargetType) -> Option<Value> {
    match (value, target) {
        (Value::String(text), TargetType::Number) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return None;
            }
            if let Ok(int) = trimmed.parse::<i64>() {
                return Some(Value::Number(Number::from(int)));
            }
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|float| float.is_finite())
                .and_then(Number::from_f64)
                .map(Value::Number)
        }
        (Value::Number(number), TargetType::String) => Some(Value::String(number.to_string())),
        (Value::Bool(flag), TargetType::String) => Some(Value::String(flag.to_string())),
        _ => None,
    }
}

/// Delta for the missing-field migration: canonical AC name and booth
/// name/number derivation. Returns only the fields that must change, so
/// callers can issue partial updates; an already-conformant document
/// yields an empty delta.
pub fn missing_field_delta(
    document: &Document,
    registry: &AcRegistry,
    booths: &BoothLookup,
) -> Document {
    let mut delta = Document::new();

    // AC name: derived from the resolved key. A key with no name mapping
    // writes an explicit null so consumers can tell "no mapping" from
    // "mapping is blank"; the presence of the field (null included) marks
    // the document as handled.
    if !document.contains_key(AC_NAME_FIELD) {
        if let Some(ac) = resolve_ac_key(document, registry) {
            let name = registry
                .name_of(ac)
                .map(|name| Value::String(name.to_string()))
                .unwrap_or(Value::Null);
            delta.insert(AC_NAME_FIELD.to_string(), name);
        }
    }

    if let Some(booth_id) = first_string(document, BOOTH_ID_FIELDS) {
        match booths.get(booth_id.trim()) {
            // A lookup entry is authoritative over anything extracted from
            // free text.
            Some(info) => {
                if field_is_unset(document, BOOTH_NAME_FIELD) {
                    if let Some(name) = &info.name {
                        delta.insert(BOOTH_NAME_FIELD.to_string(), Value::String(name.clone()));
                    }
                }
                if field_is_unset(document, BOOTH_NO_FIELD) {
                    if let Some(number) = &info.number {
                        delta.insert(BOOTH_NO_FIELD.to_string(), Value::String(number.clone()));
                    }
                }
            }
            None => {
                if field_is_unset(document, BOOTH_NO_FIELD) {
                    if let Some(prefix) = extract_booth_prefix(booth_id) {
                        delta.insert(BOOTH_NO_FIELD.to_string(), Value::String(prefix.to_string()));
                    }
                }
            }
        }
    }

    delta
}

/// Delta for the type-fix migration: the declarative per-kind coercion
/// rules applied to whatever fields are present.
pub fn type_fix_delta(kind: EntityKind, document: &Document) -> Document {
    let mut delta = Document::new();
    for rule in coercion_rules(kind) {
        let Some(value) = document.get(rule.field) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        if let Some(converted) = coerce(value, rule.target) {
            delta.insert(rule.field.to_string(), converted);
        }
    }
    delta
}

/// Combined delta: everything reconciliation would change on `document`.
pub fn delta(
    kind: EntityKind,
    document: &Document,
    registry: &AcRegistry,
    booths: &BoothLookup,
) -> Document {
    let mut combined = missing_field_delta(document, registry, booths);
    for (field, value) in type_fix_delta(kind, document) {
        combined.insert(field, value);
    }
    combined
}

/// Read-path form: the fully normalized document. Idempotent by
/// construction, since a reconciled document produces an empty delta.
pub fn reconcile(
    kind: EntityKind,
    document: &Document,
    registry: &AcRegistry,
    booths: &BoothLookup,
) -> Document {
    let mut normalized = document.clone();
    for (field, value) in delta(kind, document, registry, booths) {
        normalized.insert(field, value);
    }
    normalized
}

fn field_is_unset(document: &Document, field: &str) -> bool {
    match document.get(field) {
        None | Some(Value::Null) => true,
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booths::BoothInfo;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn registry() -> AcRegistry {
        AcRegistry::default_table()
    }

    #[test]
    fn derives_ac_name_from_any_legacy_id_field() {
        let booths = BoothLookup::new();
        for field in ["aci_id", "acId", "_acId", "ac_id"] {
            let document = doc(json!({"_id": "s1", field: 119}));
            let delta = missing_field_delta(&document, &registry(), &booths);
            assert_eq!(
                delta.get(AC_NAME_FIELD),
                Some(&json!("Thondamuthur")),
                "failed for {field}"
            );
        }
    }

    #[test]
    fn legacy_id_fields_resolve_first_match_wins() {
        let document = doc(json!({"aci_id": 121, "acId": 119}));
        assert_eq!(resolve_ac_key(&document, &registry()), Some(121));
        // A null canonical field falls through to the next candidate.
        let document = doc(json!({"aci_id": null, "acId": 119}));
        assert_eq!(resolve_ac_key(&document, &registry()), Some(119));
    }

    #[test]
    fn unmapped_ac_key_yields_explicit_null() {
        let booths = BoothLookup::new();
        let document = doc(json!({"aci_id": 999}));
        let delta = missing_field_delta(&document, &registry(), &booths);
        assert_eq!(delta.get(AC_NAME_FIELD), Some(&Value::Null));
    }

    #[test]
    fn present_ac_name_is_left_alone_even_when_blank() {
        let booths = BoothLookup::new();
        let document = doc(json!({"aci_id": 119, "aci_name": ""}));
        assert!(missing_field_delta(&document, &registry(), &booths).is_empty());
    }

    #[test]
    fn booth_lookup_is_authoritative_over_pattern_fallback() {
        let mut booths = BoothLookup::new();
        booths.insert(
            "BOOTH3-119".to_string(),
            BoothInfo {
                name: Some("Govt School".into()),
                number: Some("3".into()),
            },
        );
        let document = doc(json!({"aci_id": 119, "booth_id": "BOOTH3-119"}));
        let delta = missing_field_delta(&document, &registry(), &booths);
        assert_eq!(delta.get(BOOTH_NAME_FIELD), Some(&json!("Govt School")));
        assert_eq!(delta.get(BOOTH_NO_FIELD), Some(&json!("3")));
    }

    #[test]
    fn pattern_fallback_sets_number_but_not_name() {
        let booths = BoothLookup::new();
        let document = doc(json!({"aci_id": 119, "booth_id": "BOOTH3-119"}));
        let delta = missing_field_delta(&document, &registry(), &booths);
        assert_eq!(delta.get(BOOTH_NO_FIELD), Some(&json!("BOOTH3")));
        assert!(!delta.contains_key(BOOTH_NAME_FIELD));
    }

    #[test]
    fn booth_prefix_extraction() {
        assert_eq!(extract_booth_prefix("BOOTH3-119"), Some("BOOTH3"));
        assert_eq!(extract_booth_prefix(" BOOTH12 "), Some("BOOTH12"));
        assert_eq!(extract_booth_prefix("BOOTH"), None);
        assert_eq!(extract_booth_prefix("booth3"), None);
        assert_eq!(extract_booth_prefix("WARD-BOOTH3"), None);
    }

    #[test]
    fn coercion_converts_only_unambiguous_values() {
        assert_eq!(
            coerce(&json!("42"), TargetType::Number),
            Some(json!(42))
        );
        assert_eq!(
            coerce(&json!(" 3.5 "), TargetType::Number),
            Some(json!(3.5))
        );
        assert_eq!(coerce(&json!("N/A"), TargetType::Number), None);
        assert_eq!(coerce(&json!(""), TargetType::Number), None);
        assert_eq!(coerce(&json!(42), TargetType::Number), None);
        assert_eq!(coerce(&json!(7), TargetType::String), Some(json!("7")));
        assert_eq!(
            coerce(&json!(true), TargetType::String),
            Some(json!("true"))
        );
        assert_eq!(coerce(&json!(true), TargetType::Number), None);
        assert_eq!(coerce(&json!({"x": 1}), TargetType::String), None);
    }

    #[test]
    fn non_numeric_age_is_never_coerced() {
        let document = doc(json!({"_id": "v1", "age": "N/A"}));
        assert!(type_fix_delta(EntityKind::Voters, &document).is_empty());
    }

    #[test]
    fn type_fix_delta_follows_kind_rules() {
        let document = doc(json!({
            "_id": "s1",
            "aci_id": "119",
            "boothno": 3,
            "rating": "4",
            "free_text": "untouched"
        }));
        let delta = type_fix_delta(EntityKind::SurveyResponses, &document);
        assert_eq!(delta.get("aci_id"), Some(&json!(119)));
        assert_eq!(delta.get("boothno"), Some(&json!("3")));
        assert_eq!(delta.get("rating"), Some(&json!(4)));
        assert!(!delta.contains_key("free_text"));
    }

    #[test]
    fn reconcile_is_idempotent() {
        let mut booths = BoothLookup::new();
        booths.insert(
            "B7".to_string(),
            BoothInfo {
                name: Some("Library".into()),
                number: Some("7".into()),
            },
        );
        let document = doc(json!({
            "_id": "s1",
            "aci_id": "119",
            "booth_id": "B7",
            "rating": "4",
            "age_group": "30-39"
        }));
        let once = reconcile(EntityKind::SurveyResponses, &document, &registry(), &booths);
        let twice = reconcile(EntityKind::SurveyResponses, &once, &registry(), &booths);
        assert_eq!(once, twice);
        assert!(delta(EntityKind::SurveyResponses, &once, &registry(), &booths).is_empty());
        assert_eq!(once.get(AC_NAME_FIELD), Some(&json!("Thondamuthur")));
        assert_eq!(once.get("aci_id"), Some(&json!(119)));
        assert_eq!(once.get(BOOTH_NAME_FIELD), Some(&json!("Library")));
        // Unknown fields round-trip untouched.
        assert_eq!(once.get("age_group"), Some(&json!("30-39")));
    }
}
