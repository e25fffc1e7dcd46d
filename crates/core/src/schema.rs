//! Declarative per-record schema validation.
//!
//! Every gate describes its input records as a list of [`FieldSpec`]s and
//! calls [`validate_record`]. Records arrive in one of two encodings:
//!
//! - [`Encoding::Json`]: values must already carry the right JSON type
//!   (`"1"` is not an integer, `1` is not a boolean).
//! - [`Encoding::Text`]: every value is a string cell (CSV). Integers are
//!   parsed, booleans use the [`parse_flag`] vocabulary, strings are trimmed.
//!
//! Dates are `YYYY-MM-DD` strings in both encodings. Unknown fields are
//! ignored. All absent required fields are reported together; the first
//! type or constraint violation aborts.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::error::{InputError, Location, Result};

/// Semantic type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Text
    Str,
    /// Whole number
    Int,
    /// Boolean
    Bool,
    /// List of strings; elements must be nonblank
    StrList,
    /// Free-form object
    Object,
    /// Calendar date, `YYYY-MM-DD`
    Date,
}

impl FieldType {
    fn describe(self, encoding: Encoding) -> &'static str {
        match (self, encoding) {
            (FieldType::Str, _) => "a string",
            (FieldType::Int, _) => "an integer",
            (FieldType::Bool, Encoding::Json) => "a boolean",
            (FieldType::Bool, Encoding::Text) => "a boolean (true/1/yes or false/0/no)",
            (FieldType::StrList, _) => "a list of nonblank strings",
            (FieldType::Object, _) => "an object",
            (FieldType::Date, _) => "a calendar date (YYYY-MM-DD)",
        }
    }
}

/// Additional restriction on a well-typed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// Any value of the type
    None,
    /// String that is not empty after trimming
    NonBlank,
    /// String from a fixed set
    OneOf(&'static [&'static str]),
    /// Integer from a fixed set
    IntIn(&'static [i64]),
    /// Integer >= 0
    NonNegative,
    /// List with at least one element
    NonEmpty,
}

/// One entry of a record contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name
    pub name: &'static str,
    /// Semantic type
    pub ty: FieldType,
    /// Value restriction
    pub constraint: Constraint,
    /// Whether the field may be absent
    pub optional: bool,
}

impl FieldSpec {
    /// A required field with no constraint.
    pub const fn required(name: &'static str, ty: FieldType) -> Self {
        Self { name, ty, constraint: Constraint::None, optional: false }
    }

    /// An optional field with no constraint.
    pub const fn optional(name: &'static str, ty: FieldType) -> Self {
        Self { name, ty, constraint: Constraint::None, optional: true }
    }

    /// Attach a constraint.
    pub const fn with(self, constraint: Constraint) -> Self {
        Self { constraint, ..self }
    }
}

/// How raw values are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Typed JSON values
    Json,
    /// String cells
    Text,
}

/// A validated, typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Text
    Str(String),
    /// Whole number
    Int(i64),
    /// Boolean
    Bool(bool),
    /// List of strings
    StrList(Vec<String>),
    /// Object
    Object(Map<String, Value>),
    /// Calendar date
    Date(NaiveDate),
}

/// A record that passed its contract. Accessors re-check the type so model
/// constructors can use `?` instead of unwrapping.
#[derive(Debug, Clone)]
pub struct ValidatedRecord {
    location: Location,
    values: BTreeMap<&'static str, FieldValue>,
}

impl ValidatedRecord {
    /// Where the record came from.
    pub fn location(&self) -> &Location {
        &self.location
    }

    fn get(&self, name: &str, expected: &str) -> Result<&FieldValue> {
        self.values.get(name).ok_or_else(|| InputError::WrongType {
            location: self.location.clone(),
            field: name.to_string(),
            expected: expected.to_string(),
        })
    }

    fn mismatch(&self, name: &str, expected: &str) -> InputError {
        InputError::WrongType {
            location: self.location.clone(),
            field: name.to_string(),
            expected: expected.to_string(),
        }
    }

    /// String field.
    pub fn str(&self, name: &str) -> Result<&str> {
        match self.get(name, "a string")? {
            FieldValue::Str(s) => Ok(s),
            _ => Err(self.mismatch(name, "a string")),
        }
    }

    /// Integer field.
    pub fn int(&self, name: &str) -> Result<i64> {
        match self.get(name, "an integer")? {
            FieldValue::Int(v) => Ok(*v),
            _ => Err(self.mismatch(name, "an integer")),
        }
    }

    /// Boolean field.
    pub fn bool(&self, name: &str) -> Result<bool> {
        match self.get(name, "a boolean")? {
            FieldValue::Bool(v) => Ok(*v),
            _ => Err(self.mismatch(name, "a boolean")),
        }
    }

    /// String list field.
    pub fn str_list(&self, name: &str) -> Result<&[String]> {
        match self.get(name, "a list of strings")? {
            FieldValue::StrList(v) => Ok(v),
            _ => Err(self.mismatch(name, "a list of strings")),
        }
    }

    /// Date field.
    pub fn date(&self, name: &str) -> Result<NaiveDate> {
        match self.get(name, "a calendar date")? {
            FieldValue::Date(d) => Ok(*d),
            _ => Err(self.mismatch(name, "a calendar date")),
        }
    }

    /// Optional object field.
    pub fn object_opt(&self, name: &str) -> Option<&Map<String, Value>> {
        match self.values.get(name) {
            Some(FieldValue::Object(map)) => Some(map),
            _ => None,
        }
    }
}

/// Recognized boolean tokens for text encodings, case-insensitive.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Validate `record` against `fields`.
pub fn validate_record(
    record: &Map<String, Value>,
    fields: &[FieldSpec],
    encoding: Encoding,
    location: &Location,
) -> Result<ValidatedRecord> {
    let missing: Vec<String> = fields
        .iter()
        .filter(|spec| !spec.optional && is_absent(record.get(spec.name)))
        .map(|spec| spec.name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(InputError::MissingFields { location: location.clone(), fields: missing });
    }

    let mut values = BTreeMap::new();
    for spec in fields {
        let raw = match record.get(spec.name) {
            Some(raw) if !is_absent(Some(raw)) => raw,
            _ => continue,
        };
        let value = coerce(raw, spec, encoding, location)?;
        check_constraint(&value, spec, location)?;
        values.insert(spec.name, value);
    }

    Ok(ValidatedRecord { location: location.clone(), values })
}

fn is_absent(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

fn coerce(raw: &Value, spec: &FieldSpec, encoding: Encoding, location: &Location) -> Result<FieldValue> {
    let wrong_type = || InputError::WrongType {
        location: location.clone(),
        field: spec.name.to_string(),
        expected: spec.ty.describe(encoding).to_string(),
    };

    match (encoding, spec.ty) {
        (Encoding::Json, FieldType::Str) => raw.as_str().map(|s| FieldValue::Str(s.to_string())).ok_or_else(wrong_type),
        (Encoding::Json, FieldType::Int) => raw.as_i64().map(FieldValue::Int).ok_or_else(wrong_type),
        (Encoding::Json, FieldType::Bool) => raw.as_bool().map(FieldValue::Bool).ok_or_else(wrong_type),
        (Encoding::Json, FieldType::StrList) => {
            let items = raw.as_array().ok_or_else(wrong_type)?;
            let mut tags = Vec::with_capacity(items.len());
            for item in items {
                match item.as_str() {
                    Some(s) if !s.trim().is_empty() => tags.push(s.to_string()),
                    _ => return Err(wrong_type()),
                }
            }
            Ok(FieldValue::StrList(tags))
        }
        (Encoding::Json, FieldType::Object) => raw.as_object().cloned().map(FieldValue::Object).ok_or_else(wrong_type),
        (_, FieldType::Date) => {
            let text = raw.as_str().ok_or_else(wrong_type)?;
            NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
                .map(FieldValue::Date)
                .map_err(|_| InputError::Constraint {
                    location: location.clone(),
                    field: spec.name.to_string(),
                    expected: spec.ty.describe(encoding).to_string(),
                    found: format!("{:?}", text),
                })
        }
        (Encoding::Text, ty) => {
            let text = raw.as_str().ok_or_else(wrong_type)?.trim();
            match ty {
                FieldType::Str => Ok(FieldValue::Str(text.to_string())),
                FieldType::Int => text.parse::<i64>().map(FieldValue::Int).map_err(|_| InputError::Constraint {
                    location: location.clone(),
                    field: spec.name.to_string(),
                    expected: ty.describe(encoding).to_string(),
                    found: format!("{:?}", text),
                }),
                FieldType::Bool => parse_flag(text).map(FieldValue::Bool).ok_or_else(|| InputError::Constraint {
                    location: location.clone(),
                    field: spec.name.to_string(),
                    expected: ty.describe(encoding).to_string(),
                    found: format!("{:?}", text),
                }),
                FieldType::StrList => Ok(FieldValue::StrList(
                    text.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect(),
                )),
                FieldType::Object | FieldType::Date => Err(wrong_type()),
            }
        }
    }
}

fn check_constraint(value: &FieldValue, spec: &FieldSpec, location: &Location) -> Result<()> {
    let violation = |expected: String, found: String| InputError::Constraint {
        location: location.clone(),
        field: spec.name.to_string(),
        expected,
        found,
    };

    match (spec.constraint, value) {
        (Constraint::None, _) => Ok(()),
        (Constraint::NonBlank, FieldValue::Str(s)) if s.trim().is_empty() => {
            Err(violation("a nonblank string".to_string(), format!("{:?}", s)))
        }
        (Constraint::OneOf(allowed), FieldValue::Str(s)) if !allowed.contains(&s.as_str()) => {
            Err(violation(format!("one of {}", allowed.join(", ")), format!("{:?}", s)))
        }
        (Constraint::IntIn(allowed), FieldValue::Int(v)) if !allowed.contains(v) => {
            let allowed: Vec<String> = allowed.iter().map(|a| a.to_string()).collect();
            Err(violation(format!("one of {}", allowed.join(", ")), v.to_string()))
        }
        (Constraint::NonNegative, FieldValue::Int(v)) if *v < 0 => Err(violation(">= 0".to_string(), v.to_string())),
        (Constraint::NonEmpty, FieldValue::StrList(items)) if items.is_empty() => {
            Err(violation("a non-empty list".to_string(), "[]".to_string()))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CONTRACT: &[FieldSpec] = &[
        FieldSpec::required("id", FieldType::Str).with(Constraint::NonBlank),
        FieldSpec::required("tier", FieldType::Int).with(Constraint::IntIn(&[1, 2, 3])),
        FieldSpec::required("flag", FieldType::Bool),
        FieldSpec::optional("context", FieldType::Object),
    ];

    fn record(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn loc() -> Location {
        Location::line("rows.jsonl", 4)
    }

    #[test]
    fn test_valid_json_record() {
        let rec = record(json!({"id": "a", "tier": 2, "flag": true, "extra": 9}));
        let validated = validate_record(&rec, CONTRACT, Encoding::Json, &loc()).unwrap();
        assert_eq!(validated.str("id").unwrap(), "a");
        assert_eq!(validated.int("tier").unwrap(), 2);
        assert!(validated.bool("flag").unwrap());
        assert!(validated.object_opt("context").is_none());
    }

    #[test]
    fn test_all_missing_fields_listed() {
        let rec = record(json!({"tier": 1}));
        let err = validate_record(&rec, CONTRACT, Encoding::Json, &loc()).unwrap_err();
        match err {
            InputError::MissingFields { fields, location } => {
                assert_eq!(fields, vec!["id".to_string(), "flag".to_string()]);
                assert_eq!(location.to_string(), "rows.jsonl:4");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_string_integer_rejected_in_json() {
        let rec = record(json!({"id": "a", "tier": "2", "flag": true}));
        let err = validate_record(&rec, CONTRACT, Encoding::Json, &loc()).unwrap_err();
        assert!(matches!(err, InputError::WrongType { ref field, .. } if field == "tier"));
        assert!(err.to_string().contains("rows.jsonl:4"));
    }

    #[test]
    fn test_out_of_enum_tier_rejected() {
        let rec = record(json!({"id": "a", "tier": 4, "flag": false}));
        let err = validate_record(&rec, CONTRACT, Encoding::Json, &loc()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Field `tier` must be one of 1, 2, 3 at rows.jsonl:4, found 4"
        );
    }

    #[test]
    fn test_blank_id_rejected() {
        let rec = record(json!({"id": "  ", "tier": 1, "flag": false}));
        let err = validate_record(&rec, CONTRACT, Encoding::Json, &loc()).unwrap_err();
        assert!(matches!(err, InputError::Constraint { ref field, .. } if field == "id"));
    }

    #[test]
    fn test_text_encoding_parses_cells() {
        let spec = &[
            FieldSpec::required("count", FieldType::Int).with(Constraint::NonNegative),
            FieldSpec::required("ok", FieldType::Bool),
            FieldSpec::required("day", FieldType::Date),
        ];
        let rec = record(json!({"count": " 12 ", "ok": "YES", "day": "2026-02-13"}));
        let validated = validate_record(&rec, spec, Encoding::Text, &Location::row("log.csv", 2)).unwrap();
        assert_eq!(validated.int("count").unwrap(), 12);
        assert!(validated.bool("ok").unwrap());
        assert_eq!(validated.date("day").unwrap(), NaiveDate::from_ymd_opt(2026, 2, 13).unwrap());

        let bad = record(json!({"count": "-1", "ok": "no", "day": "2026-02-13"}));
        let err = validate_record(&bad, spec, Encoding::Text, &Location::row("log.csv", 3)).unwrap_err();
        assert!(err.to_string().contains(">= 0"));
        assert!(err.to_string().contains("log.csv row 3"));
    }

    #[test]
    fn test_unrecognized_flag_token() {
        let spec = &[FieldSpec::required("ok", FieldType::Bool)];
        let rec = record(json!({"ok": "maybe"}));
        let err = validate_record(&rec, spec, Encoding::Text, &Location::row("log.csv", 5)).unwrap_err();
        assert!(matches!(err, InputError::Constraint { ref found, .. } if found == "\"maybe\""));
    }

    #[test]
    fn test_blank_tag_rejected() {
        let spec = &[FieldSpec::required("tags", FieldType::StrList).with(Constraint::NonEmpty)];
        let blank = record(json!({"tags": ["work", " "]}));
        assert!(validate_record(&blank, spec, Encoding::Json, &loc()).is_err());
        let empty = record(json!({"tags": []}));
        assert!(validate_record(&empty, spec, Encoding::Json, &loc()).is_err());
    }

    #[test]
    fn test_parse_flag_vocabulary() {
        for token in ["true", "TRUE", "1", "Yes"] {
            assert_eq!(parse_flag(token), Some(true));
        }
        for token in ["false", "0", "NO"] {
            assert_eq!(parse_flag(token), Some(false));
        }
        assert_eq!(parse_flag("y"), None);
        assert_eq!(parse_flag(""), None);
    }
}
