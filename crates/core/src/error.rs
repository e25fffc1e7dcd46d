//! Hard errors: inputs that cannot be evaluated at all.
//!
//! These are distinct from soft failures (threshold and coverage violations),
//! which are collected as plain strings by the evaluators.

use std::fmt;

/// Result type for input loading and validation.
pub type Result<T> = std::result::Result<T, InputError>;

/// Position of a record inside its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// 1-based line of a line-delimited file
    Line(usize),
    /// 1-based row of a tabular file (the header is row 1)
    Row(usize),
    /// 1-based record index in an in-memory collection
    Record(usize),
    /// The whole document (single-object files)
    Document,
}

/// Source file plus position, rendered as `path:line` or `path row N`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// File path or logical source name
    pub source: String,

    /// Position within the source
    pub position: Position,
}

impl Location {
    /// Location of a line in a line-delimited file.
    pub fn line(source: impl Into<String>, line: usize) -> Self {
        Self { source: source.into(), position: Position::Line(line) }
    }

    /// Location of a row in a tabular file.
    pub fn row(source: impl Into<String>, row: usize) -> Self {
        Self { source: source.into(), position: Position::Row(row) }
    }

    /// Location of the n-th record of an in-memory collection.
    pub fn record(source: impl Into<String>, index: usize) -> Self {
        Self { source: source.into(), position: Position::Record(index) }
    }

    /// Location covering a whole document.
    pub fn document(source: impl Into<String>) -> Self {
        Self { source: source.into(), position: Position::Document }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Position::Line(n) => write!(f, "{}:{}", self.source, n),
            Position::Row(n) => write!(f, "{} row {}", self.source, n),
            Position::Record(n) => write!(f, "{} record {}", self.source, n),
            Position::Document => write!(f, "{}", self.source),
        }
    }
}

/// Malformed or un-evaluable input.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// File could not be read or written
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Offending path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File is not UTF-8
    #[error("{path} is not valid UTF-8")]
    Encoding {
        /// Offending path
        path: String,
    },

    /// Line or document is not valid JSON
    #[error("Invalid JSON at {location}: {message}")]
    Json {
        /// Where parsing failed
        location: Location,
        /// Parser message
        message: String,
    },

    /// Tabular data could not be parsed
    #[error("Invalid CSV at {location}: {message}")]
    Csv {
        /// Where parsing failed
        location: Location,
        /// Parser message
        message: String,
    },

    /// A JSON record was not an object
    #[error("Expected object at {location}")]
    NotAnObject {
        /// Offending record
        location: Location,
    },

    /// One or more required fields are absent
    #[error("Missing required field(s) {} at {location}", .fields.join(", "))]
    MissingFields {
        /// Offending record
        location: Location,
        /// Absent fields, in contract order
        fields: Vec<String>,
    },

    /// A field holds a value of the wrong semantic type
    #[error("Field `{field}` must be {expected} at {location}")]
    WrongType {
        /// Offending record
        location: Location,
        /// Field name
        field: String,
        /// Expected semantic type
        expected: String,
    },

    /// A field is well-typed but outside its allowed values
    #[error("Field `{field}` must be {expected} at {location}, found {found}")]
    Constraint {
        /// Offending record
        location: Location,
        /// Field name
        field: String,
        /// The constraint that was violated
        expected: String,
        /// The value that was seen
        found: String,
    },

    /// Tabular header row lacks required columns
    #[error("Missing headers in {path}: {}", .headers.join(", "))]
    MissingHeaders {
        /// Offending path
        path: String,
        /// Absent headers, sorted
        headers: Vec<String>,
    },

    /// The same key appears twice in one source
    #[error("Duplicate {kind} id `{id}` at {location}")]
    DuplicateId {
        /// Which kind of record (fixture, prediction, ...)
        kind: &'static str,
        /// The repeated id
        id: String,
        /// Second occurrence
        location: Location,
    },

    /// Two id sets that must match one-to-one do not
    #[error("{}", describe_mismatch(.context, .missing, .extra, *.sample))]
    IdMismatch {
        /// Human label such as "predictions vs fixture"
        context: String,
        /// Ids expected but absent, sorted
        missing: Vec<String>,
        /// Ids present but not expected, sorted
        extra: Vec<String>,
        /// How many ids of each list to show
        sample: usize,
    },
}

fn describe_mismatch(context: &str, missing: &[String], extra: &[String], sample: usize) -> String {
    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!(
            "{} missing id(s), first {}: [{}]",
            missing.len(),
            sample.min(missing.len()),
            missing.iter().take(sample).cloned().collect::<Vec<_>>().join(", ")
        ));
    }
    if !extra.is_empty() {
        parts.push(format!(
            "{} unknown id(s), first {}: [{}]",
            extra.len(),
            sample.min(extra.len()),
            extra.iter().take(sample).cloned().collect::<Vec<_>>().join(", ")
        ));
    }
    format!("Id mismatch ({}): {}", context, parts.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_display() {
        assert_eq!(Location::line("fixture.jsonl", 3).to_string(), "fixture.jsonl:3");
        assert_eq!(Location::row("canary.csv", 2).to_string(), "canary.csv row 2");
        assert_eq!(Location::document("signoff.json").to_string(), "signoff.json");
    }

    #[test]
    fn test_id_mismatch_lists_first_ids_only() {
        let missing: Vec<String> = (1..=8).map(|i| format!("m{i}")).collect();
        let err = InputError::IdMismatch {
            context: "predictions vs fixture".to_string(),
            missing,
            extra: vec!["x1".to_string()],
            sample: 5,
        };
        let text = err.to_string();
        assert!(text.contains("8 missing id(s), first 5: [m1, m2, m3, m4, m5]"));
        assert!(!text.contains("m6"));
        assert!(text.contains("1 unknown id(s), first 1: [x1]"));
    }

    #[test]
    fn test_missing_fields_joined() {
        let err = InputError::MissingFields {
            location: Location::document("signoff.json"),
            fields: vec!["approved_by".to_string(), "approved_at".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Missing required field(s) approved_by, approved_at at signoff.json"
        );
    }
}
