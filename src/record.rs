//! Input record decoding
//!
//! A compilation run consumes a sequence of independent JSON records, each
//! one of three shapes: a single-course record, a program record, or a
//! pre-assembled envelope. Malformed lines are converted to explicit error
//! records carrying the raw text and the parse error; they are never
//! silently dropped and never abort the batch.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::domain::Envelope;

/// Free-text relation span with its declared hint label.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RelationField {
    pub kind: Option<String>,
    pub logic: Option<String>,
    pub source_span: Option<String>,
}

/// Enrollment-restriction payload attached to a course record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EnrollmentField {
    #[serde(rename = "type")]
    pub constraint_type: Option<String>,
    pub values: Vec<String>,
    pub term: Option<String>,
    pub message: Option<String>,
}

/// A scraped single-course record.
///
/// Field aliases cover the two scraper vocabularies in the wild
/// ("prerequisites" vs "prereqs", "units" vs "credits").
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CourseRecord {
    pub code: Option<String>,
    pub title: Option<String>,
    /// Credit weight; scrapers emit this as a number or a string ("0.50").
    #[serde(alias = "units")]
    pub credits: Option<Value>,
    pub description: Option<String>,
    #[serde(alias = "prerequisites")]
    pub prereqs: Option<String>,
    #[serde(alias = "corequisites")]
    pub coreqs: Option<String>,
    #[serde(alias = "antirequisites")]
    pub antireqs: Option<String>,
    pub source_url: Option<String>,
    pub relations: Vec<RelationField>,
    pub enrollment_constraints: Vec<EnrollmentField>,
}

/// One course entry inside a term list or named course list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CourseEntry {
    pub code: Option<String>,
    pub title: Option<String>,
    /// Source flagged this entry as "select one of" rather than required.
    pub select_one: bool,
}

/// A named course-list block (elective list, communication list, ...).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListPayload {
    pub list_name: Option<String>,
    pub courses: Vec<CourseEntry>,
    /// Exact choose-count when the source states one ("Choose 2 of ...").
    pub choose: Option<u32>,
}

/// A scraped program record: term-by-term requirements plus named lists.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProgramRecord {
    pub title: Option<String>,
    pub required_by_term: BTreeMap<String, Vec<CourseEntry>>,
    pub course_lists: BTreeMap<String, ListPayload>,
    pub source_url: Option<String>,
}

/// One decoded input record.
#[derive(Debug, Clone)]
pub enum InputRecord {
    Course(Box<CourseRecord>),
    Program(Box<ProgramRecord>),
    /// Pre-assembled envelope: passes through the merge unchanged.
    Envelope(Box<Envelope>),
    /// Malformed or unrecognized line, kept with its parse error.
    Error { raw: String, error: String },
}

/// Decode one JSON line into an [`InputRecord`].
///
/// Shape detection is by field presence: `required_by_term`/`course_lists`
/// mark a program record, a `courses` array marks an envelope, `code` or
/// `title` mark a course record. Anything else, including invalid JSON,
/// becomes an error record.
pub fn decode_line(line: &str) -> InputRecord {
    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            debug!("malformed input line: {}", e);
            return InputRecord::Error {
                raw: line.to_string(),
                error: e.to_string(),
            };
        }
    };

    let Some(obj) = value.as_object() else {
        return InputRecord::Error {
            raw: line.to_string(),
            error: "record is not a JSON object".to_string(),
        };
    };

    if obj.contains_key("required_by_term") || obj.contains_key("course_lists") {
        return match serde_json::from_value::<ProgramRecord>(value.clone()) {
            Ok(p) => InputRecord::Program(Box::new(p)),
            Err(e) => InputRecord::Error {
                raw: line.to_string(),
                error: format!("program record: {}", e),
            },
        };
    }

    if obj.get("courses").map(Value::is_array).unwrap_or(false) {
        return match serde_json::from_value::<Envelope>(value.clone()) {
            Ok(env) => InputRecord::Envelope(Box::new(env)),
            Err(e) => InputRecord::Error {
                raw: line.to_string(),
                error: format!("envelope record: {}", e),
            },
        };
    }

    if obj.contains_key("code") || obj.contains_key("title") {
        return match serde_json::from_value::<CourseRecord>(value) {
            Ok(c) => InputRecord::Course(Box::new(c)),
            Err(e) => InputRecord::Error {
                raw: line.to_string(),
                error: format!("course record: {}", e),
            },
        };
    }

    InputRecord::Error {
        raw: line.to_string(),
        error: "unrecognized record shape".to_string(),
    }
}

/// Parse a credit value that may arrive as a number or a string.
///
/// Strings tolerate a comma decimal separator ("0,5"). Unparseable input
/// yields None rather than an error.
pub fn float_units(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<f64>()
                .or_else(|_| s.replace(',', ".").parse::<f64>())
                .ok()
        }
        _ => None,
    }
}
