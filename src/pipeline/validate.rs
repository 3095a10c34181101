//! Shape validation of model output against the [`ReportCard`] schema.
//!
//! Validation walks the parsed `serde_json::Value` explicitly instead of
//! relying on `#[derive(Deserialize)]`, so every rejection names the exact
//! field path (`subjects[2].subject`) and the reason.
//!
//! Only two things are truly required: a `student` object, and a non-null
//! `subject` in every subject entry (plus `note` in behaviour entries).
//! Everything else is optional and coerced when the intent is unambiguous:
//!
//! | Target | Accepted |
//! |--------|----------|
//! | string | string, number, bool |
//! | float  | number, numeric string |
//! | int    | integer, integral float, integer string |
//! | list   | array, `null` (empty / absent) |
//!
//! Unknown keys (for instance `quarter_grades`) are ignored.

use crate::error::ReportError;
use crate::pipeline::candidate::extract_json_candidate;
use crate::report::{Attendance, BehaviorNote, ReportCard, StudentInfo, SubjectGrade};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Parse raw model output into JSON, falling back to the candidate search.
pub fn parse_payload(output: &str) -> Result<Value, ReportError> {
    if let Ok(value) = serde_json::from_str::<Value>(output) {
        return Ok(value);
    }
    let candidate = extract_json_candidate(output).ok_or_else(|| {
        warn!("Model output is not valid JSON and no candidate was found");
        ReportError::NoJsonCandidate
    })?;
    debug!(
        "Recovered {}-byte JSON candidate from {}-byte model output",
        candidate.len(),
        output.len()
    );
    serde_json::from_str(candidate)
        .map_err(|e| ReportError::Internal(format!("candidate re-parse: {e}")))
}

/// Validate a parsed value and build the typed record.
pub fn validate_report_card(value: &Value) -> Result<ReportCard, ReportError> {
    let obj = value
        .as_object()
        .ok_or_else(|| ReportError::schema("$", format!("expected a JSON object, got {}", type_name(value))))?;

    let meta = match obj.get("meta") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(m)) => m.clone(),
        Some(other) => return Err(expected("meta", "an object", other)),
    };

    let student = match obj.get("student") {
        None | Some(Value::Null) => return Err(ReportError::schema("student", "field required")),
        Some(v) => student_info(v, "student")?,
    };

    let subjects = list(obj.get("subjects"), "subjects", subject_grade)?.unwrap_or_default();

    let attendance = match obj.get("attendance") {
        None | Some(Value::Null) => None,
        Some(v) => Some(attendance_record(v, "attendance")?),
    };

    Ok(ReportCard {
        meta,
        student,
        summary: opt_string(obj, "summary", "")?,
        subjects,
        attendance,
        behavior: list(obj.get("behavior"), "behavior", behavior_note)?,
        overall_gpa: opt_f64(obj, "overall_gpa", "")?,
        recommendations: list(obj.get("recommendations"), "recommendations", required_string_value)?,
    })
}

/// Parse and validate raw model output in one step.
///
/// Values that are already structured skip parsing: call
/// [`validate_report_card`] on them directly.
pub fn parse_report_card(output: &str) -> Result<ReportCard, ReportError> {
    validate_report_card(&parse_payload(output)?)
}

// ── Records ──────────────────────────────────────────────────────────────────

fn student_info(v: &Value, path: &str) -> Result<StudentInfo, ReportError> {
    let obj = as_object(v, path)?;
    Ok(StudentInfo {
        student_id: opt_string(obj, "student_id", path)?,
        first_name: opt_string(obj, "first_name", path)?,
        last_name: opt_string(obj, "last_name", path)?,
        date_of_birth: opt_string(obj, "date_of_birth", path)?,
        grade_level: opt_string(obj, "grade_level", path)?,
        class_name: opt_string(obj, "class_name", path)?,
        school_name: opt_string(obj, "school_name", path)?,
    })
}

fn subject_grade(v: &Value, path: &str) -> Result<SubjectGrade, ReportError> {
    let obj = as_object(v, path)?;
    let competencies = match obj.get("competencies") {
        None | Some(Value::Null) => None,
        Some(Value::Object(m)) => Some(m.clone()),
        Some(other) => return Err(expected(&join(path, "competencies"), "an object", other)),
    };
    Ok(SubjectGrade {
        subject: required_string(obj, "subject", path)?,
        term: opt_string(obj, "term", path)?,
        numeric_grade: opt_f64(obj, "numeric_grade", path)?,
        letter_grade: opt_string(obj, "letter_grade", path)?,
        teacher_comments: opt_string(obj, "teacher_comments", path)?,
        competencies,
    })
}

fn attendance_record(v: &Value, path: &str) -> Result<Attendance, ReportError> {
    let obj = as_object(v, path)?;
    Ok(Attendance {
        days_present: opt_i64(obj, "days_present", path)?,
        days_absent: opt_i64(obj, "days_absent", path)?,
        tardies: opt_i64(obj, "tardies", path)?,
    })
}

fn behavior_note(v: &Value, path: &str) -> Result<BehaviorNote, ReportError> {
    let obj = as_object(v, path)?;
    Ok(BehaviorNote {
        date: opt_string(obj, "date", path)?,
        note: required_string(obj, "note", path)?,
        teacher: opt_string(obj, "teacher", path)?,
    })
}

// ── Field helpers ────────────────────────────────────────────────────────────

fn join(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn expected(path: &str, what: &str, got: &Value) -> ReportError {
    ReportError::schema(path, format!("expected {what}, got {}", type_name(got)))
}

fn as_object<'a>(v: &'a Value, path: &str) -> Result<&'a Map<String, Value>, ReportError> {
    v.as_object().ok_or_else(|| expected(path, "an object", v))
}

fn list<T>(
    v: Option<&Value>,
    path: &str,
    item: impl Fn(&Value, &str) -> Result<T, ReportError>,
) -> Result<Option<Vec<T>>, ReportError> {
    match v {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, it)| item(it, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(other) => Err(expected(path, "an array", other)),
    }
}

fn string_value(v: &Value, path: &str) -> Result<Option<String>, ReportError> {
    match v {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(expected(path, "a string", other)),
    }
}

fn required_string_value(v: &Value, path: &str) -> Result<String, ReportError> {
    string_value(v, path)?.ok_or_else(|| ReportError::schema(path, "field required"))
}

fn opt_string(obj: &Map<String, Value>, key: &str, parent: &str) -> Result<Option<String>, ReportError> {
    match obj.get(key) {
        None => Ok(None),
        Some(v) => string_value(v, &join(parent, key)),
    }
}

fn required_string(obj: &Map<String, Value>, key: &str, parent: &str) -> Result<String, ReportError> {
    let path = join(parent, key);
    match obj.get(key) {
        None => Err(ReportError::schema(path, "field required")),
        Some(v) => required_string_value(v, &path),
    }
}

fn opt_f64(obj: &Map<String, Value>, key: &str, parent: &str) -> Result<Option<f64>, ReportError> {
    let path = join(parent, key);
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Some)
            .ok_or_else(|| ReportError::schema(path, format!("'{s}' is not a number"))),
        Some(other) => Err(expected(&path, "a number", other)),
    }
}

fn opt_i64(obj: &Map<String, Value>, key: &str, parent: &str) -> Result<Option<i64>, ReportError> {
    let path = join(parent, key);
    // `i64::MAX as f64` is 2^63, one past the largest i64.
    let integral = |f: f64| {
        (f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64)
            .then_some(f as i64)
    };
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(integral))
            .map(Some)
            .ok_or_else(|| ReportError::schema(path, format!("{n} is not an integer in range"))),
        Some(Value::String(s)) => {
            let t = s.trim();
            t.parse::<i64>()
                .ok()
                .or_else(|| t.parse::<f64>().ok().and_then(integral))
                .map(Some)
                .ok_or_else(|| ReportError::schema(path, format!("'{s}' is not an integer in range")))
        }
        Some(other) => Err(expected(&path, "an integer", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema_path(err: ReportError) -> String {
        match err {
            ReportError::SchemaValidation { path, .. } => path,
            other => panic!("expected SchemaValidation, got {other:?}"),
        }
    }

    #[test]
    fn minimal_record() {
        let card = validate_report_card(&json!({ "student": {} })).unwrap();
        assert_eq!(card.student, StudentInfo::default());
        assert!(card.subjects.is_empty());
        assert!(card.meta.is_empty());
        assert_eq!(card.recommendations, None);
    }

    #[test]
    fn full_record_with_coercions() {
        let card = validate_report_card(&json!({
            "meta": { "source": "ocr" },
            "student": { "first_name": "Ana", "student_id": 1042, "grade_level": "5" },
            "summary": "Solid term",
            "subjects": [
                { "subject": "Math", "quarter_grades": {"Q1": 80, "Q2": 90},
                  "numeric_grade": "85", "letter_grade": "A",
                  "competencies": { "problem solving": "proficient" } },
                { "subject": "Art", "numeric_grade": null }
            ],
            "attendance": { "days_present": 170.0, "days_absent": "10", "tardies": null },
            "behavior": [ { "note": "Helpful", "teacher": "Mr. B" } ],
            "overall_gpa": 3.6,
            "recommendations": ["Read 20 minutes daily"]
        }))
        .unwrap();

        assert_eq!(card.student.student_id.as_deref(), Some("1042"));
        assert_eq!(card.subjects.len(), 2);
        assert_eq!(card.subjects[0].numeric_grade, Some(85.0));
        assert_eq!(card.subjects[1].numeric_grade, None);
        assert!(card.subjects[0].competencies.is_some());
        let att = card.attendance.unwrap();
        assert_eq!(att.days_present, Some(170));
        assert_eq!(att.days_absent, Some(10));
        assert_eq!(card.behavior.unwrap()[0].note, "Helpful");
        assert_eq!(card.overall_gpa, Some(3.6));
        assert_eq!(card.meta["source"], "ocr");
    }

    #[test]
    fn subject_without_name_is_rejected_with_path() {
        let err = validate_report_card(&json!({
            "student": {},
            "subjects": [ { "subject": "Math" }, { "numeric_grade": 70 } ]
        }))
        .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::SchemaValidation);
        assert_eq!(schema_path(err), "subjects[1].subject");
    }

    #[test]
    fn null_subject_is_rejected() {
        let err = validate_report_card(&json!({
            "student": {}, "subjects": [ { "subject": null } ]
        }))
        .unwrap_err();
        assert_eq!(schema_path(err), "subjects[0].subject");
    }

    #[test]
    fn missing_or_malformed_student() {
        assert_eq!(schema_path(validate_report_card(&json!({})).unwrap_err()), "student");
        assert_eq!(
            schema_path(validate_report_card(&json!({ "student": "Ana" })).unwrap_err()),
            "student"
        );
        assert_eq!(
            schema_path(
                validate_report_card(&json!({ "student": { "first_name": ["A"] } })).unwrap_err()
            ),
            "student.first_name"
        );
    }

    #[test]
    fn type_mismatches_carry_paths() {
        let cases = [
            (json!({ "student": {}, "subjects": {} }), "subjects"),
            (json!({ "student": {}, "overall_gpa": "high" }), "overall_gpa"),
            (json!({ "student": {}, "attendance": { "tardies": 1.5 } }), "attendance.tardies"),
            (json!({ "student": {}, "behavior": [ { "date": "x" } ] }), "behavior[0].note"),
            (json!({ "student": {}, "recommendations": ["ok", null] }), "recommendations[1]"),
            (json!({ "student": {}, "meta": [] }), "meta"),
            (json!([1, 2]), "$"),
        ];
        for (value, path) in cases {
            let err = validate_report_card(&value).unwrap_err();
            assert_eq!(schema_path(err), path, "value: {value}");
        }
    }

    #[test]
    fn parse_payload_uses_candidate_search() {
        let v = parse_payload("Here you go:\n{\"student\": {}}\nAnything else?").unwrap();
        assert_eq!(v, json!({ "student": {} }));
        assert!(matches!(
            parse_payload("I could not read the card."),
            Err(ReportError::NoJsonCandidate)
        ));
    }

    #[test]
    fn parse_report_card_end_to_end() {
        let card = parse_report_card(
            "```json\n{\"student\": {\"last_name\": \"Ng\"}, \"subjects\": [{\"subject\": \"Music\"}]}\n```",
        )
        .unwrap();
        assert_eq!(card.student.last_name.as_deref(), Some("Ng"));
        assert_eq!(card.subjects[0].subject, "Music");
    }

    #[test]
    fn huge_counts_are_rejected() {
        for days in [json!(1e20), json!("1e20"), json!(-1e19)] {
            let err = validate_report_card(&json!({
                "student": {},
                "attendance": { "days_present": days }
            }))
            .unwrap_err();
            match err {
                ReportError::SchemaValidation { path, .. } => {
                    assert_eq!(path, "attendance.days_present")
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
        let card = validate_report_card(&json!({
            "student": {},
            "attendance": { "tardies": 4.0, "days_absent": "-2" }
        }))
        .unwrap();
        let attendance = card.attendance.unwrap();
        assert_eq!(attendance.tardies, Some(4));
        assert_eq!(attendance.days_absent, Some(-2));
    }
}
