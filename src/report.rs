//! The ReportCard record: the typed target of schema-constrained extraction.
//!
//! Every optional field serialises as `null` rather than being omitted, so a
//! sparse record still has the complete shape downstream consumers expect.
//! Records are only ever built by [`crate::pipeline::validate`] from
//! validated model output.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentInfo {
    pub student_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub grade_level: Option<String>,
    pub class_name: Option<String>,
    pub school_name: Option<String>,
}

/// One subject line of the report card. `subject` is the only required field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectGrade {
    pub subject: String,
    pub term: Option<String>,
    pub numeric_grade: Option<f64>,
    pub letter_grade: Option<String>,
    pub teacher_comments: Option<String>,
    pub competencies: Option<Map<String, Value>>,
}

impl SubjectGrade {
    pub fn named(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            term: None,
            numeric_grade: None,
            letter_grade: None,
            teacher_comments: None,
            competencies: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendance {
    pub days_present: Option<i64>,
    pub days_absent: Option<i64>,
    pub tardies: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorNote {
    pub date: Option<String>,
    pub note: String,
    pub teacher: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportCard {
    /// Free-form provenance map (source, raw_format, extraction_confidence, …).
    pub meta: Map<String, Value>,
    pub student: StudentInfo,
    pub summary: Option<String>,
    pub subjects: Vec<SubjectGrade>,
    pub attendance: Option<Attendance>,
    pub behavior: Option<Vec<BehaviorNote>>,
    pub overall_gpa: Option<f64>,
    pub recommendations: Option<Vec<String>>,
}

impl ReportCard {
    /// An empty record for the given student; every other field at its default.
    pub fn for_student(student: StudentInfo) -> Self {
        Self {
            meta: Map::new(),
            student,
            summary: None,
            subjects: Vec::new(),
            attendance: None,
            behavior: None,
            overall_gpa: None,
            recommendations: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_record_serialises_full_shape() {
        let card = ReportCard::for_student(StudentInfo::default());
        let json = serde_json::to_value(&card).unwrap();
        let obj = json.as_object().unwrap();
        for key in [
            "meta",
            "student",
            "summary",
            "subjects",
            "attendance",
            "behavior",
            "overall_gpa",
            "recommendations",
        ] {
            assert!(obj.contains_key(key), "missing key {key}");
        }
        assert!(json["attendance"].is_null());
        assert!(json["student"]["first_name"].is_null());
        assert_eq!(json["subjects"], serde_json::json!([]));
    }

    #[test]
    fn subject_serialises_nulls() {
        let json = serde_json::to_value(SubjectGrade::named("Math")).unwrap();
        assert_eq!(json["subject"], "Math");
        assert!(json["letter_grade"].is_null());
        assert!(json["competencies"].is_null());
    }
}
