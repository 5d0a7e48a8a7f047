use serde::Serialize;

use crate::decode::UploadFormat;
use crate::ingest::{ColumnLayout, ParsedUpload, SchoolMetadata, StudentRecord};

/// Where the held roster came from.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterSource {
    pub file_name: Option<String>,
    pub sha256: Option<String>,
    pub format: Option<UploadFormat>,
    pub sheet_name: Option<String>,
    pub project_id: Option<String>,
}

/// The current set of students and school details. Replaced wholesale by
/// each successful upload or project load; never edited in place.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Roster {
    pub students: Vec<StudentRecord>,
    pub school_info: Option<SchoolMetadata>,
    /// Present only for rosters parsed in this session.
    pub layout: Option<ColumnLayout>,
    pub subjects: Vec<String>,
    pub source: RosterSource,
    pub loaded_at: String,
}

impl Roster {
    /// Project ids are only meaningful inside the workspace that saved them.
    pub fn detach_project(&mut self) {
        self.source.project_id = None;
    }

    pub fn from_upload(parsed: ParsedUpload, source: RosterSource) -> Self {
        let subjects = parsed.layout.subject_keys();
        Self {
            students: parsed.students,
            school_info: parsed.school_info,
            layout: Some(parsed.layout),
            subjects,
            source,
            loaded_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Rebuild from persisted data. Subject order follows first appearance.
    pub fn from_saved(
        students: Vec<StudentRecord>,
        school_info: Option<SchoolMetadata>,
        source: RosterSource,
    ) -> Self {
        let mut subjects: Vec<String> = Vec::new();
        for s in &students {
            for key in s.subjects.keys() {
                if !subjects.contains(key) {
                    subjects.push(key.clone());
                }
            }
        }
        Self {
            students,
            school_info,
            layout: None,
            subjects,
            source,
            loaded_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::Grade;
    use indexmap::IndexMap;

    fn record(id: &str, subjects: &[(&str, f64)]) -> StudentRecord {
        let subjects: IndexMap<String, f64> =
            subjects.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        let total: f64 = subjects.values().sum();
        StudentRecord {
            id: id.to_string(),
            name: format!("Student {}", id),
            class: String::new(),
            serial_number: None,
            reg_number: None,
            email: None,
            average_score: total / subjects.len() as f64,
            total_marks: total,
            subjects,
            grade: Grade::C,
        }
    }

    #[test]
    fn saved_subject_order_is_first_appearance() {
        let source = RosterSource {
            file_name: None,
            sha256: None,
            format: None,
            sheet_name: None,
            project_id: Some("p1".into()),
        };
        let r = Roster::from_saved(
            vec![
                record("student-1", &[("English", 60.0)]),
                record("student-2", &[("Math", 70.0), ("English", 50.0), ("Art", 40.0)]),
            ],
            None,
            source,
        );
        assert_eq!(r.subjects, vec!["English", "Math", "Art"]);
        assert!(r.layout.is_none());
        assert_eq!(r.students[1].total_marks, 160.0);
    }
}
