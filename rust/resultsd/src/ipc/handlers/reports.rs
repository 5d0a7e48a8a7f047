use serde_json::{json, Value};

use super::setup::{self, SetupSection};
use crate::calc::{self, FoundPercentage, GradeScale};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_required_str, require_roster};
use crate::ipc::types::{AppState, Request};
use crate::roster::Roster;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ModelKind {
    Statement,
    Certificate,
}

impl ModelKind {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "statement" => Some(Self::Statement),
            "certificate" => Some(Self::Certificate),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Statement => "statement",
            Self::Certificate => "certificate",
        }
    }
}

fn roster_records(roster: &Roster) -> Result<Vec<Value>, HandlerErr> {
    roster
        .students
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| HandlerErr::new("encode_failed", e.to_string()))
}

struct Ranked {
    found: Vec<Option<FoundPercentage>>,
    ranks: Vec<Option<usize>>,
}

fn rank_records(records: &[Value], max_per_subject: f64) -> Ranked {
    let found: Vec<Option<FoundPercentage>> = records
        .iter()
        .map(|r| calc::find_percentage(r, max_per_subject))
        .collect();
    let values: Vec<Option<f64>> = found.iter().map(|f| f.map(|f| f.value)).collect();
    let ranks = calc::competition_ranks(&values);
    Ranked { found, ranks }
}

fn reports_rankings(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let max_per_subject = setup::max_score_per_subject(state.db.as_ref());
    let records: Vec<Value> = match req.params.get("records") {
        Some(v) => v
            .as_array()
            .cloned()
            .ok_or_else(|| HandlerErr::new("bad_params", "records must be an array"))?,
        None => roster_records(require_roster(state)?)?,
    };

    let ranked = rank_records(&records, max_per_subject);
    let rows: Vec<Value> = records
        .iter()
        .enumerate()
        .map(|(i, rec)| {
            let found = ranked.found[i];
            let rank = ranked.ranks[i];
            json!({
                "index": i,
                "studentId": rec.get("id").cloned().unwrap_or(Value::Null),
                "name": rec.get("name").cloned().unwrap_or(Value::Null),
                "percentage": found.map(|f| f.value),
                "source": found.map(|f| f.source),
                "rank": rank,
                "position": rank.map(calc::ordinal),
            })
        })
        .collect();
    let unranked = ranked.ranks.iter().filter(|r| r.is_none()).count();

    Ok(json!({
        "maxScorePerSubject": max_per_subject,
        "rankedCount": records.len() - unranked,
        "unrankedCount": unranked,
        "rows": rows,
    }))
}

fn reports_class_summary(state: &mut AppState, _req: &Request) -> Result<Value, HandlerErr> {
    let roster = require_roster(state)?;
    let summary = calc::class_summary(&roster.students, &roster.subjects);
    serde_json::to_value(summary).map_err(|e| HandlerErr::new("encode_failed", e.to_string()))
}

/// Display value from setup when set, otherwise from the parsed sheet.
fn display_field(display: &Value, key: &str, parsed: Option<&str>) -> String {
    let configured = display
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .unwrap_or("");
    if !configured.is_empty() {
        return configured.to_string();
    }
    parsed.unwrap_or("").trim().to_string()
}

/// Everything a statement or certificate renderer needs for one student.
pub(crate) fn build_student_model(
    state: &AppState,
    student_id: &str,
    kind: ModelKind,
) -> Result<Value, HandlerErr> {
    let roster = require_roster(state)?;
    let idx = roster
        .students
        .iter()
        .position(|s| s.id == student_id)
        .ok_or_else(|| {
            HandlerErr::new("not_found", "student not found")
                .with_details(json!({ "studentId": student_id }))
        })?;
    let student = &roster.students[idx];

    let conn = state.db.as_ref();
    let display = setup::section_or_default(conn, SetupSection::Display);
    let max_per_subject = setup::max_score_per_subject(conn);

    let records = roster_records(roster)?;
    let ranked = rank_records(&records, max_per_subject);
    let percentage = ranked.found[idx].map(|f| f.value);
    let rank = ranked.ranks[idx];

    let parsed = roster.school_info.as_ref();
    let school = json!({
        "name": display_field(&display, "schoolName", parsed.and_then(|s| s.name.as_deref())),
        "address": display_field(&display, "address", parsed.and_then(|s| s.address.as_deref())),
        "session": display_field(&display, "session", parsed.and_then(|s| s.session.as_deref())),
        "contact": display_field(&display, "contact", None),
        "term": display_field(&display, "term", None),
        "logoPath": display.get("logoPath").cloned().unwrap_or(Value::Null),
    });

    let subject_rows: Vec<Value> = roster
        .subjects
        .iter()
        .map(|subject| {
            let score = student.subjects.get(subject).copied();
            let grade = score.map(|s| {
                GradeScale::Report.grade_for(100.0 * s / max_per_subject)
            });
            json!({ "subject": subject, "score": score, "grade": grade })
        })
        .collect();

    let mut model = json!({
        "kind": kind.as_str(),
        "school": school,
        "student": student,
        "subjectRows": subject_rows,
        "percentage": percentage,
        "reportGrade": percentage.map(|p| GradeScale::Report.grade_for(p)),
        "rank": rank,
        "position": rank.map(calc::ordinal),
        "classSize": roster.students.len(),
        "generatedAt": chrono::Utc::now().to_rfc3339(),
    });
    if kind == ModelKind::Certificate {
        model["signatories"] = json!({
            "principalName": display_field(&display, "principalName", None),
            "teacherName": display_field(&display, "teacherName", None),
        });
    }
    Ok(model)
}

fn reports_student_model(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(&req.params, "studentId")?;
    let kind_raw = get_required_str(&req.params, "kind")?;
    let kind = ModelKind::parse(&kind_raw).ok_or_else(|| {
        HandlerErr::new("bad_params", "kind must be one of: statement, certificate")
    })?;
    build_student_model(state, &student_id, kind)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "reports.rankings" => reports_rankings(state, req),
        "reports.classSummary" => reports_class_summary(state, req),
        "reports.studentModel" => reports_student_model(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
