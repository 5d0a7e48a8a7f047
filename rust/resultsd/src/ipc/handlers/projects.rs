use rusqlite::OptionalExtension;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::ingest::{SchoolMetadata, StudentRecord};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_optional_str, get_required_str, now_rfc3339, require_db, require_roster};
use crate::ipc::types::{AppState, Request};
use crate::roster::{Roster, RosterSource};

fn projects_list(state: &mut AppState, _req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let mut stmt = conn.prepare(
        "SELECT id, name, student_count, source_file, created_at, updated_at
         FROM projects
         ORDER BY updated_at DESC, name",
    )?;
    let projects = stmt
        .query_map([], |r| {
            let id: String = r.get(0)?;
            let name: String = r.get(1)?;
            let student_count: i64 = r.get(2)?;
            let source_file: Option<String> = r.get(3)?;
            let created_at: String = r.get(4)?;
            let updated_at: String = r.get(5)?;
            Ok(json!({
                "id": id,
                "name": name,
                "studentCount": student_count,
                "sourceFile": source_file,
                "createdAt": created_at,
                "updatedAt": updated_at,
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "projects": projects }))
}

fn projects_save(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let name = get_required_str(&req.params, "name")?;
    let requested_id = get_optional_str(&req.params, "projectId");
    let conn = require_db(state)?;
    let roster = require_roster(state)?;

    let students_json = serde_json::to_string(&roster.students)
        .map_err(|e| HandlerErr::new("encode_failed", e.to_string()))?;
    let school_info_json = roster
        .school_info
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| HandlerErr::new("encode_failed", e.to_string()))?;
    let now = now_rfc3339();

    let project_id = match requested_id {
        Some(id) => {
            let changed = conn
                .execute(
                    "UPDATE projects
                     SET name = ?, school_info_json = ?, students_json = ?, student_count = ?,
                         source_file = ?, source_sha256 = ?, updated_at = ?
                     WHERE id = ?",
                    (
                        &name,
                        &school_info_json,
                        &students_json,
                        roster.students.len() as i64,
                        &roster.source.file_name,
                        &roster.source.sha256,
                        &now,
                        &id,
                    ),
                )
                .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
            if changed == 0 {
                return Err(HandlerErr::new("not_found", "project not found")
                    .with_details(json!({ "projectId": id })));
            }
            id
        }
        None => {
            let id = Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO projects(
                    id, name, school_info_json, students_json, student_count,
                    source_file, source_sha256, created_at, updated_at
                 ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
                (
                    &id,
                    &name,
                    &school_info_json,
                    &students_json,
                    roster.students.len() as i64,
                    &roster.source.file_name,
                    &roster.source.sha256,
                    &now,
                    &now,
                ),
            )
            .map_err(|e| HandlerErr::new("db_insert_failed", e.to_string()))?;
            id
        }
    };

    let student_count = roster.students.len();
    if let Some(r) = state.roster.as_mut() {
        r.source.project_id = Some(project_id.clone());
    }
    tracing::info!(project = %project_id, students = student_count, "project saved");
    Ok(json!({
        "projectId": project_id,
        "name": name,
        "studentCount": student_count,
        "updatedAt": now,
    }))
}

fn projects_load(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let project_id = get_required_str(&req.params, "projectId")?;
    let conn = require_db(state)?;

    let row: Option<(String, Option<String>, String, Option<String>, Option<String>)> = conn
        .query_row(
            "SELECT name, school_info_json, students_json, source_file, source_sha256
             FROM projects WHERE id = ?",
            [&project_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)),
        )
        .optional()?;
    let Some((name, school_info_json, students_json, source_file, source_sha256)) = row else {
        return Err(HandlerErr::new("not_found", "project not found")
            .with_details(json!({ "projectId": project_id })));
    };

    let students: Vec<StudentRecord> = serde_json::from_str(&students_json).map_err(|e| {
        HandlerErr::new("decode_failed", format!("stored students are unreadable: {}", e))
    })?;
    let school_info: Option<SchoolMetadata> = school_info_json
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| {
            HandlerErr::new("decode_failed", format!("stored school info is unreadable: {}", e))
        })?;

    let source = RosterSource {
        file_name: source_file,
        sha256: source_sha256,
        format: None,
        sheet_name: None,
        project_id: Some(project_id.clone()),
    };
    let roster = Roster::from_saved(students, school_info, source);
    let result = json!({
        "projectId": project_id,
        "name": name,
        "studentCount": roster.students.len(),
        "students": roster.students,
        "schoolInfo": roster.school_info,
        "subjects": roster.subjects,
    });
    state.roster = Some(roster);
    tracing::info!(project = %project_id, "project loaded");
    Ok(result)
}

fn projects_delete(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let project_id = get_required_str(&req.params, "projectId")?;
    let conn = state
        .db
        .as_mut()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))?;

    let tx = conn
        .transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    // Queued notifications keep their payload but lose the project link.
    tx.execute(
        "UPDATE outbox SET project_id = NULL WHERE project_id = ?",
        [&project_id],
    )
    .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    let deleted = tx
        .execute("DELETE FROM projects WHERE id = ?", [&project_id])
        .map_err(|e| HandlerErr::new("db_delete_failed", e.to_string()))?;
    if deleted == 0 {
        return Err(HandlerErr::new("not_found", "project not found")
            .with_details(json!({ "projectId": project_id })));
    }
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;

    if let Some(r) = state.roster.as_mut() {
        if r.source.project_id.as_deref() == Some(project_id.as_str()) {
            r.detach_project();
        }
    }
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "projects.list" => projects_list(state, req),
        "projects.save" => projects_save(state, req),
        "projects.load" => projects_load(state, req),
        "projects.delete" => projects_delete(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
