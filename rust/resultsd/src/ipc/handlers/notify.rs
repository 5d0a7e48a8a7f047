use regex::Regex;
use serde_json::{json, Value};
use std::sync::LazyLock;
use uuid::Uuid;

use super::reports::{build_student_model, ModelKind};
use super::setup::{self, SetupSection};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_optional_str, get_required_str, now_rfc3339, require_db};
use crate::ipc::types::{AppState, Request};

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"));

pub(crate) fn is_valid_email(s: &str) -> bool {
    EMAIL.is_match(s)
}

const OUTBOX_STATUSES: &[&str] = &["queued", "sent", "failed"];

fn notify_queue(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(&req.params, "studentId")?;
    let override_email = get_optional_str(&req.params, "email");
    let conn = require_db(state)?;

    let settings = setup::section_or_default(Some(conn), SetupSection::Notify);
    if !settings.get("enabled").and_then(|v| v.as_bool()).unwrap_or(false) {
        return Err(HandlerErr::new(
            "notify_disabled",
            "notifications are disabled in setup (notify.enabled)",
        ));
    }

    let model = build_student_model(state, &student_id, ModelKind::Statement)?;
    let student_name = model["student"]["name"].as_str().unwrap_or("").to_string();
    let recipient = override_email
        .or_else(|| model["student"]["email"].as_str().map(|s| s.trim().to_string()))
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            HandlerErr::new("bad_params", "no email address for student")
                .with_details(json!({ "studentId": student_id }))
        })?;
    if !is_valid_email(&recipient) {
        return Err(HandlerErr::new("invalid_email", "recipient is not a valid email address")
            .with_details(json!({ "email": recipient })));
    }

    let prefix = settings
        .get("subjectPrefix")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim();
    let subject = if prefix.is_empty() {
        format!("Result statement for {}", student_name)
    } else {
        format!("{}: Result statement for {}", prefix, student_name)
    };
    let payload = json!({
        "fromName": settings.get("fromName").cloned().unwrap_or(Value::Null),
        "model": model,
    });
    let payload_json = serde_json::to_string(&payload)
        .map_err(|e| HandlerErr::new("encode_failed", e.to_string()))?;

    // A roster saved in another workspace links to nothing here; the
    // subselect binds NULL then.
    let project_id = state
        .roster
        .as_ref()
        .and_then(|r| r.source.project_id.clone());
    let id = Uuid::new_v4().to_string();
    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO outbox(
            id, project_id, student_id, student_name, recipient, subject,
            payload_json, status, created_at
         ) VALUES(?, (SELECT id FROM projects WHERE id = ?), ?, ?, ?, ?, ?, 'queued', ?)",
        (
            &id,
            &project_id,
            &student_id,
            &student_name,
            &recipient,
            &subject,
            &payload_json,
            &now,
        ),
    )
    .map_err(|e| HandlerErr::new("db_insert_failed", e.to_string()))?;
    tracing::info!(outbox = %id, student = %student_id, "statement queued");

    Ok(json!({
        "outboxId": id,
        "recipient": recipient,
        "subject": subject,
        "status": "queued",
        "createdAt": now,
    }))
}

fn notify_outbox(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let conn = require_db(state)?;
    let status = get_optional_str(&req.params, "status");
    if let Some(s) = status.as_deref() {
        if !OUTBOX_STATUSES.contains(&s) {
            return Err(HandlerErr::new(
                "bad_params",
                "status must be one of: queued, sent, failed",
            ));
        }
    }

    let mut stmt = conn.prepare(
        "SELECT id, project_id, student_id, student_name, recipient, subject, status, created_at
         FROM outbox
         WHERE (?1 IS NULL OR status = ?1)
         ORDER BY created_at, id",
    )?;
    let entries = stmt
        .query_map([&status], |r| {
            let id: String = r.get(0)?;
            let project_id: Option<String> = r.get(1)?;
            let student_id: String = r.get(2)?;
            let student_name: String = r.get(3)?;
            let recipient: String = r.get(4)?;
            let subject: String = r.get(5)?;
            let status: String = r.get(6)?;
            let created_at: String = r.get(7)?;
            Ok(json!({
                "id": id,
                "projectId": project_id,
                "studentId": student_id,
                "studentName": student_name,
                "recipient": recipient,
                "subject": subject,
                "status": status,
                "createdAt": created_at,
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "entries": entries }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "notify.queue" => notify_queue(state, req),
        "notify.outbox" => notify_outbox(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape() {
        assert!(is_valid_email("ade@school.edu.ng"));
        assert!(is_valid_email("a.b+c@x.io"));
        assert!(!is_valid_email("ade@school"));
        assert!(!is_valid_email("ade school@x.com"));
        assert!(!is_valid_email("a@b@c.com"));
        assert!(!is_valid_email("@x.com"));
        assert!(!is_valid_email(""));
    }
}
