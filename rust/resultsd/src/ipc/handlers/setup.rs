use rusqlite::Connection;
use serde_json::{json, Map, Value};

use crate::calc::DEFAULT_MAX_SCORE_PER_SUBJECT;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};

#[derive(Clone, Copy)]
pub(crate) enum SetupSection {
    Display,
    Grading,
    Notify,
}

impl SetupSection {
    const ALL: [SetupSection; 3] = [Self::Display, Self::Grading, Self::Notify];

    fn parse(s: &str) -> Option<Self> {
        match s {
            "display" => Some(Self::Display),
            "grading" => Some(Self::Grading),
            "notify" => Some(Self::Notify),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Display => "display",
            Self::Grading => "grading",
            Self::Notify => "notify",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Display => "setup.display",
            Self::Grading => "setup.grading",
            Self::Notify => "setup.notify",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Display => json!({
            "schoolName": "",
            "address": "",
            "contact": "",
            "logoPath": null,
            "session": "",
            "term": "",
            "principalName": "",
            "teacherName": ""
        }),
        SetupSection::Grading => json!({
            "maxScorePerSubject": DEFAULT_MAX_SCORE_PER_SUBJECT as i64
        }),
        SetupSection::Notify => json!({
            "enabled": false,
            "fromName": "",
            "subjectPrefix": "Results"
        }),
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool().ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v.as_i64().ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.len() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

fn parse_nullable_string_max(v: &Value, key: &str, max_len: usize) -> Result<Value, String> {
    if v.is_null() {
        return Ok(Value::Null);
    }
    let s = parse_string_max(v, key, max_len)?;
    if s.is_empty() {
        return Ok(Value::Null);
    }
    Ok(Value::String(s))
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Display => match k.as_str() {
                "schoolName" | "principalName" | "teacherName" => {
                    obj.insert(k.clone(), Value::String(parse_string_max(v, k, 120)?));
                }
                "address" | "contact" => {
                    obj.insert(k.clone(), Value::String(parse_string_max(v, k, 240)?));
                }
                "session" | "term" => {
                    obj.insert(k.clone(), Value::String(parse_string_max(v, k, 40)?));
                }
                "logoPath" => {
                    obj.insert(k.clone(), parse_nullable_string_max(v, k, 1024)?);
                }
                _ => return Err(format!("unknown display field: {}", k)),
            },
            SetupSection::Grading => match k.as_str() {
                "maxScorePerSubject" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 1000)?));
                }
                _ => return Err(format!("unknown grading field: {}", k)),
            },
            SetupSection::Notify => match k.as_str() {
                "enabled" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                "fromName" => {
                    obj.insert(k.clone(), Value::String(parse_string_max(v, k, 120)?));
                }
                "subjectPrefix" => {
                    obj.insert(k.clone(), Value::String(parse_string_max(v, k, 80)?));
                }
                _ => return Err(format!("unknown notify field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed historical values fall back to defaults field by field.
            let _ = merge_section_patch(section, &mut current, saved_obj);
        }
    }
    Ok(current)
}

/// Section values for other handlers. Without a workspace (or on a read
/// failure) the defaults apply.
pub(crate) fn section_or_default(conn: Option<&Connection>, section: SetupSection) -> Value {
    let Some(conn) = conn else {
        return default_section(section);
    };
    match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(section = section.name(), error = %e, "setup read failed; using defaults");
            default_section(section)
        }
    }
}

pub(crate) fn max_score_per_subject(conn: Option<&Connection>) -> f64 {
    section_or_default(conn, SetupSection::Grading)
        .get("maxScorePerSubject")
        .and_then(|v| v.as_f64())
        .unwrap_or(DEFAULT_MAX_SCORE_PER_SUBJECT)
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let mut out = Map::new();
    for section in SetupSection::ALL {
        match load_section(conn, section) {
            Ok(v) => {
                out.insert(section.name().to_string(), v);
            }
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }
    ok(&req.id, Value::Object(out))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    tracing::info!(section = section.name(), "setup section updated");
    ok(&req.id, json!({ "section": section.name(), "values": current }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
