use rusqlite::Connection;
use serde_json::Value;

use super::error::HandlerErr;
use super::types::AppState;
use crate::roster::Roster;

pub fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

pub fn get_optional_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn require_db(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn require_roster(state: &AppState) -> Result<&Roster, HandlerErr> {
    state
        .roster
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_roster", "upload a results sheet or load a project first"))
}

pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
