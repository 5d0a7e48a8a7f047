use serde_json::{json, Value};
use std::path::PathBuf;

use crate::config;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};

fn handle_health(state: &mut AppState, req: &Request) -> Value {
    ok(
        &req.id,
        json!({
            "name": config::APP_NAME,
            "version": config::APP_VERSION,
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "rosterSize": state.roster.as_ref().map(|r| r.students.len()).unwrap_or(0)
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match db::open_db(&path) {
        Ok(conn) => {
            tracing::info!(workspace = %path.display(), "workspace opened");
            let switched = state.workspace.as_deref() != Some(path.as_path());
            state.workspace = Some(path.clone());
            state.db = Some(conn);
            if switched {
                if let Some(r) = state.roster.as_mut() {
                    r.detach_project();
                }
            }
            ok(&req.id, json!({ "workspacePath": path.to_string_lossy() }))
        }
        Err(e) => err(&req.id, "db_open_failed", format!("{e:#}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
