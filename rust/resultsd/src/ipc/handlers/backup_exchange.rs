use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use crate::backup;
use crate::db;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::get_required_str;
use crate::ipc::types::{AppState, Request};

/// Explicit `workspacePath`, else the selected workspace.
fn bundle_workspace(state: &AppState, req: &Request) -> Result<PathBuf, HandlerErr> {
    req.params
        .get("workspacePath")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .or_else(|| state.workspace.clone())
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

fn io_failed(e: anyhow::Error, path: &Path) -> HandlerErr {
    HandlerErr::new("io_failed", format!("{e:#}"))
        .with_details(json!({ "path": path.to_string_lossy() }))
}

fn export_bundle(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let out = PathBuf::from(get_required_str(&req.params, "outPath")?);
    let workspace = bundle_workspace(state, req)?;

    // Flush pending pages so the copied file is self-contained.
    if let Some(conn) = state.db.as_ref() {
        let _ = conn.execute_batch("PRAGMA wal_checkpoint(FULL)");
    }

    let summary = backup::export_workspace_bundle(&workspace, &out).map_err(|e| {
        tracing::warn!(error = %e, "bundle export failed");
        io_failed(e, &out)
    })?;
    tracing::info!(path = %out.display(), entries = summary.entry_count, "workspace bundle exported");

    Ok(json!({
        "ok": true,
        "path": out.to_string_lossy(),
        "bundleFormat": summary.bundle_format,
        "entryCount": summary.entry_count,
    }))
}

fn import_bundle(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let src = PathBuf::from(get_required_str(&req.params, "inPath")?);
    let workspace = bundle_workspace(state, req)?;
    if !src.is_file() {
        return Err(HandlerErr::new("not_found", "bundle file not found")
            .with_details(json!({ "path": src.to_string_lossy() })));
    }

    // The open handle must go before the database file is replaced.
    state.db = None;
    let summary = match backup::import_workspace_bundle(&src, &workspace) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "bundle import failed");
            if let Some(prev) = state.workspace.clone() {
                state.db = db::open_db(&prev).ok();
            }
            return Err(io_failed(e, &src));
        }
    };

    let conn = db::open_db(&workspace)
        .map_err(|e| HandlerErr::new("db_open_failed", format!("{e:#}")))?;
    state.workspace = Some(workspace.clone());
    state.db = Some(conn);
    // Restored projects are not the ones the held roster was saved as.
    if let Some(r) = state.roster.as_mut() {
        r.detach_project();
    }
    tracing::info!(format = %summary.bundle_format_detected, "workspace bundle imported");

    Ok(json!({
        "ok": true,
        "workspacePath": workspace.to_string_lossy(),
        "bundleFormatDetected": summary.bundle_format_detected,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "backup.exportWorkspaceBundle" => export_bundle(state, req),
        "backup.importWorkspaceBundle" => import_bundle(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
