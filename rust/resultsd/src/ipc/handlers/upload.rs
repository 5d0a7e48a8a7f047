use serde_json::{json, Value};
use std::path::Path;

use crate::decode;
use crate::grid::RawGrid;
use crate::ingest::{self, ParsedUpload};
use crate::ipc::error::{ok, respond, HandlerErr};
use crate::ipc::helpers::get_required_str;
use crate::ipc::types::{AppState, Request};
use crate::roster::{Roster, RosterSource};

fn upload_result(parsed: &ParsedUpload) -> Value {
    json!({
        "studentCount": parsed.students.len(),
        "students": parsed.students,
        "schoolInfo": parsed.school_info,
        "layout": parsed.layout,
    })
}

/// Runs the engine and, on success only, swaps in the new roster.
fn ingest_into_state(
    state: &mut AppState,
    grid: &RawGrid,
    source: RosterSource,
) -> Result<Value, HandlerErr> {
    let parsed = ingest::parse(grid).map_err(|e| {
        tracing::warn!(code = e.code(), error = %e, "upload rejected");
        HandlerErr::from(e)
    })?;
    tracing::info!(
        students = parsed.students.len(),
        subjects = parsed.layout.subjects.len(),
        header_row = parsed.layout.header_row,
        file = source.file_name.as_deref().unwrap_or("-"),
        "upload parsed"
    );
    let result = upload_result(&parsed);
    state.roster = Some(Roster::from_upload(parsed, source));
    Ok(result)
}

fn upload_parse(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let path = get_required_str(&req.params, "path")?;
    let decoded = decode::read_grid(Path::new(&path)).map_err(|e| {
        HandlerErr::new("decode_failed", format!("{e:#}")).with_details(json!({ "path": path }))
    })?;
    let source = RosterSource {
        file_name: Path::new(&path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string()),
        sha256: Some(decoded.sha256.clone()),
        format: Some(decoded.format),
        sheet_name: decoded.sheet_name.clone(),
        project_id: None,
    };
    let mut result = ingest_into_state(state, &decoded.grid, source)?;
    result["format"] = json!(decoded.format);
    result["sheetName"] = json!(decoded.sheet_name);
    result["sha256"] = json!(decoded.sha256);
    Ok(result)
}

fn upload_parse_grid(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let rows = req
        .params
        .get("rows")
        .filter(|v| v.is_array())
        .ok_or_else(|| HandlerErr::new("bad_params", "rows must be an array of arrays"))?;
    let grid: RawGrid = serde_json::from_value(rows.clone())
        .map_err(|e| HandlerErr::new("bad_params", format!("invalid rows: {}", e)))?;
    let source = RosterSource {
        file_name: None,
        sha256: None,
        format: None,
        sheet_name: None,
        project_id: None,
    };
    ingest_into_state(state, &grid, source)
}

fn handle_roster_get(state: &mut AppState, req: &Request) -> Value {
    ok(&req.id, json!({ "roster": state.roster }))
}

fn handle_roster_clear(state: &mut AppState, req: &Request) -> Value {
    let had = state.roster.take().is_some();
    ok(&req.id, json!({ "cleared": had }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "upload.parse" => Some(respond(&req.id, upload_parse(state, req))),
        "upload.parseGrid" => Some(respond(&req.id, upload_parse_grid(state, req))),
        "roster.get" => Some(handle_roster_get(state, req)),
        "roster.clear" => Some(handle_roster_clear(state, req)),
        _ => None,
    }
}
