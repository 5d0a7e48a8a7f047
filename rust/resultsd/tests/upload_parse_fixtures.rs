mod test_support;

use serde_json::{json, Value};
use test_support::{error_code, fixture_path, request, request_ok, spawn_sidecar};

fn names(students: &Value) -> Vec<String> {
    students
        .as_array()
        .expect("students array")
        .iter()
        .map(|s| s["name"].as_str().unwrap_or("").to_string())
        .collect()
}

#[test]
fn academy_csv_yields_records_metadata_and_layout() {
    let path = fixture_path("fixtures/uploads/academy_results.csv");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let res = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "upload.parse",
        json!({ "path": path.to_string_lossy() }),
    );

    assert_eq!(res["studentCount"], json!(4));
    assert_eq!(res["format"], json!("delimited"));
    assert_eq!(res["sha256"].as_str().map(|s| s.len()), Some(64));
    assert_eq!(
        names(&res["students"]),
        vec!["Ade Bello", "Bola Tinubu", "Chidi Okafor", "Efe Omoregie"]
    );

    let ade = &res["students"][0];
    assert_eq!(ade["id"], json!("student-1"));
    assert_eq!(ade["class"], json!("JSS1"));
    assert_eq!(ade["serialNumber"], json!("1"));
    assert_eq!(ade["email"], json!("ade@example.com"));
    assert_eq!(ade["totalMarks"], json!(240.0));
    assert_eq!(ade["averageScore"], json!(80.0));
    assert_eq!(ade["grade"], json!("A"));

    // Blank English cell is left out, not zero-filled.
    let bola = &res["students"][1];
    assert_eq!(bola["subjects"], json!({ "Mathematics": 60.0, "Basic Science": 75.0 }));
    assert_eq!(bola["averageScore"], json!(67.5));
    assert_eq!(bola["grade"], json!("C"));
    assert!(bola.get("email").is_none());

    assert_eq!(res["students"][3]["grade"], json!("F"));
    assert_eq!(res["students"][3]["averageScore"], json!(41.33));

    assert_eq!(
        res["schoolInfo"],
        json!({
            "name": "HILLTOP ACADEMY",
            "address": "Address: 12 Ridge Road Jos",
            "session": "2023/2024"
        })
    );

    let layout = &res["layout"];
    assert_eq!(layout["headerRow"], json!(4));
    let roles: Vec<&str> = layout["columns"]
        .as_array()
        .expect("columns")
        .iter()
        .map(|c| c["role"].as_str().unwrap_or(""))
        .collect();
    assert_eq!(
        roles,
        vec!["serial", "name", "class", "subject", "subject", "subject", "ignored", "email"]
    );

    let health = request_ok(&mut stdin, &mut reader, "2", "health", json!({}));
    assert_eq!(health["rosterSize"], json!(4));
}

#[test]
fn semicolon_csv_is_sniffed() {
    let path = fixture_path("fixtures/uploads/semicolon_results.csv");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let res = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "upload.parse",
        json!({ "path": path.to_string_lossy() }),
    );
    assert_eq!(names(&res["students"]), vec!["Ngozi Eze", "Musa Ali"]);
    assert_eq!(res["students"][0]["subjects"], json!({ "Maths": 88.0, "Physics": 92.0 }));
    assert_eq!(res["schoolInfo"], Value::Null);
}

#[test]
fn failed_upload_keeps_previous_roster() {
    let good = fixture_path("fixtures/uploads/semicolon_results.csv");
    let bad = fixture_path("fixtures/uploads/title_only.csv");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "upload.parse",
        json!({ "path": good.to_string_lossy() }),
    );
    let failed = request(
        &mut stdin,
        &mut reader,
        "2",
        "upload.parse",
        json!({ "path": bad.to_string_lossy() }),
    );
    assert_eq!(error_code(&failed), Some("no_name_column"));
    assert_eq!(failed["error"]["details"]["headerRow"], json!(0));

    let roster = request_ok(&mut stdin, &mut reader, "3", "roster.get", json!({}));
    assert_eq!(names(&roster["roster"]["students"]), vec!["Ngozi Eze", "Musa Ali"]);
    assert_eq!(
        roster["roster"]["source"]["fileName"],
        json!("semicolon_results.csv")
    );
}

#[test]
fn decode_failures_are_reported() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let missing = request(
        &mut stdin,
        &mut reader,
        "1",
        "upload.parse",
        json!({ "path": "/definitely/not/here.csv" }),
    );
    assert_eq!(error_code(&missing), Some("decode_failed"));

    let unsupported = request(
        &mut stdin,
        &mut reader,
        "2",
        "upload.parse",
        json!({ "path": "/tmp/results.pdf" }),
    );
    assert_eq!(error_code(&unsupported), Some("decode_failed"));

    let no_path = request(&mut stdin, &mut reader, "3", "upload.parse", json!({}));
    assert_eq!(error_code(&no_path), Some("bad_params"));
}

#[test]
fn parse_grid_accepts_typed_cells_and_reports_engine_errors() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let res = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "upload.parseGrid",
        json!({ "rows": [["Name", "Math", "English"], ["Ade", 80, null], ["Bo", "70", "60"]] }),
    );
    assert_eq!(res["studentCount"], json!(2));
    assert_eq!(res["students"][0]["subjects"], json!({ "Math": 80.0 }));
    assert_eq!(res["students"][1]["averageScore"], json!(65.0));
    assert_eq!(res["students"][1]["grade"], json!("C"));

    let cases = vec![
        (json!([["Name", "Math"]]), "insufficient_rows"),
        (json!([["Name", "Remarks"], ["Ade", "good"], ["Bo", "fair"]]), "no_subject_columns"),
        (json!([["Name", "Math"], ["A", "90"], ["", "80"]]), "no_valid_records"),
    ];
    for (i, (rows, code)) in cases.into_iter().enumerate() {
        let resp = request(
            &mut stdin,
            &mut reader,
            &format!("e{}", i),
            "upload.parseGrid",
            json!({ "rows": rows }),
        );
        assert_eq!(error_code(&resp), Some(code), "{}", resp);
    }

    let bad_rows = request(
        &mut stdin,
        &mut reader,
        "b",
        "upload.parseGrid",
        json!({ "rows": "Name,Math" }),
    );
    assert_eq!(error_code(&bad_rows), Some("bad_params"));

    // The first grid is still held.
    let roster = request_ok(&mut stdin, &mut reader, "r", "roster.get", json!({}));
    assert_eq!(roster["roster"]["subjects"], json!(["Math", "English"]));
    let cleared = request_ok(&mut stdin, &mut reader, "c", "roster.clear", json!({}));
    assert_eq!(cleared["cleared"], json!(true));
    let roster = request_ok(&mut stdin, &mut reader, "r2", "roster.get", json!({}));
    assert_eq!(roster["roster"], Value::Null);
}

#[test]
fn workbook_reads_first_sheet_at_its_sheet_offset() {
    let path = fixture_path("fixtures/uploads/offset_two_sheets.xlsx");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let res = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "upload.parse",
        json!({ "path": path.to_string_lossy() }),
    );

    assert_eq!(res["format"], json!("workbook"));
    assert_eq!(res["sheetName"], json!("Results"));
    assert_eq!(res["studentCount"], json!(2));
    // The second sheet's rows and subjects never leak in.
    assert_eq!(names(&res["students"]), vec!["Ade Bello", "Bola Ade"]);
    assert_eq!(
        res["students"][0]["subjects"],
        json!({ "Math": 80.0, "English": 90.0 })
    );
    assert!(res["students"][0]["subjects"]["Math"].is_f64());
    assert_eq!(res["students"][1]["subjects"]["Math"], json!(65.5));
    assert_eq!(res["students"][1]["averageScore"], json!(67.75));

    // Data starts at B3, so row and column indices keep the sheet offset.
    let layout = &res["layout"];
    assert_eq!(layout["headerRow"], json!(2));
    let roles: Vec<&str> = layout["columns"]
        .as_array()
        .expect("columns")
        .iter()
        .map(|c| c["role"].as_str().unwrap_or(""))
        .collect();
    assert_eq!(roles, vec!["ignored", "name", "subject", "subject"]);

    let roster = request_ok(&mut stdin, &mut reader, "2", "roster.get", json!({}));
    assert_eq!(roster["roster"]["source"]["sheetName"], json!("Results"));
    assert_eq!(roster["roster"]["subjects"], json!(["Math", "English"]));
}
