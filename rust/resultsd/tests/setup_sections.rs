mod test_support;

use serde_json::json;
use test_support::{error_code, request, request_ok, spawn_sidecar, temp_dir};

#[test]
fn defaults_updates_and_validation() {
    let workspace = temp_dir("resultsd-setup");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let s = request_ok(&mut stdin, &mut reader, "2", "setup.get", json!({}));
    assert_eq!(s["grading"]["maxScorePerSubject"], json!(100));
    assert_eq!(s["notify"]["enabled"], json!(false));
    assert_eq!(s["notify"]["subjectPrefix"], json!("Results"));
    assert_eq!(s["display"]["logoPath"], serde_json::Value::Null);

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "setup.update",
        json!({ "section": "display", "patch": { "session": " 2024/2025 ", "logoPath": "/img/crest.png" } }),
    );
    assert_eq!(updated["values"]["session"], json!("2024/2025"));

    let s = request_ok(&mut stdin, &mut reader, "4", "setup.get", json!({}));
    assert_eq!(s["display"]["session"], json!("2024/2025"));
    assert_eq!(s["display"]["logoPath"], json!("/img/crest.png"));
    assert_eq!(s["display"]["schoolName"], json!(""));

    let cases = vec![
        json!({ "section": "grading", "patch": { "maxScorePerSubject": 1001 } }),
        json!({ "section": "grading", "patch": { "maxScorePerSubject": "100" } }),
        json!({ "section": "notify", "patch": { "enabled": "yes" } }),
        json!({ "section": "display", "patch": { "motto": "Excellence" } }),
        json!({ "section": "printer", "patch": {} }),
        json!({ "section": "display" }),
    ];
    for (i, params) in cases.into_iter().enumerate() {
        let resp = request(&mut stdin, &mut reader, &format!("bad{}", i), "setup.update", params);
        assert_eq!(error_code(&resp), Some("bad_params"), "{}", resp);
    }

    // Rejected patches leave stored values alone.
    let s = request_ok(&mut stdin, &mut reader, "5", "setup.get", json!({}));
    assert_eq!(s["grading"]["maxScorePerSubject"], json!(100));
}
