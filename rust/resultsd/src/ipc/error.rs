use serde_json::{json, Value};

use crate::ingest::IngestError;

pub fn ok(id: &str, result: Value) -> Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(id: &str, code: &str, message: impl Into<String>, details: Option<Value>) -> Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Failure carried out of a handler body and rendered once at the edge.
#[derive(Debug)]
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<IngestError> for HandlerErr {
    fn from(e: IngestError) -> Self {
        let details = match &e {
            IngestError::InsufficientRows { rows } => json!({ "rows": rows }),
            IngestError::NoNameColumn { header_row } | IngestError::NoSubjectColumns { header_row } => {
                json!({ "headerRow": header_row })
            }
            IngestError::NoValidRecords { scanned } => json!({ "scannedRows": scanned }),
        };
        HandlerErr::new(e.code(), e.to_string()).with_details(details)
    }
}

impl From<rusqlite::Error> for HandlerErr {
    fn from(e: rusqlite::Error) -> Self {
        HandlerErr::new("db_query_failed", e.to_string())
    }
}

/// Renders a handler body's `Result` as a response envelope.
pub fn respond(id: &str, result: Result<Value, HandlerErr>) -> Value {
    match result {
        Ok(v) => ok(id, v),
        Err(e) => e.response(id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_errors_keep_code_and_details() {
        let resp = HandlerErr::from(IngestError::NoValidRecords { scanned: 7 }).response("r1");
        assert_eq!(resp["ok"], json!(false));
        assert_eq!(resp["id"], json!("r1"));
        assert_eq!(resp["error"]["code"], json!("no_valid_records"));
        assert_eq!(resp["error"]["details"]["scannedRows"], json!(7));
    }

    #[test]
    fn err_omits_absent_details() {
        let resp = err("x", "bad_params", "missing path", None);
        assert!(resp["error"].get("details").is_none());
    }
}
