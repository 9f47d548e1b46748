use serde_json::json;

use crate::wizard::error::{SubmitError, ValidationReport};

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
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

/// Field errors ride along in `details` so the UI can mark inputs.
pub fn submit_err(
    id: &str,
    e: &SubmitError,
    mut details: serde_json::Map<String, serde_json::Value>,
) -> serde_json::Value {
    if let SubmitError::Validation(report) = e {
        insert_report(&mut details, report);
    }
    err(id, e.code(), e.to_string(), Some(serde_json::Value::Object(details)))
}

pub fn validation_err(id: &str, message: impl Into<String>, report: &ValidationReport) -> serde_json::Value {
    let mut details = serde_json::Map::new();
    insert_report(&mut details, report);
    err(
        id,
        "validation_failed",
        message,
        Some(serde_json::Value::Object(details)),
    )
}

fn insert_report(details: &mut serde_json::Map<String, serde_json::Value>, report: &ValidationReport) {
    details.insert("errors".into(), json!(report.errors));
    details.insert("fieldMessages".into(), json!(report.field_messages()));
}
