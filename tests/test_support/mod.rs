#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    spawn_sidecar_with_env(&[])
}

pub fn spawn_sidecar_with_env(env: &[(&str, &str)]) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_setupd");
    let mut cmd = Command::new(exe);
    cmd.env_remove("SETUPD_WORKSPACE")
        .env_remove("SETUPD_SESSION_KEY")
        .env("SETUPD_LOG", "warn");
    for (k, v) in env {
        cmd.env(k, v);
    }
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn setupd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

/// Asserts a failed response and returns its error object.
pub fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value.get("error").cloned().unwrap_or_else(|| json!({}))
}

pub fn registration() -> serde_json::Value {
    json!({
        "institutionName": "Springfield High",
        "adminName": "Ada Admin",
        "email": "ada@springfield.edu",
        "country": "us"
    })
}

pub fn academic_year() -> serde_json::Value {
    json!({ "academicYear": {
        "name": "2024-2025",
        "startDate": "2024-06-01",
        "endDate": "2025-05-31",
        "terms": [
            { "name": "Fall", "startDate": "2024-06-01", "endDate": "2024-10-31", "order": 0 },
            { "name": "Spring", "startDate": "2024-11-01", "endDate": "2025-05-31", "order": 1 }
        ]
    }})
}

pub fn classes() -> serde_json::Value {
    json!({ "classes": [{
        "id": "grade-1",
        "name": "Grade 1",
        "teacherId": "t-1",
        "sections": [
            { "id": "1a", "name": "A", "capacity": 30 },
            { "id": "1b", "name": "B", "capacity": 1 }
        ]
    }]})
}

pub fn subjects() -> serde_json::Value {
    json!({ "subjects": [{
        "id": "english",
        "name": "English",
        "description": "Reading and writing",
        "teacherId": "t-1",
        "curriculum": {
            "syllabus": "Phonics, grammar",
            "learningObjectives": [{ "text": "Read simple sentences" }],
            "resources": [
                { "name": "Reader", "type": "link", "url": "https://example.org/reader" }
            ]
        }
    }]})
}

/// Loads `session_key` and submits every step through to completion.
pub fn complete_setup(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    session_key: &str,
) {
    request_ok(stdin, reader, "setup-load", "wizard.load", json!({ "sessionKey": session_key }));
    for (step, data) in [
        ("registration", registration()),
        ("roles", serde_json::Value::Null),
        ("academicYear", academic_year()),
        ("classSection", classes()),
        ("subject", subjects()),
    ] {
        request_ok(
            stdin,
            reader,
            &format!("setup-{step}"),
            "wizard.submit",
            json!({ "step": step, "data": data }),
        );
    }
}

pub fn student(first_name: &str, roll_number: &str, section_id: &str) -> serde_json::Value {
    json!({
        "firstName": first_name,
        "lastName": "Simpson",
        "dateOfBirth": "2015-05-09",
        "gender": "female",
        "classId": "grade-1",
        "sectionId": section_id,
        "rollNumber": roll_number,
        "guardianName": "Marge Simpson",
        "guardianPhone": "+15550100123",
        "guardianEmail": "marge@example.org"
    })
}
