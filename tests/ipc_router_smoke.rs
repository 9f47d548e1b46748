mod test_support;

use serde_json::json;
use std::io::{BufRead, Write};
use test_support::{
    academic_year, complete_setup, registration, request, request_err, request_ok,
    spawn_sidecar, spawn_sidecar_with_env, temp_dir,
};

#[test]
fn health_and_unknown_methods() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health["version"].is_string());
    assert!(health["workspacePath"].is_null());

    let unknown = request_err(&mut stdin, &mut reader, "2", "grades.compute", json!({}));
    assert_eq!(unknown["code"], "not_implemented");

    let no_ws = request_err(&mut stdin, &mut reader, "3", "wizard.load", json!({}));
    assert_eq!(no_ws["code"], "no_workspace");

    let no_session = request_err(&mut stdin, &mut reader, "4", "form.get", json!({}));
    assert_eq!(no_session["code"], "no_session");

    let bad_step = request(
        &mut stdin,
        &mut reader,
        "5",
        "form.progress",
        json!({ "step": "payroll" }),
    );
    assert_eq!(bad_step["ok"], false);

    // Malformed lines get an id-less error and the loop keeps going.
    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read bad_json response");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("json");
    assert_eq!(value["error"]["code"], "bad_json");

    request_ok(&mut stdin, &mut reader, "6", "health", json!({}));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn workspace_and_session_key_come_from_environment() {
    let workspace = temp_dir("setupd-env");
    let ws = workspace.to_string_lossy().to_string();
    let (mut child, mut stdin, mut reader) = spawn_sidecar_with_env(&[
        ("SETUPD_WORKSPACE", ws.as_str()),
        ("SETUPD_SESSION_KEY", "campus-a"),
    ]);

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["workspacePath"], ws.as_str());

    let loaded = request_ok(&mut stdin, &mut reader, "2", "wizard.load", json!({}));
    assert_eq!(loaded["sessionKey"], "campus-a");
    assert!(workspace.join("setupd.sqlite3").exists());

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn draft_bundle_moves_between_workspaces() {
    let src = temp_dir("setupd-export-src");
    let dst = temp_dir("setupd-export-dst");
    let out = temp_dir("setupd-export-out");
    let bundle_path = out.join("draft.zip");

    {
        let (mut child, mut stdin, mut reader) = spawn_sidecar();
        request_ok(
            &mut stdin,
            &mut reader,
            "1",
            "workspace.select",
            json!({ "path": src.to_string_lossy() }),
        );
        request_ok(&mut stdin, &mut reader, "2", "wizard.load", json!({ "sessionKey": "s1" }));
        request_ok(
            &mut stdin,
            &mut reader,
            "3",
            "wizard.submit",
            json!({ "step": "registration", "data": registration() }),
        );
        request_ok(&mut stdin, &mut reader, "4", "wizard.submit", json!({ "step": "roles" }));

        let missing = request_err(
            &mut stdin,
            &mut reader,
            "5",
            "setup.exportBundle",
            json!({ "sessionKey": "nobody", "outPath": bundle_path.to_string_lossy() }),
        );
        assert_eq!(missing["code"], "not_found");

        let exported = request_ok(
            &mut stdin,
            &mut reader,
            "6",
            "setup.exportBundle",
            json!({ "sessionKey": "s1", "outPath": bundle_path.to_string_lossy() }),
        );
        assert_eq!(exported["bundleFormat"], "setupd-draft-v1");
        assert_eq!(exported["step"], "academicYear");
        drop(stdin);
        let _ = child.wait();
    }

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": dst.to_string_lossy() }),
    );
    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "setup.importBundle",
        json!({ "inPath": bundle_path.to_string_lossy() }),
    );
    assert_eq!(imported["sessionKey"], "s1");
    assert_eq!(imported["step"], "academicYear");
    assert_eq!(imported["completed"], false);

    // The imported draft is the live session.
    let state = request_ok(&mut stdin, &mut reader, "3", "wizard.state", json!({}));
    assert_eq!(state["sessionKey"], "s1");
    assert_eq!(state["completedSteps"], json!(["registration", "roles"]));
    let next = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "wizard.submit",
        json!({ "step": "academicYear", "data": academic_year() }),
    );
    assert_eq!(next["step"], "classSection");

    let bad = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "setup.importBundle",
        json!({ "inPath": out.join("missing.zip").to_string_lossy() }),
    );
    assert_eq!(bad["code"], "bundle_failed");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(src);
    let _ = std::fs::remove_dir_all(dst);
    let _ = std::fs::remove_dir_all(out);
}

#[test]
fn completed_import_retires_the_loaded_session() {
    let src = temp_dir("setupd-done-src");
    let dst = temp_dir("setupd-done-dst");
    let out = temp_dir("setupd-done-out");
    let bundle_path = out.join("done.zip");

    {
        let (mut child, mut stdin, mut reader) = spawn_sidecar();
        request_ok(
            &mut stdin,
            &mut reader,
            "1",
            "workspace.select",
            json!({ "path": src.to_string_lossy() }),
        );
        complete_setup(&mut stdin, &mut reader, "s1");
        let exported = request_ok(
            &mut stdin,
            &mut reader,
            "2",
            "setup.exportBundle",
            json!({ "sessionKey": "s1", "outPath": bundle_path.to_string_lossy() }),
        );
        assert_eq!(exported["step"], "complete");
        drop(stdin);
        let _ = child.wait();
    }

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": dst.to_string_lossy() }),
    );
    request_ok(&mut stdin, &mut reader, "2", "wizard.load", json!({ "sessionKey": "s1" }));
    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "wizard.submit",
        json!({ "step": "registration", "data": registration() }),
    );

    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "setup.importBundle",
        json!({ "inPath": bundle_path.to_string_lossy() }),
    );
    assert_eq!(imported["completed"], true);

    let stale = request_err(&mut stdin, &mut reader, "5", "wizard.state", json!({}));
    assert_eq!(stale["code"], "no_session");
    let submit = request_err(
        &mut stdin,
        &mut reader,
        "6",
        "wizard.submit",
        json!({ "step": "roles" }),
    );
    assert_eq!(submit["code"], "no_session");

    let done = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "setup.completed.get",
        json!({ "sessionKey": "s1" }),
    );
    assert_eq!(done["institution"]["institutionName"], "Springfield High");

    // Reloading the key finds no working draft left behind.
    let reloaded = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "wizard.load",
        json!({ "sessionKey": "s1" }),
    );
    assert_eq!(reloaded["step"], "registration");
    assert!(reloaded["previouslyCompletedAt"].is_string());

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(src);
    let _ = std::fs::remove_dir_all(dst);
    let _ = std::fs::remove_dir_all(out);
}
