use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::info;

use crate::bundle;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{required_str, session_key};
use crate::ipc::types::{AppState, Request, Session};
use crate::wizard::controller::{DraftStore, SavedDraft, WizardController};
use crate::wizard::WizardStep;

fn handle_completed_get(state: &mut AppState, req: &Request) -> Value {
    let key = session_key(state, req);
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match store.completed(&key) {
        Ok(Some(done)) => ok(
            &req.id,
            json!({
                "sessionKey": done.session_key,
                "completedAt": done.completed_at,
                "institution": done.saved.draft.institution,
                "summary": done.saved.draft.summary(),
                "draft": done.saved.draft,
            }),
        ),
        Ok(None) => err(
            &req.id,
            "not_found",
            format!("no completed setup for session {key}"),
            None,
        ),
        Err(e) => err(&req.id, "persistence_failed", e.to_string(), None),
    }
}

fn handle_export_bundle(state: &mut AppState, req: &Request) -> Value {
    let out_path = match required_str(req, "outPath") {
        Ok(p) => PathBuf::from(p),
        Err(resp) => return resp,
    };
    let key = session_key(state, req);
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    // A finished setup wins over a working draft under the same key.
    let saved = match store.completed(&key) {
        Ok(Some(done)) => Some(done.saved),
        Ok(None) => match store.load(&key) {
            Ok(s) => s,
            Err(e) => return err(&req.id, "persistence_failed", e.to_string(), None),
        },
        Err(e) => return err(&req.id, "persistence_failed", e.to_string(), None),
    };
    let Some(saved) = saved else {
        return err(
            &req.id,
            "not_found",
            format!("nothing saved for session {key}"),
            None,
        );
    };

    match bundle::export_setup_bundle(&key, &json!(saved), &out_path) {
        Ok(summary) => {
            info!(session_key = %key, path = %out_path.display(), "bundle exported");
            ok(
                &req.id,
                json!({
                    "bundleFormat": summary.bundle_format,
                    "entryCount": summary.entry_count,
                    "sha256": summary.sha256,
                    "step": saved.step,
                }),
            )
        }
        Err(e) => err(&req.id, "bundle_failed", format!("{e:?}"), None),
    }
}

fn handle_import_bundle(state: &mut AppState, req: &Request) -> Value {
    let in_path = match required_str(req, "inPath") {
        Ok(p) => PathBuf::from(p),
        Err(resp) => return resp,
    };
    if state.store.is_none() {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    }

    let imported = match bundle::import_setup_bundle(&in_path) {
        Ok(b) => b,
        Err(e) => return err(&req.id, "bundle_failed", format!("{e:?}"), None),
    };
    let saved: SavedDraft = match serde_json::from_value(imported.payload) {
        Ok(s) => s,
        Err(e) => {
            return err(
                &req.id,
                "bundle_failed",
                format!("bundle draft is not a setup draft: {e}"),
                None,
            )
        }
    };

    // Explicit key, else the one recorded in the bundle, else the default.
    let key = match req.params.get("sessionKey").and_then(|v| v.as_str()) {
        Some(k) if !k.trim().is_empty() => k.trim().to_string(),
        _ if !imported.session_key.trim().is_empty() => imported.session_key.clone(),
        _ => state.settings.default_session_key.clone(),
    };

    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let written = if saved.step == WizardStep::Complete {
        store.complete(&key, &saved)
    } else {
        store.save(&key, &saved)
    };
    if let Err(e) = written {
        return err(&req.id, "persistence_failed", e.to_string(), None);
    }
    info!(session_key = %key, step = %saved.step, "bundle imported");

    // A completed import retires a loaded session under the same key; a
    // working draft becomes the loaded session straight away.
    if saved.step == WizardStep::Complete {
        if state
            .session
            .as_ref()
            .is_some_and(|s| s.controller.session_key() == key)
        {
            info!(session_key = %key, "loaded session replaced by completed import");
            state.session = None;
        }
    } else {
        match WizardController::load_draft(store, &key, saved.step) {
            Ok(controller) => {
                state.session = Some(Session {
                    form: controller.draft().clone(),
                    controller,
                });
            }
            Err(e) => return err(&req.id, "persistence_failed", e.to_string(), None),
        }
    }

    ok(
        &req.id,
        json!({
            "sessionKey": key,
            "bundleFormatDetected": imported.bundle_format_detected,
            "step": saved.step,
            "completed": saved.step == WizardStep::Complete,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "setup.completed.get" => Some(handle_completed_get(state, req)),
        "setup.exportBundle" => Some(handle_export_bundle(state, req)),
        "setup.importBundle" => Some(handle_import_bundle(state, req)),
        _ => None,
    }
}
