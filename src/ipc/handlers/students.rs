use chrono::Utc;
use serde_json::{json, Value};
use tracing::info;

use crate::ipc::error::{err, ok, validation_err};
use crate::ipc::helpers::{required_str, session_key, str_param};
use crate::ipc::types::{AppState, Request};
use crate::store::SqliteDraftStore;
use crate::students::{self, EnrollError, Enrollment, StudentFilter};
use crate::wizard::model::Draft;

/// Students are placed into a finished setup only.
fn completed_setup(store: &SqliteDraftStore, req: &Request, key: &str) -> Result<Draft, Value> {
    match store.completed(key) {
        Ok(Some(done)) => Ok(done.saved.draft),
        Ok(None) => Err(err(
            &req.id,
            "setup_incomplete",
            format!("session {key} has no completed setup; finish the wizard first"),
            None,
        )),
        Err(e) => Err(err(&req.id, "persistence_failed", e.to_string(), None)),
    }
}

fn handle_students_enroll(state: &mut AppState, req: &Request) -> Value {
    let key = session_key(state, req);
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(raw) = req.params.get("student").cloned() else {
        return err(&req.id, "bad_params", "missing params.student", None);
    };
    let input: Enrollment = match serde_json::from_value(raw) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "bad_params",
                format!("invalid params.student: {e}"),
                None,
            )
        }
    };
    let setup = match completed_setup(store, req, &key) {
        Ok(d) => d,
        Err(resp) => return resp,
    };

    match students::enroll(store.conn(), &key, &setup, &input, Utc::now().date_naive()) {
        Ok(student) => {
            info!(session_key = %key, class_id = %student.class_id, "student enrolled");
            ok(&req.id, json!({ "student": student }))
        }
        Err(EnrollError::Validation(report)) => {
            validation_err(&req.id, "enrollment is not valid", &report)
        }
        Err(EnrollError::Db(e)) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_students_list(state: &mut AppState, req: &Request) -> Value {
    let key = session_key(state, req);
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let filter = StudentFilter {
        class_id: str_param(req, "classId"),
        section_id: str_param(req, "sectionId"),
        search: str_param(req, "search"),
    };

    let rows = match students::list(store.conn(), &key, &filter) {
        Ok(r) => r,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let sections = match store.completed(&key) {
        Ok(Some(done)) => match students::section_loads(store.conn(), &key, &done.saved.draft) {
            Ok(s) => s,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        Ok(None) => Vec::new(),
        Err(e) => return err(&req.id, "persistence_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "students": rows, "sections": sections }))
}

fn handle_students_get(state: &mut AppState, req: &Request) -> Value {
    let key = session_key(state, req);
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match students::get(store.conn(), &key, id) {
        Ok(Some(student)) => ok(&req.id, json!({ "student": student })),
        Ok(None) => err(&req.id, "not_found", format!("no student with id {id}"), None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> Value {
    let key = session_key(state, req);
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match students::delete(store.conn(), &key, id) {
        Ok(true) => {
            info!(session_key = %key, student_id = id, "student removed");
            ok(&req.id, json!({ "ok": true }))
        }
        Ok(false) => err(&req.id, "not_found", format!("no student with id {id}"), None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "students.enroll" => Some(handle_students_enroll(state, req)),
        "students.list" => Some(handle_students_list(state, req)),
        "students.get" => Some(handle_students_get(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        _ => None,
    }
}
