use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{index_param, progress_json, required_str, step_param, str_param};
use crate::ipc::types::{AppState, Request, Session};
use crate::wizard::model::{Permissions, Role, StepData, DEFAULT_ROLE_IDS};
use crate::wizard::ordered::{Direction, Ordered, OrderedList};
use crate::wizard::WizardStep;

/// The step a form request addresses: `params.step`, else the current one.
fn target_step(session: &Session, req: &Request) -> Result<WizardStep, Value> {
    Ok(step_param(req, "step")?.unwrap_or(session.controller.step()))
}

fn handle_form_get(state: &mut AppState, req: &Request) -> Value {
    let Some(session) = state.session.as_ref() else {
        return err(&req.id, "no_session", "load a wizard session first", None);
    };
    let step = match target_step(session, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let data = match StepData::from_draft(step, &session.form) {
        Some(d) => d.to_json(),
        None => json!(session.form),
    };
    ok(&req.id, json!({ "step": step, "data": data }))
}

fn handle_form_update(state: &mut AppState, req: &Request) -> Value {
    let Some(session) = state.session.as_mut() else {
        return err(&req.id, "no_session", "load a wizard session first", None);
    };
    let step = match target_step(session, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let Some(raw) = req.params.get("data").cloned() else {
        return err(&req.id, "bad_params", "missing params.data", None);
    };
    let data = match StepData::from_json(step, raw) {
        Ok(d) => d,
        Err(e) => {
            return err(
                &req.id,
                "bad_params",
                format!("invalid data for {step}: {e}"),
                None,
            )
        }
    };

    let report = session.controller.validate(&data);
    data.apply_to(&mut session.form);
    ok(
        &req.id,
        json!({
            "step": step,
            "progress": progress_json(step, &session.form),
            "fieldMessages": report.field_messages(),
        }),
    )
}

fn handle_form_validate(state: &mut AppState, req: &Request) -> Value {
    let Some(session) = state.session.as_ref() else {
        return err(&req.id, "no_session", "load a wizard session first", None);
    };
    let step = match target_step(session, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let Some(data) = StepData::from_draft(step, &session.form) else {
        return ok(&req.id, json!({ "ok": true, "errors": [], "fieldMessages": {} }));
    };
    let report = session.controller.validate(&data);
    ok(
        &req.id,
        json!({
            "ok": report.is_ok(),
            "errors": report.errors,
            "fieldMessages": report.field_messages(),
        }),
    )
}

fn handle_form_progress(state: &mut AppState, req: &Request) -> Value {
    let Some(session) = state.session.as_ref() else {
        return err(&req.id, "no_session", "load a wizard session first", None);
    };
    match target_step(session, req) {
        Ok(step) => ok(&req.id, progress_json(step, &session.form)),
        Err(resp) => resp,
    }
}

#[derive(Clone, Copy)]
enum ListOp {
    Append,
    Remove,
    Move,
    MoveAdjacent,
}

impl ListOp {
    fn parse(method: &str) -> Option<Self> {
        match method {
            "form.list.append" => Some(Self::Append),
            "form.list.remove" => Some(Self::Remove),
            "form.list.move" => Some(Self::Move),
            "form.list.moveAdjacent" => Some(Self::MoveAdjacent),
            _ => None,
        }
    }
}

fn apply_list_op<T>(
    list: &mut OrderedList<T>,
    op: ListOp,
    req: &Request,
    seed: impl FnOnce(&mut T, usize),
) -> Result<Value, Value>
where
    T: Ordered + Default + Serialize + DeserializeOwned,
{
    let changed = match op {
        ListOp::Append => {
            let mut item: T = match req.params.get("item") {
                Some(v) if !v.is_null() => serde_json::from_value(v.clone()).map_err(|e| {
                    err(&req.id, "bad_params", format!("invalid params.item: {e}"), None)
                })?,
                _ => T::default(),
            };
            seed(&mut item, list.len());
            let appended = json!(list.append(item));
            return Ok(json!({ "item": appended, "items": list }));
        }
        ListOp::Remove => {
            let id = required_str(req, "id")?;
            list.remove(id)
                .map_err(|e| err(&req.id, "not_found", e.to_string(), None))?;
            true
        }
        ListOp::Move => {
            let Some(from) = index_param(req, "from")? else {
                return Err(err(&req.id, "bad_params", "missing params.from", None));
            };
            // A null `to` is a drag dropped outside the list.
            list.move_item(from, index_param(req, "to")?)
        }
        ListOp::MoveAdjacent => {
            let Some(index) = index_param(req, "index")? else {
                return Err(err(&req.id, "bad_params", "missing params.index", None));
            };
            let direction = required_str(req, "direction")?;
            let Some(direction) = Direction::parse(direction) else {
                return Err(err(
                    &req.id,
                    "bad_params",
                    "params.direction must be up or down",
                    None,
                ));
            };
            list.move_adjacent(index, direction)
        }
    };
    Ok(json!({ "changed": changed, "items": list }))
}

fn handle_form_list(state: &mut AppState, req: &Request, op: ListOp) -> Value {
    let Some(session) = state.session.as_mut() else {
        return err(&req.id, "no_session", "load a wizard session first", None);
    };
    let list = match required_str(req, "list") {
        Ok(l) => l,
        Err(resp) => return resp,
    };
    let form = &mut session.form;

    let result = match list {
        "terms" => apply_list_op(&mut form.academic_year.terms, op, req, |t, n| {
            if t.name.trim().is_empty() {
                t.name = format!("Term {}", n + 1);
            }
        }),
        "sections" => {
            let class_id = match required_str(req, "classId") {
                Ok(id) => id,
                Err(resp) => return resp,
            };
            let Some(class) = form.class_mut(class_id) else {
                return err(&req.id, "not_found", format!("no class with id {class_id}"), None);
            };
            apply_list_op(&mut class.sections, op, req, |s, n| {
                if s.name.trim().is_empty() {
                    s.name = format!("Section {}", n + 1);
                }
            })
        }
        "learningObjectives" => {
            let subject_id = match required_str(req, "subjectId") {
                Ok(id) => id,
                Err(resp) => return resp,
            };
            let Some(subject) = form.subject_mut(subject_id) else {
                return err(
                    &req.id,
                    "not_found",
                    format!("no subject with id {subject_id}"),
                    None,
                );
            };
            apply_list_op(&mut subject.curriculum.learning_objectives, op, req, |_, _| {})
        }
        other => {
            return err(
                &req.id,
                "bad_params",
                format!("unknown list: {other}"),
                None,
            )
        }
    };

    match result {
        Ok(v) => {
            debug!(list, method = %req.method, "list edited");
            ok(&req.id, v)
        }
        Err(resp) => resp,
    }
}

fn handle_roles_add_custom(state: &mut AppState, req: &Request) -> Value {
    let Some(session) = state.session.as_mut() else {
        return err(&req.id, "no_session", "load a wizard session first", None);
    };
    let name = str_param(req, "name").unwrap_or("").trim();
    let description = str_param(req, "description").unwrap_or("").trim();
    if name.is_empty() {
        return err(&req.id, "bad_params", "role name must not be empty", None);
    }
    if description.is_empty() {
        return err(&req.id, "bad_params", "role description must not be empty", None);
    }
    if session
        .form
        .roles
        .iter()
        .any(|r| r.name.trim().eq_ignore_ascii_case(name))
    {
        return err(
            &req.id,
            "bad_params",
            format!("a role named {name} already exists"),
            None,
        );
    }

    let role = Role {
        id: format!("custom-{}", Uuid::new_v4()),
        name: name.to_string(),
        description: description.to_string(),
        permissions: Permissions::default(),
        is_custom: true,
    };
    session.form.roles.push(role.clone());
    ok(&req.id, json!({ "role": role, "roles": session.form.roles }))
}

fn handle_roles_delete(state: &mut AppState, req: &Request) -> Value {
    let Some(session) = state.session.as_mut() else {
        return err(&req.id, "no_session", "load a wizard session first", None);
    };
    let role_id = match required_str(req, "roleId") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    if DEFAULT_ROLE_IDS.contains(&role_id) {
        return err(&req.id, "bad_params", "default roles cannot be deleted", None);
    }
    let Some(idx) = session.form.roles.iter().position(|r| r.id == role_id) else {
        return err(&req.id, "not_found", format!("no role with id {role_id}"), None);
    };
    session.form.roles.remove(idx);
    ok(&req.id, json!({ "roles": session.form.roles }))
}

fn handle_roles_set_permission(state: &mut AppState, req: &Request) -> Value {
    let Some(session) = state.session.as_mut() else {
        return err(&req.id, "no_session", "load a wizard session first", None);
    };
    let role_id = match required_str(req, "roleId") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let permission = match required_str(req, "permission") {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    let Some(enabled) = req.params.get("enabled").and_then(|v| v.as_bool()) else {
        return err(&req.id, "bad_params", "missing params.enabled", None);
    };
    let Some(role) = session.form.role_mut(role_id) else {
        return err(&req.id, "not_found", format!("no role with id {role_id}"), None);
    };
    if !role.permissions.set(permission, enabled) {
        return err(
            &req.id,
            "bad_params",
            format!("unknown permission: {permission}"),
            Some(json!({ "known": Permissions::NAMES })),
        );
    }
    ok(&req.id, json!({ "role": role }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    if let Some(op) = ListOp::parse(&req.method) {
        return Some(handle_form_list(state, req, op));
    }
    match req.method.as_str() {
        "form.get" => Some(handle_form_get(state, req)),
        "form.update" => Some(handle_form_update(state, req)),
        "form.validate" => Some(handle_form_validate(state, req)),
        "form.progress" => Some(handle_form_progress(state, req)),
        "form.roles.addCustom" => Some(handle_roles_add_custom(state, req)),
        "form.roles.delete" => Some(handle_roles_delete(state, req)),
        "form.roles.setPermission" => Some(handle_roles_set_permission(state, req)),
        _ => None,
    }
}
