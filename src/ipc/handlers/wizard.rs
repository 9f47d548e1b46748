use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::ipc::error::{err, ok, submit_err};
use crate::ipc::helpers::{progress_json, session_key, step_param};
use crate::ipc::outbox::Outbox;
use crate::ipc::types::{AppState, Request, Session};
use crate::wizard::controller::WizardController;
use crate::wizard::model::StepData;
use crate::wizard::WizardStep;

pub fn state_json(session: &Session) -> Value {
    let c = &session.controller;
    json!({
        "sessionKey": c.session_key(),
        "step": c.step(),
        "title": c.step().title(),
        "completedSteps": c.completed_steps(),
        "submitting": c.is_submitting(),
        "progress": progress_json(c.step(), &session.form),
        "draft": c.draft(),
    })
}

fn handle_wizard_load(state: &mut AppState, req: &Request) -> Value {
    let key = session_key(state, req);
    let start = match step_param(req, "step") {
        Ok(s) => s.unwrap_or(WizardStep::Registration),
        Err(resp) => return resp,
    };
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let controller = match WizardController::load_draft(store, &key, start) {
        Ok(c) => c,
        Err(e) => return err(&req.id, "persistence_failed", e.to_string(), None),
    };
    let previously_completed = match store.completed(&key) {
        Ok(done) => done.map(|d| d.completed_at),
        Err(e) => return err(&req.id, "persistence_failed", e.to_string(), None),
    };
    info!(session_key = %key, step = %controller.step(), "session loaded");

    let session = Session {
        form: controller.draft().clone(),
        controller,
    };
    let mut result = state_json(&session);
    result["previouslyCompletedAt"] = json!(previously_completed);
    state.session = Some(session);
    ok(&req.id, result)
}

fn handle_wizard_state(state: &mut AppState, req: &Request) -> Value {
    let Some(session) = state.session.as_ref() else {
        return err(&req.id, "no_session", "load a wizard session first", None);
    };
    ok(&req.id, state_json(session))
}

fn handle_wizard_submit(state: &mut AppState, req: &Request) -> Value {
    let step = match step_param(req, "step") {
        Ok(Some(s)) => s,
        Ok(None) => return err(&req.id, "bad_params", "missing params.step", None),
        Err(resp) => return resp,
    };
    let Some(store) = state.store.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(session) = state.session.as_mut() else {
        return err(&req.id, "no_session", "load a wizard session first", None);
    };

    // Without explicit data the working form's section is submitted.
    let data = match req.params.get("data") {
        Some(v) if !v.is_null() => match StepData::from_json(step, v.clone()) {
            Ok(d) => d,
            Err(e) => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("invalid data for {step}: {e}"),
                    None,
                )
            }
        },
        _ => match StepData::from_draft(step, &session.form) {
            Some(d) => d,
            None => return err(&req.id, "bad_params", "the complete step takes no data", None),
        },
    };

    let mut outbox = Outbox::default();
    let result = {
        let mut c = outbox.collaborators(store);
        session.controller.submit_step(&mut c, step, data)
    };

    match result {
        Ok(next) => {
            if next == WizardStep::Complete {
                session.form = session.controller.draft().clone();
            } else if let Some(saved) = StepData::from_draft(step, session.controller.draft()) {
                saved.apply_to(&mut session.form);
            }
            ok(
                &req.id,
                json!({
                    "step": next,
                    "title": next.title(),
                    "completedSteps": session.controller.completed_steps(),
                    "progress": progress_json(next, &session.form),
                    "navigation": outbox.navigation_json(),
                    "notifications": outbox.notifications_json(),
                }),
            )
        }
        Err(e) => {
            warn!(step = %step, code = e.code(), "submit refused");
            let mut details = Map::new();
            details.insert("notifications".into(), outbox.notifications_json());
            submit_err(&req.id, &e, details)
        }
    }
}

fn handle_wizard_back(state: &mut AppState, req: &Request) -> Value {
    let Some(session) = state.session.as_mut() else {
        return err(&req.id, "no_session", "load a wizard session first", None);
    };
    let mut outbox = Outbox::default();
    let step = session.controller.go_back(&mut outbox.navigation);
    ok(
        &req.id,
        json!({
            "step": step,
            "title": step.title(),
            "progress": progress_json(step, &session.form),
            "navigation": outbox.navigation_json(),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "wizard.load" => Some(handle_wizard_load(state, req)),
        "wizard.state" => Some(handle_wizard_state(state, req)),
        "wizard.submit" => Some(handle_wizard_submit(state, req)),
        "wizard.back" => Some(handle_wizard_back(state, req)),
        _ => None,
    }
}
