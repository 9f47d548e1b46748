use serde_json::{json, Value};

use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::wizard::model::{Draft, StepData};
use crate::wizard::progress;
use crate::wizard::WizardStep;

pub fn str_param<'a>(req: &'a Request, key: &str) -> Option<&'a str> {
    req.params.get(key).and_then(|v| v.as_str())
}

pub fn required_str<'a>(req: &'a Request, key: &str) -> Result<&'a str, Value> {
    str_param(req, key)
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing params.{key}"), None))
}

/// Missing is `None`; present but not a non-negative integer is an error.
pub fn index_param(req: &Request, key: &str) -> Result<Option<usize>, Value> {
    match req.params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_u64().map(|n| Some(n as usize)).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                format!("params.{key} must be a non-negative integer"),
                None,
            )
        }),
    }
}

pub fn step_param(req: &Request, key: &str) -> Result<Option<WizardStep>, Value> {
    match str_param(req, key) {
        None => Ok(None),
        Some(s) => WizardStep::parse(s)
            .map(Some)
            .ok_or_else(|| err(&req.id, "bad_params", format!("unknown step: {s}"), None)),
    }
}

pub fn session_key(state: &AppState, req: &Request) -> String {
    str_param(req, "sessionKey")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(state.settings.default_session_key.as_str())
        .to_string()
}

/// Step percent plus the weighted entries behind it.
pub fn progress_json(step: WizardStep, form: &Draft) -> Value {
    let summary = progress::step_progress(step, form);
    let fields = StepData::from_draft(step, form)
        .map(|data| json!(progress::manifest_for(&data).entries()))
        .unwrap_or_else(|| json!([]));
    let mut out = json!(summary);
    out["fields"] = fields;
    out
}
