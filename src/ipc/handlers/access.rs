use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{control, parse_param, with_snapshot};
use crate::ipc::types::{AppState, Request};
use crate::throttle::{AccessForm, AttemptKey};
use serde_json::json;

fn handle_student_validate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let form: AccessForm = match parse_param(req, "form") {
        Ok(f) => f,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    let Some(throttle) = state.throttle.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let busy = control(&mut state.controls, req);
    match throttle.submit(&form, &state.gateway, busy, &mut state.bus) {
        Ok(outcome) => ok(&req.id, with_snapshot(state, json!(outcome))),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_attempts_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    let key: AttemptKey = match parse_param(req, "key") {
        Ok(k) => k,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    let Some(throttle) = state.throttle.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match throttle.status(&key) {
        Ok(status) => ok(&req.id, json!(status)),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_attempts_reset(state: &mut AppState, req: &Request) -> serde_json::Value {
    let key: AttemptKey = match parse_param(req, "key") {
        Ok(k) => k,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    let Some(throttle) = state.throttle.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if let Err(e) = throttle.reset(&key) {
        return store_err(&req.id, &e);
    }
    match throttle.status(&key) {
        Ok(status) => ok(&req.id, json!(status)),
        Err(e) => store_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "student.validate" => Some(handle_student_validate(state, req)),
        "attempts.status" => Some(handle_attempts_status(state, req)),
        "attempts.reset" => Some(handle_attempts_reset(state, req)),
        _ => None,
    }
}
