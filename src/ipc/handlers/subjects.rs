use crate::ipc::error::{err, ok, sync_err};
use crate::ipc::helpers::{confirmed, control, id_param, parse_param, text_param, with_snapshot};
use crate::ipc::types::{AppState, Request};
use crate::models::NewSubject;
use crate::sync::MaterialSync;
use serde_json::json;

fn handle_subjects_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    let teacher_id = text_param(req, "teacherId");
    if teacher_id.is_empty() {
        return err(&req.id, "bad_params", "missing teacherId", None);
    }
    let result =
        MaterialSync::new(&state.gateway, &mut state.views, &mut state.bus).load_subjects(&teacher_id);
    match result {
        Ok(count) => ok(&req.id, with_snapshot(state, json!({ "count": count }))),
        Err(e) => sync_err(&req.id, &e),
    }
}

fn handle_subjects_load_all(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result =
        MaterialSync::new(&state.gateway, &mut state.views, &mut state.bus).load_all_subjects();
    match result {
        Ok(count) => ok(&req.id, with_snapshot(state, json!({ "count": count }))),
        Err(e) => sync_err(&req.id, &e),
    }
}

fn handle_subjects_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let subject: NewSubject = match parse_param(req, "subject") {
        Ok(s) => s,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    let busy = control(&mut state.controls, req);
    let result = MaterialSync::new(&state.gateway, &mut state.views, &mut state.bus)
        .add_subject(&subject, busy);
    match result {
        Ok(mutation) => ok(&req.id, with_snapshot(state, json!(mutation))),
        Err(e) => sync_err(&req.id, &e),
    }
}

fn handle_subjects_assign(state: &mut AppState, req: &Request) -> serde_json::Value {
    let subject_id = text_param(req, "subjectId");
    let teacher_id = text_param(req, "teacherId");
    let mut decision = |_: &str| confirmed(req);

    let busy = control(&mut state.controls, req);
    let result = MaterialSync::new(&state.gateway, &mut state.views, &mut state.bus)
        .assign_subject(&subject_id, &teacher_id, &mut decision, busy);
    match result {
        Ok(mutation) => ok(&req.id, with_snapshot(state, json!(mutation))),
        Err(e) => sync_err(&req.id, &e),
    }
}

fn handle_subjects_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(id) = id_param(req, "id") else {
        return err(&req.id, "bad_params", "missing id", None);
    };
    let teacher_id = text_param(req, "teacherId");
    let mut decision = |_: &str| confirmed(req);

    let busy = control(&mut state.controls, req);
    let result = MaterialSync::new(&state.gateway, &mut state.views, &mut state.bus)
        .delete_subject(id, &teacher_id, &mut decision, busy);
    match result {
        Ok(mutation) => ok(&req.id, with_snapshot(state, json!(mutation))),
        Err(e) => sync_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.load" => Some(handle_subjects_load(state, req)),
        "subjects.loadAll" => Some(handle_subjects_load_all(state, req)),
        "subjects.add" => Some(handle_subjects_add(state, req)),
        "subjects.assign" => Some(handle_subjects_assign(state, req)),
        "subjects.delete" => Some(handle_subjects_delete(state, req)),
        _ => None,
    }
}
