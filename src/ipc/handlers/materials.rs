use crate::ipc::error::{err, ok, sync_err};
use crate::ipc::helpers::{confirmed, control, filter_pairs, id_param, text_param, with_snapshot};
use crate::ipc::types::{AppState, Request};
use crate::sync::{MaterialSync, SelectedFile, UploadForm};
use serde_json::json;
use std::path::Path;

fn handle_materials_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    let filters = filter_pairs(req, "filters");
    let pairs: Vec<(&str, &str)> = filters
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();

    let result = MaterialSync::new(&state.gateway, &mut state.views, &mut state.bus)
        .load_materials(&pairs);
    match result {
        Ok(count) => ok(&req.id, with_snapshot(state, json!({ "count": count }))),
        Err(e) => sync_err(&req.id, &e),
    }
}

fn handle_materials_categories(state: &mut AppState, req: &Request) -> serde_json::Value {
    let result =
        MaterialSync::new(&state.gateway, &mut state.views, &mut state.bus).load_categories();
    match result {
        Ok(count) => ok(&req.id, with_snapshot(state, json!({ "count": count }))),
        Err(e) => sync_err(&req.id, &e),
    }
}

fn read_selected_file(path: &Path) -> anyhow::Result<SelectedFile> {
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    Ok(SelectedFile { name, bytes })
}

fn handle_materials_upload(state: &mut AppState, req: &Request) -> serde_json::Value {
    let mut form = UploadForm::default();
    if let Some(fields) = req.params.get("fields").and_then(|v| v.as_object()) {
        form.fields = fields.clone();
    }
    if let Some(p) = req.params.get("filePath").and_then(|v| v.as_str()) {
        match read_selected_file(Path::new(p)) {
            Ok(f) => form.file = Some(f),
            Err(e) => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("failed to read file: {e}"),
                    Some(json!({ "filePath": p })),
                )
            }
        }
    }
    let teacher_id = text_param(req, "teacherId");

    let busy = control(&mut state.controls, req);
    let result = MaterialSync::new(&state.gateway, &mut state.views, &mut state.bus)
        .upload_material(&mut form, &teacher_id, busy);
    match result {
        Ok(mutation) => {
            let mut v = json!(mutation);
            v["formReset"] = json!(form.is_empty());
            ok(&req.id, with_snapshot(state, v))
        }
        Err(e) => sync_err(&req.id, &e),
    }
}

fn handle_materials_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(id) = id_param(req, "id") else {
        return err(&req.id, "bad_params", "missing id", None);
    };
    let teacher_id = text_param(req, "teacherId");
    let mut decision = |_: &str| confirmed(req);

    let busy = control(&mut state.controls, req);
    let result = MaterialSync::new(&state.gateway, &mut state.views, &mut state.bus)
        .delete_material(id, &teacher_id, &mut decision, busy);
    match result {
        Ok(mutation) => ok(&req.id, with_snapshot(state, json!(mutation))),
        Err(e) => sync_err(&req.id, &e),
    }
}

fn handle_dashboard_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    let teacher_id = text_param(req, "teacherId");
    let result =
        MaterialSync::new(&state.gateway, &mut state.views, &mut state.bus).load_dashboard(&teacher_id);
    match result {
        Ok(summary) => ok(&req.id, with_snapshot(state, json!({ "summary": summary }))),
        Err(e) => sync_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "materials.load" => Some(handle_materials_load(state, req)),
        "materials.categories" => Some(handle_materials_categories(state, req)),
        "materials.upload" => Some(handle_materials_upload(state, req)),
        "materials.delete" => Some(handle_materials_delete(state, req)),
        "dashboard.load" => Some(handle_dashboard_load(state, req)),
        _ => None,
    }
}
