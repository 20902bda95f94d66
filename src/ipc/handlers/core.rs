use crate::gateway::BusyControl;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{str_param, with_snapshot};
use crate::ipc::types::{AppState, Request};
use crate::views::Component;
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "origin": state.config.origin,
            "maxAttempts": state.config.max_attempts,
            "hasToken": state.gateway.has_token(),
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(path) = str_param(req, "path").map(PathBuf::from) else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match state.open_workspace(path.clone()) {
        Ok(()) => ok(&req.id, json!({ "workspacePath": path.to_string_lossy() })),
        Err(e) => err(&req.id, "db_open_failed", format!("{e:#}"), None),
    }
}

fn handle_ui_register(state: &mut AppState, req: &Request) -> serde_json::Value {
    let components: Vec<Component> = match req.params.get("components") {
        None => Vec::new(),
        Some(v) => match serde_json::from_value(v.clone()) {
            Ok(c) => c,
            Err(e) => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("invalid params.components: {e}"),
                    None,
                )
            }
        },
    };
    for c in &components {
        state.views.register(*c);
    }

    if let Some(controls) = req.params.get("controls").and_then(|v| v.as_object()) {
        for (name, label) in controls {
            let label = label.as_str().unwrap_or_default();
            state
                .controls
                .entry(name.clone())
                .or_insert_with(|| BusyControl::new(label));
        }
    }

    tracing::debug!(components = components.len(), controls = state.controls.len(), "ui registered");
    ok(&req.id, with_snapshot(state, json!({ "registered": components })))
}

fn handle_session_set_token(state: &mut AppState, req: &Request) -> serde_json::Value {
    let token = str_param(req, "token")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);
    state.gateway.set_token(token);
    ok(&req.id, json!({ "hasToken": state.gateway.has_token() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "ui.register" => Some(handle_ui_register(state, req)),
        "session.setToken" => Some(handle_session_set_token(state, req)),
        _ => None,
    }
}
