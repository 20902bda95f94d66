use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use chrono::Utc;
use serde_json::json;

fn handle_alerts_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({ "alerts": state.bus.visible(Utc::now()) }),
    )
}

fn handle_alerts_dismiss_expired(state: &mut AppState, req: &Request) -> serde_json::Value {
    let removed = state.bus.sweep(Utc::now());
    ok(
        &req.id,
        json!({ "removed": removed, "remaining": state.bus.banners().len() }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "alerts.list" => Some(handle_alerts_list(state, req)),
        "alerts.dismissExpired" => Some(handle_alerts_dismiss_expired(state, req)),
        _ => None,
    }
}
