use serde_json::json;

use crate::gateway::GatewayError;
use crate::sync::SyncError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

pub fn sync_err(id: &str, e: &SyncError) -> serde_json::Value {
    match e {
        SyncError::ComponentAbsent(c) => err(
            id,
            "component_absent",
            e.to_string(),
            Some(json!({ "component": c })),
        ),
        SyncError::Gateway(GatewayError::Malformed { status, .. }) => err(
            id,
            "malformed_response",
            e.to_string(),
            Some(json!({ "status": status })),
        ),
        SyncError::Payload(_) => err(id, "malformed_response", e.to_string(), None),
        SyncError::Gateway(_) => err(id, "fetch_failed", e.to_string(), None),
    }
}

pub fn store_err(id: &str, e: &anyhow::Error) -> serde_json::Value {
    err(id, "store_failed", format!("{e:#}"), None)
}
