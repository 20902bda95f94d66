use std::collections::HashMap;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::gateway::{BusyControl, BusyIndicator};
use crate::ipc::types::{AppState, Request};

pub fn str_param<'a>(req: &'a Request, key: &str) -> Option<&'a str> {
    req.params.get(key).and_then(|v| v.as_str())
}

/// Ids arrive as numbers from some hosts and as strings from form inputs.
pub fn id_param(req: &Request, key: &str) -> Option<i64> {
    match req.params.get(key)? {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn text_param(req: &Request, key: &str) -> String {
    match req.params.get(key) {
        Some(serde_json::Value::String(s)) => s.trim().to_string(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

pub fn parse_param<T: DeserializeOwned>(req: &Request, key: &str) -> Result<T, String> {
    let Some(v) = req.params.get(key) else {
        return Err(format!("missing params.{key}"));
    };
    serde_json::from_value(v.clone()).map_err(|e| format!("invalid params.{key}: {e}"))
}

pub fn confirmed(req: &Request) -> bool {
    req.params
        .get("confirmed")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

/// Filter pairs in the order the host sent them; non-string scalars are
/// stringified, everything else is skipped.
pub fn filter_pairs(req: &Request, key: &str) -> Vec<(String, String)> {
    let Some(obj) = req.params.get(key).and_then(|v| v.as_object()) else {
        return Vec::new();
    };
    obj.iter()
        .filter_map(|(k, v)| match v {
            serde_json::Value::String(s) => Some((k.clone(), s.clone())),
            serde_json::Value::Number(n) => Some((k.clone(), n.to_string())),
            serde_json::Value::Bool(b) => Some((k.clone(), b.to_string())),
            _ => None,
        })
        .collect()
}

pub fn control<'a>(
    controls: &'a mut HashMap<String, BusyControl>,
    req: &Request,
) -> Option<&'a mut dyn BusyIndicator> {
    let name = str_param(req, "control")?;
    controls
        .get_mut(name)
        .map(|c| c as &mut dyn BusyIndicator)
}

/// Current render state attached to every view-touching reply.
pub fn snapshot(state: &AppState) -> serde_json::Value {
    json!({
        "views": state.views,
        "alerts": state.bus.visible(Utc::now()),
        "controls": state.controls,
    })
}

pub fn with_snapshot(state: &AppState, mut result: serde_json::Value) -> serde_json::Value {
    if let (Some(obj), serde_json::Value::Object(snap)) = (result.as_object_mut(), snapshot(state))
    {
        obj.extend(snap);
    }
    result
}
