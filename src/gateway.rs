//! Outbound request wrapper.
//!
//! `post_json` never fails: transport and HTTP errors come back as a
//! [`Reply`] with `ok == false`. `get_json` expects a well-formed JSON body and
//! propagates anything else as a [`GatewayError`].

use std::time::Duration;

use reqwest::Url;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

impl From<reqwest::Error> for TransportError {
    fn from(value: reqwest::Error) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid origin {origin:?}: {message}")]
    BadOrigin { origin: String, message: String },

    #[error("invalid endpoint {endpoint:?}: {message}")]
    BadEndpoint { endpoint: String, message: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("malformed response (status {status}): {message}")]
    Malformed { status: u16, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub body: Option<serde_json::Value>,
    pub bearer: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

pub trait Transport {
    fn send(&self, request: &HttpRequest) -> Result<HttpReply, TransportError>;
}

pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        // Requests run to completion or transport failure; no deadline.
        let client = reqwest::blocking::Client::builder()
            .timeout(None::<Duration>)
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpReply, TransportError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(request.url.clone()),
            Method::Post => self.client.post(request.url.clone()),
        };
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        let resp = builder.send()?;
        let status = resp.status().as_u16();
        let body = resp.text()?;
        Ok(HttpReply { status, body })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Body {
    Json(serde_json::Value),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub ok: bool,
    pub status: u16,
    pub body: Body,
}

impl Reply {
    fn from_http(raw: HttpReply) -> Self {
        let body = match serde_json::from_str(&raw.body) {
            Ok(v) => Body::Json(v),
            Err(_) => Body::Text(raw.body),
        };
        Self {
            ok: (200..300).contains(&raw.status),
            status: raw.status,
            body,
        }
    }

    fn transport_failure(message: String) -> Self {
        Self {
            ok: false,
            status: 0,
            body: Body::Text(message),
        }
    }

    pub fn json(&self) -> Option<&serde_json::Value> {
        match &self.body {
            Body::Json(v) => Some(v),
            Body::Text(_) => None,
        }
    }

    /// 2xx and a body carrying `"success": true`.
    pub fn succeeded(&self) -> bool {
        self.ok
            && self
                .json()
                .and_then(|j| j.get("success"))
                .and_then(|v| v.as_bool())
                == Some(true)
    }

    /// Server-provided `message`, if the body had one.
    pub fn message(&self) -> Option<&str> {
        self.json()
            .and_then(|j| j.get("message"))
            .and_then(|v| v.as_str())
    }
}

pub trait BusyIndicator {
    fn set_busy(&mut self, busy: bool);
}

/// A host control (typically a submit button) that shows a loading state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusyControl {
    pub label: String,
    pub busy: bool,
    #[serde(skip)]
    saved_label: Option<String>,
}

impl BusyControl {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }
}

impl BusyIndicator for BusyControl {
    fn set_busy(&mut self, busy: bool) {
        if self.busy == busy {
            return;
        }
        self.busy = busy;
        if busy {
            self.saved_label = Some(std::mem::take(&mut self.label));
        } else if let Some(label) = self.saved_label.take() {
            self.label = label;
        }
    }
}

struct BusyGuard<'a> {
    indicator: Option<&'a mut dyn BusyIndicator>,
}

impl<'a> BusyGuard<'a> {
    fn engage(mut indicator: Option<&'a mut dyn BusyIndicator>) -> Self {
        if let Some(ind) = indicator.as_deref_mut() {
            ind.set_busy(true);
        }
        Self { indicator }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if let Some(ind) = self.indicator.as_deref_mut() {
            ind.set_busy(false);
        }
    }
}

pub struct RequestGateway {
    origin: Url,
    transport: Box<dyn Transport>,
    token: Option<String>,
}

impl RequestGateway {
    pub fn new(origin: &str, transport: Box<dyn Transport>) -> Result<Self, GatewayError> {
        let origin = Url::parse(origin).map_err(|e| GatewayError::BadOrigin {
            origin: origin.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            origin,
            transport,
            token: None,
        })
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Resolves `path` against the origin and appends every pair whose value
    /// is non-empty, URL-encoded, in the given order.
    pub fn url_for(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, GatewayError> {
        let mut url = self
            .origin
            .join(path)
            .map_err(|e| GatewayError::BadEndpoint {
                endpoint: path.to_string(),
                message: e.to_string(),
            })?;
        let pairs: Vec<_> = query.iter().filter(|(_, v)| !v.is_empty()).collect();
        if !pairs.is_empty() {
            let mut qp = url.query_pairs_mut();
            for (k, v) in pairs {
                qp.append_pair(k, v);
            }
        }
        Ok(url)
    }

    pub fn post_json(
        &self,
        path: &str,
        payload: &serde_json::Value,
        busy: Option<&mut dyn BusyIndicator>,
    ) -> Reply {
        let _guard = BusyGuard::engage(busy);
        let url = match self.url_for(path, &[]) {
            Ok(u) => u,
            Err(e) => return Reply::transport_failure(e.to_string()),
        };
        let request = HttpRequest {
            method: Method::Post,
            url,
            body: Some(payload.clone()),
            bearer: self.token.clone(),
        };
        match self.transport.send(&request) {
            Ok(raw) => {
                debug!(path, status = raw.status, "post completed");
                Reply::from_http(raw)
            }
            Err(e) => {
                warn!(path, error = %e, "post failed");
                Reply::transport_failure(e.to_string())
            }
        }
    }

    pub fn get_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
        busy: Option<&mut dyn BusyIndicator>,
    ) -> Result<serde_json::Value, GatewayError> {
        let _guard = BusyGuard::engage(busy);
        let request = HttpRequest {
            method: Method::Get,
            url: self.url_for(path, query)?,
            body: None,
            bearer: self.token.clone(),
        };
        let raw = self.transport.send(&request).inspect_err(|e| {
            warn!(path, error = %e, "get failed");
        })?;
        debug!(path, status = raw.status, "get completed");
        serde_json::from_str(&raw.body).map_err(|e| GatewayError::Malformed {
            status: raw.status,
            message: e.to_string(),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedTransport;
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct LoggingControl {
        log: Rc<RefCell<Vec<String>>>,
        inner: BusyControl,
    }

    impl BusyIndicator for LoggingControl {
        fn set_busy(&mut self, busy: bool) {
            let before = self.inner.busy;
            self.inner.set_busy(busy);
            if before != self.inner.busy {
                self.log.borrow_mut().push(format!("busy={busy}"));
            }
        }
    }

    struct LoggingTransport {
        log: Rc<RefCell<Vec<String>>>,
        inner: ScriptedTransport,
    }

    impl Transport for LoggingTransport {
        fn send(&self, request: &HttpRequest) -> Result<HttpReply, TransportError> {
            self.log.borrow_mut().push("send".into());
            self.inner.send(request)
        }
    }

    fn logged() -> (Rc<RefCell<Vec<String>>>, ScriptedTransport, RequestGateway, LoggingControl) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let script = ScriptedTransport::default();
        let gw = RequestGateway::new(
            "http://localhost:8080",
            Box::new(LoggingTransport {
                log: log.clone(),
                inner: script.clone(),
            }),
        )
        .expect("gateway");
        let control = LoggingControl {
            log: log.clone(),
            inner: BusyControl::new("Submit"),
        };
        (log, script, gw, control)
    }

    #[test]
    fn busy_wraps_call_on_success() {
        let (log, script, gw, mut control) = logged();
        script.push_json(200, json!({ "success": true }));
        let reply = gw.post_json("/api/student/validate", &json!({}), Some(&mut control));
        assert!(reply.succeeded());
        assert_eq!(*log.borrow(), vec!["busy=true", "send", "busy=false"]);
        assert_eq!(control.inner.label, "Submit");
        assert!(!control.inner.busy);
    }

    #[test]
    fn busy_cleared_once_on_transport_failure() {
        let (log, script, gw, mut control) = logged();
        script.push_failure("connection refused");
        let reply = gw.post_json("/api/student/validate", &json!({}), Some(&mut control));
        assert!(!reply.ok);
        assert_eq!(reply.status, 0);
        assert_eq!(*log.borrow(), vec!["busy=true", "send", "busy=false"]);
    }

    #[test]
    fn busy_cleared_when_get_json_faults() {
        let (log, script, gw, mut control) = logged();
        script.push_text(200, "<html>oops</html>");
        let err = gw
            .get_json("/get-materials", &[], Some(&mut control))
            .expect_err("malformed");
        assert!(matches!(err, GatewayError::Malformed { status: 200, .. }));
        assert_eq!(*log.borrow(), vec!["busy=true", "send", "busy=false"]);
    }

    #[test]
    fn busy_control_is_idempotent() {
        let mut c = BusyControl::new("Upload");
        c.set_busy(true);
        c.set_busy(true);
        assert_eq!(c.label, "");
        c.set_busy(false);
        c.set_busy(false);
        assert_eq!(c.label, "Upload");
    }

    #[test]
    fn post_falls_back_to_text_body() {
        let script = ScriptedTransport::default();
        script.push_text(500, "Internal Server Error");
        let reply = script.gateway().post_json("/delete-material", &json!({ "id": 1 }), None);
        assert!(!reply.ok);
        assert_eq!(reply.status, 500);
        assert_eq!(reply.body, Body::Text("Internal Server Error".into()));
        assert_eq!(reply.message(), None);
    }

    #[test]
    fn success_needs_flag_and_2xx() {
        let script = ScriptedTransport::default();
        script.push_json(200, json!({ "message": "Deleted" }));
        script.push_json(401, json!({ "success": true }));
        let gw = script.gateway();
        let a = gw.post_json("/x", &json!({}), None);
        let b = gw.post_json("/x", &json!({}), None);
        assert!(a.ok && !a.succeeded());
        assert_eq!(a.message(), Some("Deleted"));
        assert!(!b.ok && !b.succeeded());
    }

    #[test]
    fn get_json_returns_body_for_non_2xx() {
        let script = ScriptedTransport::default();
        script.push_json(400, json!({ "message": "Missing teacher_id" }));
        let body = script
            .gateway()
            .get_json("/api/teacher/get-subjects", &[], None)
            .expect("json body");
        assert_eq!(body["message"], "Missing teacher_id");
    }

    #[test]
    fn query_skips_empty_values_and_encodes() {
        let script = ScriptedTransport::default();
        let url = script
            .gateway()
            .url_for(
                "/get-materials",
                &[("teacher_id", "7"), ("category", ""), ("q", "a&b c")],
            )
            .expect("url");
        assert_eq!(url.path(), "/get-materials");
        assert_eq!(url.query(), Some("teacher_id=7&q=a%26b+c"));
    }

    #[test]
    fn bearer_token_is_attached() {
        let script = ScriptedTransport::default();
        script.push_json(200, json!({ "subjects": [] }));
        let mut gw = script.gateway();
        gw.set_token(Some("abc".into()));
        gw.get_json("/api/teacher/get-subjects", &[], None)
            .expect("ok");
        assert_eq!(script.seen.borrow()[0].bearer.as_deref(), Some("abc"));
    }
}
