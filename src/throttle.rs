//! Client-side admission gate in front of access-code validation.
//!
//! Each `(teacher_id, program, grade_level)` bucket counts failed
//! validations. Once the count reaches `max`, submits for that bucket are
//! rejected locally without contacting the server until a successful
//! validation (or an explicit reset) puts the count back to zero.
//!
//! The counts live in one JSON object under `ek.student_attempts` in the
//! injected [`KeyValueStore`]. Every transition is written back before the
//! submit returns. The map is re-read on each submit, so two sidecars sharing
//! a workspace see each other's counts, but a read-increment-write can still
//! lose a concurrent update (last write wins).

use std::collections::BTreeMap;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::feedback::{FeedbackBus, Severity};
use crate::gateway::{BusyIndicator, Reply, RequestGateway};
use crate::store::KeyValueStore;

pub const NAMESPACE: &str = "ek";
pub const STORE_KEY: &str = "student_attempts";
pub const VALIDATE_PATH: &str = "/api/student/validate";
pub const REDIRECT_URL: &str = "/templates/student_materials.html";
pub const REDIRECT_DELAY_MS: u64 = 1000;

pub const MSG_GRANTED: &str = "Access granted! Redirecting...";
pub const MSG_BLOCKED: &str = "Access blocked after too many attempts. Please contact your teacher.";
pub const MSG_BLOCKED_NOW: &str =
    "You have been blocked after too many failed attempts. Please contact your teacher.";
pub const MSG_REQUIRED: &str = "This field is required";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AttemptKey {
    pub teacher_id: String,
    pub program: String,
    pub grade_level: String,
}

impl AttemptKey {
    pub fn new(
        teacher_id: impl Into<String>,
        program: impl Into<String>,
        grade_level: impl Into<String>,
    ) -> Self {
        Self {
            teacher_id: teacher_id.into(),
            program: program.into(),
            grade_level: grade_level.into(),
        }
    }

    /// Persisted form: a JSON array, so separators inside values cannot
    /// make two different triples collide.
    pub fn storage_key(&self) -> String {
        json!([self.teacher_id, self.program, self.grade_level]).to_string()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AccessForm {
    pub program: String,
    pub grade_level: String,
    pub semester: String,
    pub teacher_id: String,
    pub access_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

impl AccessForm {
    pub fn key(&self) -> AttemptKey {
        AttemptKey::new(
            self.teacher_id.trim(),
            self.program.trim(),
            self.grade_level.trim(),
        )
    }

    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if self.access_code.trim().is_empty() {
            errors.push(FieldError {
                field: "access_code",
                message: MSG_REQUIRED,
            });
        }
        errors
    }

    fn payload(&self) -> serde_json::Value {
        json!({
            "program": self.program,
            "grade_level": self.grade_level,
            "semester": self.semester,
            "teacher_id": self.teacher_id,
            "access_code": self.access_code,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GateState {
    Open,
    Blocked,
}

impl GateState {
    pub fn of(count: u32, max: u32) -> Self {
        if count >= max {
            Self::Blocked
        } else {
            Self::Open
        }
    }
}

/// Attempt counts keyed by [`AttemptKey::storage_key`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttemptCounts {
    counts: BTreeMap<String, u32>,
}

impl AttemptCounts {
    pub fn load(store: &dyn KeyValueStore) -> anyhow::Result<Self> {
        let Some(raw) = store
            .get(NAMESPACE, STORE_KEY)
            .context("failed to read attempt counts")?
        else {
            return Ok(Self::default());
        };
        let mut counts = BTreeMap::new();
        if let Some(obj) = raw.as_object() {
            for (k, v) in obj {
                // Anything that is not a non-negative integer is dropped.
                match v.as_u64() {
                    Some(n) => {
                        counts.insert(k.clone(), u32::try_from(n).unwrap_or(u32::MAX));
                    }
                    None => warn!(key = %k, "ignoring non-numeric attempt count"),
                }
            }
        } else {
            warn!("attempt store is not an object; starting empty");
        }
        Ok(Self { counts })
    }

    pub fn save(&self, store: &mut dyn KeyValueStore) -> anyhow::Result<()> {
        let value = serde_json::to_value(&self.counts)?;
        store
            .set(NAMESPACE, STORE_KEY, &value)
            .context("failed to write attempt counts")
    }

    pub fn count(&self, key: &AttemptKey) -> u32 {
        self.counts.get(&key.storage_key()).copied().unwrap_or(0)
    }

    pub fn set(&mut self, key: &AttemptKey, count: u32) {
        self.counts.insert(key.storage_key(), count);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Redirect {
    pub url: String,
    pub delay_ms: u64,
}

/// Next state after a validation reply. Pure; applied by [`AttemptThrottle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub next_count: u32,
    pub state: GateState,
    pub message: String,
    pub severity: Severity,
    pub redirect: Option<Redirect>,
}

pub fn decide(count: u32, max: u32, reply: &Reply) -> Decision {
    if reply.succeeded() {
        return Decision {
            next_count: 0,
            state: GateState::Open,
            message: MSG_GRANTED.to_string(),
            severity: Severity::Success,
            redirect: Some(Redirect {
                url: REDIRECT_URL.to_string(),
                delay_ms: REDIRECT_DELAY_MS,
            }),
        };
    }

    let next_count = count.saturating_add(1);
    let state = GateState::of(next_count, max);
    let message = match state {
        GateState::Blocked => MSG_BLOCKED_NOW.to_string(),
        GateState::Open => remaining_message(max - next_count),
    };
    Decision {
        next_count,
        state,
        message,
        severity: Severity::Error,
        redirect: None,
    }
}

pub fn remaining_message(remaining: u32) -> String {
    let noun = if remaining == 1 { "attempt" } else { "attempts" };
    format!("Invalid access code. {remaining} {noun} remaining.")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum Outcome {
    Invalid { errors: Vec<FieldError> },
    Blocked { count: u32 },
    Granted { redirect: Redirect },
    Denied { count: u32, remaining: u32 },
    BlockedNow { count: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptStatus {
    pub count: u32,
    pub max: u32,
    pub state: GateState,
}

pub struct AttemptThrottle {
    max: u32,
    store: Box<dyn KeyValueStore>,
}

impl AttemptThrottle {
    pub fn new(max: u32, store: Box<dyn KeyValueStore>) -> Self {
        Self { max, store }
    }

    pub fn status(&self, key: &AttemptKey) -> anyhow::Result<AttemptStatus> {
        let count = AttemptCounts::load(self.store.as_ref())?.count(key);
        Ok(AttemptStatus {
            count,
            max: self.max,
            state: GateState::of(count, self.max),
        })
    }

    /// Puts `key` back to zero. An unreadable stored map is replaced rather
    /// than reported, so a reset always leaves the store usable.
    pub fn reset(&mut self, key: &AttemptKey) -> anyhow::Result<()> {
        let mut counts = match AttemptCounts::load(self.store.as_ref()) {
            Ok(c) => c,
            Err(e) => {
                warn!("attempt store unreadable, rewriting it: {e:#}");
                AttemptCounts::default()
            }
        };
        counts.set(key, 0);
        counts.save(self.store.as_mut())?;
        info!(key = %key.storage_key(), "attempt count reset");
        Ok(())
    }

    pub fn submit(
        &mut self,
        form: &AccessForm,
        gateway: &RequestGateway,
        busy: Option<&mut dyn BusyIndicator>,
        bus: &mut FeedbackBus,
    ) -> anyhow::Result<Outcome> {
        let errors = form.validate();
        if !errors.is_empty() {
            return Ok(Outcome::Invalid { errors });
        }

        let key = form.key();
        let mut counts = AttemptCounts::load(self.store.as_ref())?;
        let count = counts.count(&key);
        if GateState::of(count, self.max) == GateState::Blocked {
            info!(key = %key.storage_key(), count, "validation suppressed for blocked key");
            bus.show_alert(MSG_BLOCKED, Severity::Error);
            return Ok(Outcome::Blocked { count });
        }

        let reply = gateway.post_json(VALIDATE_PATH, &form.payload(), busy);
        let decision = decide(count, self.max, &reply);

        counts.set(&key, decision.next_count);
        counts.save(self.store.as_mut())?;
        bus.show_alert(decision.message, decision.severity);

        let outcome = match (decision.redirect, decision.state) {
            (Some(redirect), _) => Outcome::Granted { redirect },
            (None, GateState::Blocked) => Outcome::BlockedNow {
                count: decision.next_count,
            },
            (None, GateState::Open) => Outcome::Denied {
                count: decision.next_count,
                remaining: self.max - decision.next_count,
            },
        };
        info!(key = %key.storage_key(), status = reply.status, ?outcome, "validation finished");
        Ok(outcome)
    }
}
