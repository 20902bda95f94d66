use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

/// How long a banner stays fully visible before it starts fading.
pub const VISIBLE_MS: i64 = 4700;
/// Fade-out duration; the banner is removed once it elapses.
pub const FADE_MS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[allow(dead_code)]
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Visible,
    Fading,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    pub id: Uuid,
    pub message: String,
    pub severity: Severity,
    pub shown_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Banner {
    pub fn phase(&self, now: DateTime<Utc>) -> Option<Phase> {
        if now >= self.expires_at {
            None
        } else if now >= self.expires_at - Duration::milliseconds(FADE_MS) {
            Some(Phase::Fading)
        } else {
            Some(Phase::Visible)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BannerView<'a> {
    #[serde(flatten)]
    pub banner: &'a Banner,
    pub phase: Phase,
}

/// Stack of transient notifications, newest first.
#[derive(Debug, Default)]
pub struct FeedbackBus {
    banners: Vec<Banner>,
}

impl FeedbackBus {
    pub fn show_alert(&mut self, message: impl Into<String>, severity: Severity) -> &Banner {
        self.show_alert_at(message, severity, Utc::now())
    }

    pub fn show_alert_at(
        &mut self,
        message: impl Into<String>,
        severity: Severity,
        now: DateTime<Utc>,
    ) -> &Banner {
        let banner = Banner {
            id: Uuid::new_v4(),
            message: message.into(),
            severity,
            shown_at: now,
            expires_at: now + Duration::milliseconds(VISIBLE_MS + FADE_MS),
        };
        tracing::debug!(severity = ?banner.severity, message = %banner.message, "alert");
        self.banners.insert(0, banner);
        &self.banners[0]
    }

    /// Drops every banner whose lifetime has elapsed. Returns how many went.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.banners.len();
        self.banners.retain(|b| b.expires_at > now);
        before - self.banners.len()
    }

    pub fn visible(&self, now: DateTime<Utc>) -> Vec<BannerView<'_>> {
        self.banners
            .iter()
            .filter_map(|b| b.phase(now).map(|phase| BannerView { banner: b, phase }))
            .collect()
    }

    pub fn banners(&self) -> &[Banner] {
        &self.banners
    }
}
