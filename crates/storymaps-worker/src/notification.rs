//! Notifications
//!
//! The notification payload model, the default-merge rules shared by
//! push events and trigger messages, and the display surface.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::config::WorkerConfig;

/// Default notification title
pub const DEFAULT_TITLE: &str = "StoryMaps";
/// Default notification body
pub const DEFAULT_BODY: &str = "You have a new notification!";
/// Default notification tag; notifications sharing a tag replace each other
pub const DEFAULT_TAG: &str = "storymaps-notification";

/// Epoch milliseconds
pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Action button on a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Click-routing payload carried by a notification. `url` is the sole
/// field consumed on click.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationData {
    pub url: String,
    pub timestamp: u64,
}

/// A fully-resolved notification ready for display
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    pub require_interaction: bool,
    pub actions: Vec<NotificationAction>,
    pub data: NotificationData,
}

/// Partial notification fields as they arrive in a push payload or a
/// trigger message; merged over the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPatch {
    pub title: Option<String>,
    pub body: Option<String>,
    pub icon: Option<String>,
    pub badge: Option<String>,
    pub tag: Option<String>,
    pub require_interaction: Option<bool>,
    pub actions: Option<Vec<NotificationAction>>,
    pub data: Option<DataPatch>,
}

/// Partial click-routing data
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataPatch {
    pub url: Option<String>,
    pub timestamp: Option<u64>,
}

impl NotificationRequest {
    /// The documented defaults for this worker build
    pub fn defaults(config: &WorkerConfig) -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            body: DEFAULT_BODY.to_string(),
            icon: config.icon_path(),
            badge: config.icon_path(),
            tag: DEFAULT_TAG.to_string(),
            require_interaction: false,
            actions: vec![
                NotificationAction {
                    action: "view".to_string(),
                    title: "View".to_string(),
                    icon: Some(config.icon_path()),
                },
                NotificationAction {
                    action: "dismiss".to_string(),
                    title: "Dismiss".to_string(),
                    icon: None,
                },
            ],
            data: NotificationData {
                url: config.app_root(),
                timestamp: now_ms(),
            },
        }
    }

    /// Merge patch fields over this request
    pub fn apply(mut self, patch: NotificationPatch) -> Self {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(body) = patch.body {
            self.body = body;
        }
        if let Some(icon) = patch.icon {
            self.icon = icon;
        }
        if let Some(badge) = patch.badge {
            self.badge = badge;
        }
        if let Some(tag) = patch.tag {
            self.tag = tag;
        }
        if let Some(require_interaction) = patch.require_interaction {
            self.require_interaction = require_interaction;
        }
        if let Some(actions) = patch.actions {
            self.actions = actions;
        }
        if let Some(data) = patch.data {
            if let Some(url) = data.url {
                self.data.url = url;
            }
            if let Some(timestamp) = data.timestamp {
                self.data.timestamp = timestamp;
            }
        }
        self
    }

    /// Build a notification from a push payload: JSON fields merge over
    /// the defaults; unparseable payloads fall back to the raw text as
    /// the body.
    pub fn from_push(payload: Option<&[u8]>, config: &WorkerConfig) -> Self {
        let defaults = Self::defaults(config);
        let Some(raw) = payload else {
            return defaults;
        };
        match serde_json::from_slice::<NotificationPatch>(raw) {
            Ok(patch) => defaults.apply(patch),
            Err(e) => {
                log::warn!("Failed to parse push data: {}", e);
                let text = String::from_utf8_lossy(raw);
                let mut request = defaults;
                if !text.trim().is_empty() {
                    request.body = text.into_owned();
                }
                request
            }
        }
    }

    /// Build a notification from a trigger-message patch; same merge
    /// rule as push.
    pub fn from_patch(patch: NotificationPatch, config: &WorkerConfig) -> Self {
        Self::defaults(config).apply(patch)
    }
}

/// Notification display error
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification display failed: {0}")]
    DisplayFailed(String),

    #[error("notification permission not granted")]
    PermissionDenied,
}

/// The platform's notification-display primitive
pub trait NotificationSink: Send + Sync {
    /// Display a notification, returning its handle
    fn show(&self, request: &NotificationRequest) -> Result<u64, NotificationError>;
    /// Close a displayed notification
    fn close(&self, id: u64) -> bool;
}

/// A displayed notification
#[derive(Debug, Clone)]
pub struct DisplayedNotification {
    pub id: u64,
    pub request: NotificationRequest,
    pub shown_at: u64,
}

/// In-process notification center. Tracks active notifications,
/// replaces same-tag ones, and optionally forwards to the system tray.
#[derive(Default)]
pub struct NotificationCenter {
    active: Mutex<HashMap<u64, DisplayedNotification>>,
    next_id: AtomicU64,
    system_display: bool,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            ..Self::default()
        }
    }

    /// Also forward notifications to the system tray
    pub fn with_system_display(mut self) -> Self {
        self.system_display = true;
        self
    }

    /// Currently displayed notifications
    pub fn active(&self) -> Vec<DisplayedNotification> {
        self.active.lock().unwrap().values().cloned().collect()
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().unwrap().len()
    }

    pub fn get(&self, id: u64) -> Option<DisplayedNotification> {
        self.active.lock().unwrap().get(&id).cloned()
    }

    /// Active notifications carrying the given tag
    pub fn by_tag(&self, tag: &str) -> Vec<DisplayedNotification> {
        self.active
            .lock()
            .unwrap()
            .values()
            .filter(|n| n.request.tag == tag)
            .cloned()
            .collect()
    }

    #[cfg(target_os = "linux")]
    fn show_system(&self, request: &NotificationRequest) {
        use std::process::Command;

        let mut cmd = Command::new("notify-send");
        cmd.arg(&request.title).arg(&request.body);
        if !request.icon.is_empty() {
            cmd.args(["-i", &request.icon]);
        }
        let _ = cmd.spawn();
    }

    #[cfg(not(target_os = "linux"))]
    fn show_system(&self, _request: &NotificationRequest) {}
}

impl NotificationSink for NotificationCenter {
    fn show(&self, request: &NotificationRequest) -> Result<u64, NotificationError> {
        let mut active = self.active.lock().unwrap();
        // A new notification replaces any active one with the same tag
        active.retain(|_, n| n.request.tag != request.tag);

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        active.insert(
            id,
            DisplayedNotification {
                id,
                request: request.clone(),
                shown_at: now_ms(),
            },
        );
        drop(active);

        if self.system_display {
            self.show_system(request);
        }
        log::debug!("Displayed notification {} ({})", id, request.tag);
        Ok(id)
    }

    fn close(&self, id: u64) -> bool {
        let removed = self.active.lock().unwrap().remove(&id).is_some();
        if removed {
            log::debug!("Closed notification {}", id);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> WorkerConfig {
        WorkerConfig::from_location("https://app.test/service-worker.js").unwrap()
    }

    #[test]
    fn body_only_payload_keeps_defaults() {
        let request = NotificationRequest::from_push(Some(br#"{"body":"hello"}"#), &config());

        assert_eq!(request.body, "hello");
        assert_eq!(request.title, DEFAULT_TITLE);
        assert_eq!(request.tag, DEFAULT_TAG);
        assert_eq!(request.icon, "/icon-192.png");
        assert_eq!(request.badge, "/icon-192.png");
        assert!(!request.require_interaction);
        assert_eq!(request.actions.len(), 2);
        assert_eq!(request.actions[0].action, "view");
        assert_eq!(request.actions[1].action, "dismiss");
        assert_eq!(request.data.url, "/");
    }

    #[test]
    fn empty_payload_is_all_defaults() {
        let request = NotificationRequest::from_push(None, &config());
        assert_eq!(request.title, DEFAULT_TITLE);
        assert_eq!(request.body, DEFAULT_BODY);
    }

    #[test]
    fn unparseable_payload_becomes_body() {
        let request = NotificationRequest::from_push(Some(b"story update!"), &config());
        assert_eq!(request.body, "story update!");
        assert_eq!(request.title, DEFAULT_TITLE);
    }

    #[test]
    fn full_payload_overrides_everything() {
        let payload = br#"{
            "title": "New Story",
            "body": "Alice shared a story",
            "tag": "story-7",
            "requireInteraction": true,
            "data": {"url": "/detail/7"}
        }"#;
        let request = NotificationRequest::from_push(Some(payload), &config());

        assert_eq!(request.title, "New Story");
        assert_eq!(request.body, "Alice shared a story");
        assert_eq!(request.tag, "story-7");
        assert!(request.require_interaction);
        assert_eq!(request.data.url, "/detail/7");
        // Untouched fields keep defaults
        assert_eq!(request.icon, "/icon-192.png");
    }

    #[test]
    fn base_path_flows_into_defaults() {
        let config =
            WorkerConfig::from_location("https://user.github.io/storymaps/service-worker.js")
                .unwrap();
        let request = NotificationRequest::defaults(&config);
        assert_eq!(request.icon, "/storymaps/icon-192.png");
        assert_eq!(request.data.url, "/storymaps/");
    }

    #[test]
    fn center_replaces_same_tag() {
        let center = NotificationCenter::new();
        let first = NotificationRequest::defaults(&config());
        let second = NotificationRequest::defaults(&config());

        center.show(&first).unwrap();
        center.show(&second).unwrap();

        assert_eq!(center.active_count(), 1);
        assert_eq!(center.by_tag(DEFAULT_TAG).len(), 1);
    }

    #[test]
    fn center_keeps_distinct_tags() {
        let center = NotificationCenter::new();
        let mut one = NotificationRequest::defaults(&config());
        one.tag = "story-1".to_string();
        let mut two = NotificationRequest::defaults(&config());
        two.tag = "story-2".to_string();

        let id = center.show(&one).unwrap();
        center.show(&two).unwrap();

        assert_eq!(center.active_count(), 2);
        assert!(center.close(id));
        assert_eq!(center.active_count(), 1);
        assert!(!center.close(id));
    }
}
