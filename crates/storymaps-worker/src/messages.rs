//! Page-to-worker message protocol
//!
//! Messages arrive as `{type, data?}` JSON. The type tags form a closed
//! set; anything else lands in the explicit unknown branch instead of
//! crashing the worker.

use std::sync::mpsc;
use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;

use crate::notification::NotificationPatch;

/// A message posted by a foreground page
#[derive(Debug)]
pub enum WorkerMessage {
    /// Force a waiting worker to activate immediately
    SkipWaiting,
    /// Reply with the current cache version
    GetVersion,
    /// Display a notification locally, without a push event
    TriggerNotification(NotificationPatch),
    /// Reply with worker self-diagnostics
    DebugInfo,
    /// Unrecognized type tag; logged and ignored
    Unknown(String),
}

impl WorkerMessage {
    /// Parse a `{type, data?}` message. Malformed `data` degrades to an
    /// empty patch rather than failing the dispatch.
    pub fn parse(value: &Value) -> Self {
        let tag = value.get("type").and_then(Value::as_str).unwrap_or_default();
        match tag {
            "SKIP_WAITING" => WorkerMessage::SkipWaiting,
            "GET_VERSION" => WorkerMessage::GetVersion,
            "TRIGGER_NOTIFICATION" => {
                let patch = match value.get("data") {
                    Some(data) => serde_json::from_value(data.clone()).unwrap_or_else(|e| {
                        log::warn!("Malformed TRIGGER_NOTIFICATION data: {}", e);
                        NotificationPatch::default()
                    }),
                    None => NotificationPatch::default(),
                };
                WorkerMessage::TriggerNotification(patch)
            }
            "DEBUG_INFO" => WorkerMessage::DebugInfo,
            other => WorkerMessage::Unknown(other.to_string()),
        }
    }
}

/// Worker self-diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugReport {
    pub base_path: String,
    pub cache_name: String,
    pub location: String,
    pub registration: bool,
}

/// A reply sent back on the message's port
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkerReply {
    Version { version: String },
    Debug(DebugReport),
}

/// Create a single-shot reply channel. The port travels with the
/// request; the receiver stays with the caller.
pub fn reply_channel() -> (ReplyPort, ReplyReceiver) {
    let (tx, rx) = mpsc::channel();
    (
        ReplyPort {
            tx: Mutex::new(Some(tx)),
        },
        ReplyReceiver { rx },
    )
}

/// Worker-side end of a reply channel. Consuming the sender on first
/// use makes at-most-one-reply structural.
pub struct ReplyPort {
    tx: Mutex<Option<mpsc::Sender<WorkerReply>>>,
}

impl ReplyPort {
    /// Deliver the reply. Returns false if a reply was already sent or
    /// the receiver is gone.
    pub fn send(&self, reply: WorkerReply) -> bool {
        match self.tx.lock().unwrap().take() {
            Some(tx) => tx.send(reply).is_ok(),
            None => {
                log::warn!("Reply port already used; dropping {:?}", reply);
                false
            }
        }
    }
}

/// Page-side end of a reply channel
pub struct ReplyReceiver {
    rx: mpsc::Receiver<WorkerReply>,
}

impl ReplyReceiver {
    /// Take the reply if one has arrived
    pub fn take(&self) -> Option<WorkerReply> {
        self.rx.try_recv().ok()
    }
}
