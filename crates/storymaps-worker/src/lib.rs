//! StoryMaps Service Worker Runtime
//!
//! The background half of the offline/push subsystem: cache lifecycle,
//! fetch interception, push notification display and click routing, and
//! the page-to-worker message protocol.

/// Worker configuration derived from the script location
pub mod config;
/// Lifecycle state machine
pub mod state;
/// Notification model, default-merge rules, and display surface
pub mod notification;
/// Open window clients as seen from the worker
pub mod clients;
/// Page-to-worker message protocol
pub mod messages;
/// The service worker itself: event handlers
pub mod worker;
/// Registration container driving worker lifecycles
pub mod registration;

pub use clients::{ClientRegistry, WindowClient};
pub use config::WorkerConfig;
pub use messages::{reply_channel, DebugReport, ReplyPort, ReplyReceiver, WorkerMessage, WorkerReply};
pub use notification::{
    DataPatch, DisplayedNotification, NotificationAction, NotificationCenter, NotificationData,
    NotificationError, NotificationPatch, NotificationRequest, NotificationSink,
};
pub use registration::{Registration, RegistrationEvent, WorkerContainer};
pub use state::WorkerState;
pub use worker::{ClickOutcome, FetchOutcome, FetchSource, NotificationClickEvent, ServiceWorker};

/// Service worker runtime error
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("invalid worker location: {0}")]
    InvalidLocation(String),

    #[error("fetch failed for {0}")]
    FetchFailed(String),

    #[error("offline and no cached fallback for {0}")]
    Offline(String),

    #[error("no service worker script at {0}")]
    ScriptNotFound(String),

    #[error("no active worker for scope {0}")]
    NoActiveWorker(String),
}
