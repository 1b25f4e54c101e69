//! StoryMaps Push
//!
//! The foreground half of the offline/push subsystem: capability
//! detection, push subscription lifecycle, the notification permission
//! banner, and service worker registration bootstrap.

/// Capability detection and permission platform surface
pub mod support;
/// Opaque key-value persistence boundary
pub mod store;
/// Application server key decoding
pub mod keys;
/// Push subscription records and the platform subscription surface
pub mod subscription;
/// The push manager: init, permission, subscribe, status
pub mod manager;
/// Notification permission banner state machine
pub mod banner;
/// Service worker registration bootstrap
pub mod registrar;

pub use banner::{EnableOutcome, NotificationPermissionBanner};
pub use keys::decode_server_key;
pub use manager::{PushManager, StoryRef, SubscriptionStatus};
pub use registrar::{candidate_worker_paths, register_worker, RegistrarCallbacks};
pub use store::{KeyValueStore, MemoryStore};
pub use subscription::{
    LocalPushService, PushService, PushSubscriptionRecord, SubscribeOptions, SubscriptionKeys,
};
pub use support::{Environment, PermissionPrompt, PermissionState, StaticPrompt};

/// Foreground push error. Message wording distinguishes the failure
/// classes the UI layer presents differently.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("push notifications are not supported in this browser")]
    NotSupported,

    #[error("notification permission was denied; enable notifications in your browser settings")]
    PermissionDenied,

    #[error("notification permission was not granted")]
    PermissionDismissed,

    #[error("subscription was aborted: {0}")]
    Aborted(String),

    #[error("invalid application server key: {0}")]
    InvalidKey(String),

    #[error("could not register service worker at any path")]
    RegistrationFailed,

    #[error("push subscription failed: {0}")]
    SubscribeFailed(String),
}
