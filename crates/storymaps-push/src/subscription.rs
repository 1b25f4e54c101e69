//! Push subscriptions
//!
//! The record identifying where push messages for this browser are
//! delivered, and the platform surface that creates and cancels it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::support::now_ms;
use crate::PushError;

/// Encryption keys attached to a subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    /// P-256 Diffie-Hellman public key
    pub p256dh: String,
    /// Authentication secret
    pub auth: String,
}

/// The browser's push endpoint registration. The platform subscription
/// is authoritative; this record is what the page sees and mirrors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushSubscriptionRecord {
    /// Push service endpoint URL
    pub endpoint: String,
    pub keys: Option<SubscriptionKeys>,
    pub created_at: u64,
}

/// Options for creating a subscription
#[derive(Debug, Clone)]
pub struct SubscribeOptions {
    pub user_visible_only: bool,
    /// Decoded application server key; absent for the unauthenticated
    /// fallback
    pub application_server_key: Option<Vec<u8>>,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self {
            user_visible_only: true,
            application_server_key: None,
        }
    }
}

impl SubscribeOptions {
    pub fn with_server_key(key: Vec<u8>) -> Self {
        Self {
            user_visible_only: true,
            application_server_key: Some(key),
        }
    }
}

/// The platform's push-subscription surface. One subscription exists
/// per origin; subscribing while one exists returns it unchanged.
pub trait PushService: Send + Sync {
    fn get_subscription(&self) -> Option<PushSubscriptionRecord>;
    fn subscribe(&self, options: &SubscribeOptions) -> Result<PushSubscriptionRecord, PushError>;
    /// Cancel the active subscription; false when none existed.
    fn unsubscribe(&self) -> Result<bool, PushError>;
}

/// In-process push service: fabricates endpoints and keys the way a
/// push service would, and enforces the one-subscription invariant.
pub struct LocalPushService {
    subscription: Mutex<Option<PushSubscriptionRecord>>,
    counter: AtomicU64,
    reject_server_keys: bool,
}

impl LocalPushService {
    pub fn new() -> Self {
        Self {
            subscription: Mutex::new(None),
            counter: AtomicU64::new(1),
            reject_server_keys: false,
        }
    }

    /// A service that refuses authenticated subscriptions, the way some
    /// platforms reject unusable server keys. Exercises the
    /// unauthenticated fallback.
    pub fn rejecting_server_keys() -> Self {
        Self {
            reject_server_keys: true,
            ..Self::new()
        }
    }
}

impl Default for LocalPushService {
    fn default() -> Self {
        Self::new()
    }
}

impl PushService for LocalPushService {
    fn get_subscription(&self) -> Option<PushSubscriptionRecord> {
        self.subscription.lock().unwrap().clone()
    }

    fn subscribe(&self, options: &SubscribeOptions) -> Result<PushSubscriptionRecord, PushError> {
        let mut slot = self.subscription.lock().unwrap();
        if let Some(existing) = slot.as_ref() {
            // Subscription creation is idempotent at the platform level
            return Ok(existing.clone());
        }

        if self.reject_server_keys && options.application_server_key.is_some() {
            return Err(PushError::SubscribeFailed(
                "push service rejected the applicationServerKey".to_string(),
            ));
        }

        let id = self.counter.fetch_add(1, Ordering::SeqCst);
        let record = PushSubscriptionRecord {
            endpoint: format!("https://push.storymaps.dev/v1/sub-{}", id),
            keys: Some(SubscriptionKeys {
                p256dh: "BNcRdreALRFXTkOOUHK1EtK2wtaz5Ry4YfYCA_0QTpQtUbVlUls0VJXg7A8u-Ts1XbjhazAkj7I99e8QcYP7DkM".to_string(),
                auth: "tBHItJI5svbpez7KI4CCXg".to_string(),
            }),
            created_at: now_ms(),
        };
        *slot = Some(record.clone());
        log::info!("Push subscription created: {}", record.endpoint);
        Ok(record)
    }

    fn unsubscribe(&self) -> Result<bool, PushError> {
        let was_subscribed = self.subscription.lock().unwrap().take().is_some();
        if was_subscribed {
            log::info!("Push subscription cancelled");
        }
        Ok(was_subscribed)
    }
}
