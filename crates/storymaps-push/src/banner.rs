//! Notification permission banner
//!
//! Decides when to solicit notification permission and drives the push
//! manager when the user accepts. Dismissing starts a 24-hour cool-down
//! before the banner becomes eligible again.

use std::time::Duration;

use storymaps_worker::WorkerContainer;

use crate::manager::PushManager;
use crate::store::KeyValueStore;
use crate::subscription::PushSubscriptionRecord;
use crate::support::{now_ms, PermissionState};
use crate::PushError;

/// Key the dismissal timestamp is stored under
pub const DISMISSAL_KEY: &str = "notificationPermissionDismissed";
/// Dismissal cool-down window
pub const DISMISSAL_COOLDOWN_MS: u64 = 24 * 60 * 60 * 1000;
/// Delay before the banner auto-shows, so it never appears jarringly
/// on page load
pub const AUTO_SHOW_DELAY: Duration = Duration::from_secs(3);

/// How accepting the banner worked out
#[derive(Debug)]
pub enum EnableOutcome {
    /// Full push subscription created
    Subscribed(PushSubscriptionRecord),
    /// Subscription failed but permission is granted; direct
    /// notifications still work
    BaselineOnly,
}

/// The banner state machine: hidden -> visible -> (accepted |
/// dismissed) -> hidden.
#[derive(Debug, Default)]
pub struct NotificationPermissionBanner {
    visible: bool,
}

impl NotificationPermissionBanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether soliciting permission makes sense right now.
    pub fn should_show(&self, manager: &PushManager, store: &dyn KeyValueStore) -> bool {
        self.should_show_at(manager, store, now_ms())
    }

    /// Clock-parameterized form of `should_show`.
    pub fn should_show_at(
        &self,
        manager: &PushManager,
        store: &dyn KeyValueStore,
        now_ms: u64,
    ) -> bool {
        if !manager.is_supported() {
            return false;
        }
        let status = manager.subscription_status();
        if status.permission == PermissionState::Granted || status.is_subscribed {
            return false;
        }
        if status.permission == PermissionState::Denied {
            return false;
        }
        if let Some(dismissed) = store.get(DISMISSAL_KEY) {
            match dismissed.parse::<u64>() {
                Ok(dismissed_at) => {
                    let elapsed = now_ms.saturating_sub(dismissed_at);
                    if elapsed < DISMISSAL_COOLDOWN_MS {
                        log::debug!(
                            "Banner recently dismissed ({:.1}h ago)",
                            elapsed as f64 / 3_600_000.0
                        );
                        return false;
                    }
                }
                Err(_) => log::warn!("Ignoring unreadable dismissal record: {:?}", dismissed),
            }
        }
        true
    }

    /// Show the banner. No-op when already visible or when the gating
    /// conditions changed in the interim.
    pub fn show(&mut self, manager: &PushManager, store: &dyn KeyValueStore) -> bool {
        if self.visible {
            log::debug!("Banner already visible");
            return false;
        }
        if !self.should_show(manager, store) {
            return false;
        }
        log::info!("Showing notification permission banner");
        self.visible = true;
        true
    }

    /// The user accepted: subscribe. A failed subscription with
    /// permission still granted is a degraded success; only denial or
    /// an unsupported platform surfaces as an error.
    pub async fn handle_enable(
        &mut self,
        manager: &mut PushManager,
        container: &mut WorkerContainer,
    ) -> Result<EnableOutcome, PushError> {
        match manager.subscribe(container).await {
            Ok(record) => {
                log::info!("Notifications enabled with full push support");
                manager.send_test_notification(container);
                self.hide();
                Ok(EnableOutcome::Subscribed(record))
            }
            Err(e) => {
                if manager.subscription_status().can_send_notifications {
                    log::warn!(
                        "Subscription failed, continuing with baseline notifications: {}",
                        e
                    );
                    manager.send_test_notification(container);
                    self.hide();
                    Ok(EnableOutcome::BaselineOnly)
                } else {
                    // Leave the banner up; the caller surfaces the error
                    log::error!("Failed to enable notifications: {}", e);
                    Err(e)
                }
            }
        }
    }

    /// The user dismissed: hide and start the cool-down.
    pub fn handle_dismiss(&mut self, store: &dyn KeyValueStore) {
        self.hide();
        store.set(DISMISSAL_KEY, &now_ms().to_string());
        log::debug!("Dismissal timestamp saved");
    }

    fn hide(&mut self) {
        self.visible = false;
    }

    /// Show after the standard delay, re-checking eligibility once the
    /// delay elapses.
    pub async fn auto_show(&mut self, manager: &PushManager, store: &dyn KeyValueStore) -> bool {
        self.auto_show_after(AUTO_SHOW_DELAY, manager, store).await
    }

    /// Delay-parameterized form of `auto_show`.
    pub async fn auto_show_after(
        &mut self,
        delay: Duration,
        manager: &PushManager,
        store: &dyn KeyValueStore,
    ) -> bool {
        smol::Timer::after(delay).await;
        self.show(manager, store)
    }
}
