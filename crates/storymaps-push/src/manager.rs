//! Push manager
//!
//! Bridges the page to the browser's push capability and the service
//! worker registration: candidate-path registration, permission state,
//! subscription lifecycle, and the dual-path notification helpers.

use std::sync::Arc;

use storymaps_worker::{
    DataPatch, NotificationAction, NotificationData, NotificationPatch, NotificationRequest,
    NotificationSink, WorkerContainer, WorkerMessage,
};

use crate::keys::decode_server_key;
use crate::registrar::candidate_worker_paths;
use crate::store::KeyValueStore;
use crate::subscription::{PushService, PushSubscriptionRecord, SubscribeOptions};
use crate::support::{now_ms, Environment, PermissionPrompt, PermissionState};
use crate::PushError;

/// Key the subscription mirror is stored under
pub const SUBSCRIPTION_KEY: &str = "pushSubscription";

/// The canonical status query every UI surface uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionStatus {
    pub is_supported: bool,
    pub permission: PermissionState,
    pub is_subscribed: bool,
    pub can_send_notifications: bool,
}

/// A story to notify about
#[derive(Debug, Clone)]
pub struct StoryRef {
    pub id: String,
    pub name: String,
}

/// Foreground owner of the push subscription lifecycle
pub struct PushManager {
    env: Environment,
    service: Arc<dyn PushService>,
    prompt: Arc<dyn PermissionPrompt>,
    sink: Arc<dyn NotificationSink>,
    store: Arc<dyn KeyValueStore>,
    registered_scope: Option<String>,
    subscription: Option<PushSubscriptionRecord>,
}

impl PushManager {
    pub fn new(
        env: Environment,
        service: Arc<dyn PushService>,
        prompt: Arc<dyn PermissionPrompt>,
        sink: Arc<dyn NotificationSink>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        log::debug!(
            "Push manager created for {} (base_path={:?})",
            env.origin(),
            env.base_path
        );
        Self {
            env,
            service,
            prompt,
            sink,
            store,
            registered_scope: None,
            subscription: None,
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn is_supported(&self) -> bool {
        self.env.check_support()
    }

    /// The subscription as currently held by this manager
    pub fn subscription(&self) -> Option<&PushSubscriptionRecord> {
        self.subscription.as_ref()
    }

    /// Register the worker at the first candidate path that succeeds,
    /// wait for it to control the scope, then load permission state and
    /// any existing subscription. Idempotent.
    pub async fn init(&mut self, container: &mut WorkerContainer) -> bool {
        if !self.is_supported() {
            log::warn!("Push notifications not supported");
            return false;
        }
        if self.registered_scope.is_some() {
            return true;
        }

        let scope = self.env.scope();
        let mut registered = false;
        for path in candidate_worker_paths(&self.env) {
            match container.register(&path, &scope).await {
                Ok(event) => {
                    log::info!("Service worker registered at {} ({:?})", path, event);
                    registered = true;
                    break;
                }
                Err(e) => log::warn!("Failed to register SW at {}: {}", path, e),
            }
        }
        if !registered {
            log::error!("Could not register service worker at any path");
            return false;
        }
        if !container.ready(&scope) {
            log::error!("Service worker registration never became ready");
            return false;
        }

        self.registered_scope = Some(scope);
        self.subscription = self.service.get_subscription();
        log::debug!(
            "Push manager initialized: permission={} existing_subscription={}",
            self.prompt.current(),
            self.subscription.is_some()
        );
        true
    }

    /// Ask for notification permission. Denial is terminal: once the
    /// user denied, the platform prompt is never invoked again.
    pub fn request_permission(&mut self) -> Result<(), PushError> {
        if !self.is_supported() {
            return Err(PushError::NotSupported);
        }
        match self.prompt.current() {
            PermissionState::Granted => Ok(()),
            PermissionState::Denied => Err(PushError::PermissionDenied),
            PermissionState::Default => match self.prompt.request() {
                PermissionState::Granted => Ok(()),
                PermissionState::Denied => Err(PushError::PermissionDenied),
                PermissionState::Default => Err(PushError::PermissionDismissed),
            },
        }
    }

    /// Create (or return) the push subscription. Tries the configured
    /// application server key first; a malformed or rejected key
    /// degrades to an unauthenticated subscription rather than failing.
    pub async fn subscribe(
        &mut self,
        container: &mut WorkerContainer,
    ) -> Result<PushSubscriptionRecord, PushError> {
        if !self.is_supported() {
            return Err(PushError::NotSupported);
        }
        if self.registered_scope.is_none() && !self.init(container).await {
            return Err(PushError::RegistrationFailed);
        }
        self.request_permission()?;

        if let Some(existing) = &self.subscription {
            log::debug!("Already subscribed: {}", existing.endpoint);
            return Ok(existing.clone());
        }

        // Ordered subscription strategies; the first success wins.
        let mut attempts = Vec::new();
        if let Some(key) = &self.env.vapid_public_key {
            match decode_server_key(key) {
                Ok(decoded) => attempts.push(SubscribeOptions::with_server_key(decoded)),
                Err(e) => log::warn!("Ignoring malformed application server key: {}", e),
            }
        }
        attempts.push(SubscribeOptions::default());

        let mut last_error = None;
        for (index, options) in attempts.iter().enumerate() {
            match self.service.subscribe(options) {
                Ok(record) => {
                    log::info!("Subscription successful with method {}", index + 1);
                    self.save_mirror(&record);
                    self.subscription = Some(record.clone());
                    return Ok(record);
                }
                Err(e) => {
                    log::warn!("Subscription method {} failed: {}", index + 1, e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| PushError::SubscribeFailed("no subscription method".to_string())))
    }

    /// Cancel the subscription. Success when nothing was subscribed.
    pub fn unsubscribe(&mut self) -> Result<bool, PushError> {
        self.service.unsubscribe()?;
        self.subscription = None;
        self.store.remove(SUBSCRIPTION_KEY);
        Ok(true)
    }

    /// Pure status read; no side effects.
    pub fn subscription_status(&self) -> SubscriptionStatus {
        let permission = self.prompt.current();
        SubscriptionStatus {
            is_supported: self.is_supported(),
            permission,
            is_subscribed: self.subscription.is_some(),
            can_send_notifications: permission == PermissionState::Granted,
        }
    }

    /// The mirror written for diagnostics; the platform subscription is
    /// authoritative.
    pub fn saved_subscription(&self) -> Option<PushSubscriptionRecord> {
        let raw = self.store.get(SUBSCRIPTION_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("Discarding unreadable subscription mirror: {}", e);
                None
            }
        }
    }

    fn save_mirror(&self, record: &PushSubscriptionRecord) {
        match serde_json::to_string(record) {
            Ok(json) => self.store.set(SUBSCRIPTION_KEY, &json),
            Err(e) => log::warn!("Failed to mirror subscription: {}", e),
        }
    }

    fn icon_path(&self) -> String {
        format!("{}/icon-192.png", self.env.base_path)
    }

    fn app_root(&self) -> String {
        format!("{}/", self.env.base_path)
    }

    fn foreground_notification(
        &self,
        title: &str,
        body: &str,
        tag: &str,
        url: String,
    ) -> NotificationRequest {
        NotificationRequest {
            title: title.to_string(),
            body: body.to_string(),
            icon: self.icon_path(),
            badge: self.icon_path(),
            tag: tag.to_string(),
            require_interaction: false,
            actions: Vec::new(),
            data: NotificationData {
                url,
                timestamp: now_ms(),
            },
        }
    }

    /// Deliver a notification on both paths: directly from the page
    /// (works without any push backend) and via the active worker's
    /// trigger message (exercises the worker display path).
    fn send_both_ways(
        &self,
        container: &WorkerContainer,
        direct: NotificationRequest,
        worker_patch: NotificationPatch,
    ) {
        if self.prompt.current() == PermissionState::Granted {
            match self.sink.show(&direct) {
                Ok(_) => log::info!("Direct notification sent ({})", direct.tag),
                Err(e) => log::warn!("Direct notification failed: {}", e),
            }
        } else {
            log::debug!("Skipping direct notification; permission not granted");
        }

        if let Some(scope) = &self.registered_scope {
            if container.ready(scope) {
                if let Err(e) = container.post_message(
                    scope,
                    WorkerMessage::TriggerNotification(worker_patch),
                    None,
                ) {
                    log::warn!("Worker notification trigger failed: {}", e);
                }
            }
        }
    }

    /// Demonstrates that notifications work, even with no push backend
    /// configured.
    pub fn send_test_notification(&self, container: &WorkerContainer) {
        let direct = self.foreground_notification(
            "StoryMaps Test",
            "This is a test notification! Push notifications are working.",
            "test-notification",
            self.app_root(),
        );
        let patch = NotificationPatch {
            title: Some("StoryMaps SW Test".to_string()),
            body: Some("This test notification was sent via the service worker!".to_string()),
            tag: Some("sw-test-notification".to_string()),
            data: Some(DataPatch {
                url: Some(self.app_root()),
                timestamp: None,
            }),
            ..NotificationPatch::default()
        };
        self.send_both_ways(container, direct, patch);
    }

    /// Notify about a newly shared story; clicking lands on its detail
    /// page.
    pub fn send_story_notification(&self, container: &WorkerContainer, story: &StoryRef) {
        let url = format!("{}/detail/{}", self.env.base_path, story.id);
        let title = format!("New story from {}", story.name);
        let direct = self.foreground_notification(
            &title,
            "Tap to view the story.",
            &format!("story-{}", story.id),
            url.clone(),
        );
        let patch = NotificationPatch {
            title: Some(title),
            body: Some("Tap to view the story.".to_string()),
            tag: Some(format!("story-{}", story.id)),
            actions: Some(vec![
                NotificationAction {
                    action: "view".to_string(),
                    title: "View".to_string(),
                    icon: None,
                },
                NotificationAction {
                    action: "dismiss".to_string(),
                    title: "Dismiss".to_string(),
                    icon: None,
                },
            ]),
            data: Some(DataPatch {
                url: Some(url),
                timestamp: None,
            }),
            ..NotificationPatch::default()
        };
        self.send_both_ways(container, direct, patch);
    }
}
