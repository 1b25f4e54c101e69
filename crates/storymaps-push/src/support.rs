//! Capability detection
//!
//! A read-only snapshot of what the hosting page can do, plus the
//! platform permission surface.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Epoch milliseconds
pub(crate) fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Notification permission state, owned by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Default,
    Granted,
    Denied,
}

impl std::fmt::Display for PermissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionState::Default => write!(f, "default"),
            PermissionState::Granted => write!(f, "granted"),
            PermissionState::Denied => write!(f, "denied"),
        }
    }
}

/// The platform's permission surface: current state plus the
/// user-facing prompt.
pub trait PermissionPrompt: Send + Sync {
    fn current(&self) -> PermissionState;
    /// Invoke the platform permission prompt; returns the new state.
    fn request(&self) -> PermissionState;
}

/// Scriptable prompt for tests and the demo: starts in a state and
/// answers every request the same way, counting invocations.
pub struct StaticPrompt {
    state: Mutex<PermissionState>,
    answer: PermissionState,
    requests: AtomicUsize,
}

impl StaticPrompt {
    fn with(state: PermissionState, answer: PermissionState) -> Self {
        Self {
            state: Mutex::new(state),
            answer,
            requests: AtomicUsize::new(0),
        }
    }

    /// Permission already granted
    pub fn granted() -> Self {
        Self::with(PermissionState::Granted, PermissionState::Granted)
    }

    /// Permission already denied
    pub fn denied() -> Self {
        Self::with(PermissionState::Denied, PermissionState::Denied)
    }

    /// Starts at default; the user grants when prompted
    pub fn granting() -> Self {
        Self::with(PermissionState::Default, PermissionState::Granted)
    }

    /// Starts at default; the user denies when prompted
    pub fn denying() -> Self {
        Self::with(PermissionState::Default, PermissionState::Denied)
    }

    /// Starts at default; the user dismisses the prompt
    pub fn dismissing() -> Self {
        Self::with(PermissionState::Default, PermissionState::Default)
    }

    /// How many times the platform prompt was actually invoked
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl PermissionPrompt for StaticPrompt {
    fn current(&self) -> PermissionState {
        *self.state.lock().unwrap()
    }

    fn request(&self) -> PermissionState {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        // default -> granted/denied is the only transition the prompt makes
        if *state == PermissionState::Default {
            *state = self.answer;
        }
        *state
    }
}

/// Read-only environment snapshot supplied by the hosting page
#[derive(Debug, Clone)]
pub struct Environment {
    /// "https" or "http"
    pub protocol: String,
    pub hostname: String,
    /// Sub-path prefix for project-pages hosting ("" or "/app")
    pub base_path: String,
    pub has_service_worker: bool,
    pub has_push_manager: bool,
    pub has_notifications: bool,
    /// Optional application server (VAPID) public key, base64url
    pub vapid_public_key: Option<String>,
}

impl Environment {
    /// An https page with every capability present
    pub fn secure(hostname: &str) -> Self {
        Self {
            protocol: "https".to_string(),
            hostname: hostname.to_string(),
            base_path: String::new(),
            has_service_worker: true,
            has_push_manager: true,
            has_notifications: true,
            vapid_public_key: None,
        }
    }

    /// An http page with every capability present
    pub fn insecure(hostname: &str) -> Self {
        Self {
            protocol: "http".to_string(),
            ..Self::secure(hostname)
        }
    }

    pub fn with_base_path(mut self, base_path: &str) -> Self {
        self.base_path = base_path.to_string();
        self
    }

    pub fn with_vapid_key(mut self, key: &str) -> Self {
        self.vapid_public_key = Some(key.to_string());
        self
    }

    pub fn without_push_manager(mut self) -> Self {
        self.has_push_manager = false;
        self
    }

    /// scheme://host
    pub fn origin(&self) -> String {
        format!("{}://{}", self.protocol, self.hostname)
    }

    /// Worker scope for this deployment
    pub fn scope(&self) -> String {
        if self.base_path.is_empty() {
            "/".to_string()
        } else {
            self.base_path.clone()
        }
    }

    /// Browsers refuse push on insecure origins, except loopback.
    pub fn is_secure_context(&self) -> bool {
        self.protocol == "https" || self.hostname == "localhost" || self.hostname == "127.0.0.1"
    }

    /// True only with worker, push, and notification capability on a
    /// secure context. Failing fast here avoids confusing downstream
    /// platform errors.
    pub fn check_support(&self) -> bool {
        let supported = self.has_service_worker
            && self.has_push_manager
            && self.has_notifications
            && self.is_secure_context();
        if !self.is_secure_context() {
            log::error!("HTTPS is required for push notifications");
        }
        log::debug!(
            "Push support check: sw={} push={} notification={} secure={} -> {}",
            self.has_service_worker,
            self.has_push_manager,
            self.has_notifications,
            self.is_secure_context(),
            supported
        );
        supported
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_context_is_supported() {
        assert!(Environment::secure("app.test").check_support());
    }

    #[test]
    fn insecure_context_is_unsupported() {
        assert!(!Environment::insecure("app.test").check_support());
    }

    #[test]
    fn loopback_is_a_secure_context() {
        assert!(Environment::insecure("localhost").check_support());
        assert!(Environment::insecure("127.0.0.1").check_support());
    }

    #[test]
    fn missing_capability_is_unsupported() {
        assert!(!Environment::secure("app.test")
            .without_push_manager()
            .check_support());
    }

    #[test]
    fn scope_follows_base_path() {
        assert_eq!(Environment::secure("app.test").scope(), "/");
        assert_eq!(
            Environment::secure("user.github.io")
                .with_base_path("/storymaps")
                .scope(),
            "/storymaps"
        );
    }

    #[test]
    fn prompt_transitions_only_from_default() {
        let prompt = StaticPrompt::granting();
        assert_eq!(prompt.current(), PermissionState::Default);
        assert_eq!(prompt.request(), PermissionState::Granted);
        assert_eq!(prompt.current(), PermissionState::Granted);
        assert_eq!(prompt.request_count(), 1);

        // A denied prompt stays denied no matter the scripted answer
        let prompt = StaticPrompt::denied();
        assert_eq!(prompt.request(), PermissionState::Denied);
    }
}
