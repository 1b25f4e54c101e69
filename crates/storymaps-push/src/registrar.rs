//! Service worker registration bootstrap
//!
//! Tries an ordered list of candidate script paths, wires the
//! update-available / offline-ready callbacks, and kicks off push
//! manager initialization.

use storymaps_worker::{RegistrationEvent, WorkerContainer};

use crate::manager::PushManager;
use crate::support::Environment;
use crate::PushError;

/// UX hooks fired by registration outcomes
#[derive(Default)]
pub struct RegistrarCallbacks {
    /// First install finished; content is cached for offline use
    pub on_offline_ready: Option<Box<dyn Fn() + Send>>,
    /// A new worker took over; the page may want to offer a reload
    pub on_update_available: Option<Box<dyn Fn() + Send>>,
}

impl RegistrarCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_offline_ready(mut self, callback: impl Fn() + Send + 'static) -> Self {
        self.on_offline_ready = Some(Box::new(callback));
        self
    }

    pub fn on_update_available(mut self, callback: impl Fn() + Send + 'static) -> Self {
        self.on_update_available = Some(Box::new(callback));
        self
    }
}

/// Candidate worker script paths for this deployment, most specific
/// first, deduplicated.
pub fn candidate_worker_paths(env: &Environment) -> Vec<String> {
    let mut paths = Vec::new();
    let mut push = |path: String| {
        if !paths.contains(&path) {
            paths.push(path);
        }
    };
    if !env.base_path.is_empty() {
        push(format!("{}/service-worker.js", env.base_path));
    }
    push("/service-worker.js".to_string());
    push("./service-worker.js".to_string());
    paths
}

/// Register the service worker at the first candidate path that works,
/// fire the matching UX callback, then initialize the push manager.
/// Hosts typically schedule the permission banner's auto-show next.
pub async fn register_worker(
    container: &mut WorkerContainer,
    manager: &mut PushManager,
    callbacks: &RegistrarCallbacks,
) -> Result<RegistrationEvent, PushError> {
    let env = manager.environment().clone();
    if !env.has_service_worker {
        log::warn!("Service workers not supported");
        return Err(PushError::NotSupported);
    }

    let scope = env.scope();
    let paths = candidate_worker_paths(&env);
    log::debug!("Trying SW paths: {:?}", paths);

    let mut event = None;
    for path in &paths {
        match container.register(path, &scope).await {
            Ok(e) => {
                log::info!("Service worker registered at {}", path);
                event = Some(e);
                break;
            }
            Err(e) => log::warn!("Failed to register SW at {}: {}", path, e),
        }
    }
    let event = event.ok_or(PushError::RegistrationFailed)?;

    match event {
        RegistrationEvent::OfflineReady => {
            log::info!("Content cached for offline use");
            if let Some(callback) = &callbacks.on_offline_ready {
                callback();
            }
        }
        RegistrationEvent::UpdateAvailable => {
            log::info!("New content available");
            if let Some(callback) = &callbacks.on_update_available {
                callback();
            }
        }
        RegistrationEvent::AlreadyRegistered => {}
    }

    if !manager.init(container).await {
        log::warn!("Push notifications not available");
    }

    Ok(event)
}
