//! Worker registration
//!
//! The surface foreground pages talk to: script registration, lifecycle
//! driving, and message dispatch to the active worker.

use std::collections::HashMap;
use std::sync::Arc;

use storymaps_cache::{CacheStore, Network};

use crate::clients::ClientRegistry;
use crate::config::WorkerConfig;
use crate::messages::{ReplyPort, WorkerMessage};
use crate::notification::NotificationSink;
use crate::state::WorkerState;
use crate::worker::ServiceWorker;
use crate::WorkerError;

/// What a registration attempt meant for the page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationEvent {
    /// First worker for this scope; content is now cached for offline use
    OfflineReady,
    /// A newer script replaced the active worker; updated content is live
    UpdateAvailable,
    /// The scope already runs this exact script; nothing to install
    AlreadyRegistered,
}

/// A scope's registration
pub struct Registration {
    pub scope: String,
    pub script_url: String,
    /// Deploy generation of the script this registration installed
    generation: u32,
    active: Option<Arc<ServiceWorker>>,
}

impl Registration {
    pub fn active(&self) -> Option<&Arc<ServiceWorker>> {
        self.active.as_ref()
    }

    /// Ready means an activated worker controls the scope
    pub fn is_ready(&self) -> bool {
        self.active
            .as_ref()
            .map(|w| w.state() == WorkerState::Activated)
            .unwrap_or(false)
    }
}

/// Registration container: owns every scope's registration and the
/// platform pieces workers are built from.
pub struct WorkerContainer {
    origin: String,
    /// Deployed script paths and their deploy generation. Registration
    /// of an undeployed path fails, which is what the foreground's
    /// multi-path fallback probes; re-deploying a path bumps its
    /// generation and makes the next registration an update.
    scripts: HashMap<String, u32>,
    registrations: HashMap<String, Registration>,
    caches: Arc<CacheStore>,
    network: Arc<dyn Network>,
    notifications: Arc<dyn NotificationSink>,
    clients: Arc<ClientRegistry>,
}

impl WorkerContainer {
    pub fn new(
        origin: &str,
        caches: Arc<CacheStore>,
        network: Arc<dyn Network>,
        notifications: Arc<dyn NotificationSink>,
        clients: Arc<ClientRegistry>,
    ) -> Self {
        Self {
            origin: origin.trim_end_matches('/').to_string(),
            scripts: HashMap::new(),
            registrations: HashMap::new(),
            caches,
            network,
            notifications,
            clients,
        }
    }

    /// Deploy a worker script path. Deploying the same path again marks
    /// it as changed, so the next registration installs an update.
    pub fn add_script(&mut self, path: &str) {
        let generation = self.scripts.entry(path.to_string()).or_insert(0);
        *generation += 1;
    }

    /// Resolve a candidate script path: page-relative candidates are
    /// resolved against the scope directory.
    fn resolve_script(&self, script_path: &str, scope: &str) -> String {
        if let Some(rest) = script_path.strip_prefix("./") {
            let scope = scope.trim_end_matches('/');
            format!("{}/{}", scope, rest)
        } else {
            script_path.to_string()
        }
    }

    /// Register a worker script for a scope. Installs the worker, and —
    /// because installed workers request skip-waiting — immediately
    /// activates it, retiring any previous worker for the scope.
    /// Registering an unchanged script for its scope is a no-op.
    pub async fn register(
        &mut self,
        script_path: &str,
        scope: &str,
    ) -> Result<RegistrationEvent, WorkerError> {
        let resolved = self.resolve_script(script_path, scope);
        let Some(&generation) = self.scripts.get(&resolved) else {
            log::warn!("No worker script deployed at {}", resolved);
            return Err(WorkerError::ScriptNotFound(resolved));
        };

        if let Some(existing) = self.registrations.get(scope) {
            if existing.script_url == resolved
                && existing.generation == generation
                && existing.active.is_some()
            {
                log::debug!("Service worker already registered for scope {}", scope);
                return Ok(RegistrationEvent::AlreadyRegistered);
            }
        }

        let location = format!("{}{}", self.origin, resolved);
        let config = WorkerConfig::from_location(&location)?;
        log::info!("Registering service worker {} (scope {})", resolved, scope);

        let worker = Arc::new(ServiceWorker::new(
            config,
            Arc::clone(&self.caches),
            Arc::clone(&self.network),
            Arc::clone(&self.notifications),
            Arc::clone(&self.clients),
        ));

        let had_active = self
            .registrations
            .get(scope)
            .and_then(|r| r.active.as_ref())
            .is_some();

        // Drive the lifecycle to completion; these awaits are the
        // wait-until contract for install and activate.
        let report = worker.handle_install().await;
        log::debug!(
            "Install cache results: {} successful, {} failed",
            report.succeeded,
            report.failed_count()
        );
        debug_assert!(worker.wants_skip_waiting());
        worker.handle_activate().await;

        if let Some(previous) = self
            .registrations
            .get_mut(scope)
            .and_then(|r| r.active.take())
        {
            previous.set_redundant();
        }
        self.registrations.insert(
            scope.to_string(),
            Registration {
                scope: scope.to_string(),
                script_url: resolved,
                generation,
                active: Some(worker),
            },
        );

        Ok(if had_active {
            RegistrationEvent::UpdateAvailable
        } else {
            RegistrationEvent::OfflineReady
        })
    }

    pub fn get_registration(&self, scope: &str) -> Option<&Registration> {
        self.registrations.get(scope)
    }

    /// Whether the scope has an activated, controlling worker
    pub fn ready(&self, scope: &str) -> bool {
        self.registrations
            .get(scope)
            .map(|r| r.is_ready())
            .unwrap_or(false)
    }

    /// The active worker for a scope, if any
    pub fn active_worker(&self, scope: &str) -> Option<Arc<ServiceWorker>> {
        self.registrations.get(scope)?.active().cloned()
    }

    /// Post a message to the scope's active worker
    pub fn post_message(
        &self,
        scope: &str,
        message: WorkerMessage,
        port: Option<&ReplyPort>,
    ) -> Result<(), WorkerError> {
        match self.active_worker(scope) {
            Some(worker) => {
                worker.handle_message(message, port);
                Ok(())
            }
            None => Err(WorkerError::NoActiveWorker(scope.to_string())),
        }
    }

    /// Drop the scope's registration; its worker becomes redundant.
    pub fn unregister(&mut self, scope: &str) -> bool {
        if let Some(registration) = self.registrations.remove(scope) {
            if let Some(worker) = registration.active {
                worker.set_redundant();
            }
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{reply_channel, WorkerReply};
    use crate::notification::NotificationCenter;
    use storymaps_cache::{Response, StaticNetwork};

    fn container_with(scripts: &[&str]) -> WorkerContainer {
        let caches = Arc::new(CacheStore::new());
        let network = Arc::new(StaticNetwork::new());
        network.insert("https://app.test/", Response::new(200, b"<html>".to_vec()));
        network.insert(
            "https://app.test/index.html",
            Response::new(200, b"<html>".to_vec()),
        );
        network.insert(
            "https://app.test/manifest.json",
            Response::new(200, b"{}".to_vec()),
        );

        let mut container = WorkerContainer::new(
            "https://app.test",
            caches,
            network as Arc<dyn Network>,
            Arc::new(NotificationCenter::new()),
            Arc::new(ClientRegistry::new()),
        );
        for script in scripts {
            container.add_script(script);
        }
        container
    }

    #[test]
    fn register_unknown_script_fails() {
        let mut container = container_with(&[]);
        let result = smol::block_on(container.register("/service-worker.js", "/"));
        assert!(matches!(result, Err(WorkerError::ScriptNotFound(_))));
        assert!(!container.ready("/"));
    }

    #[test]
    fn first_registration_reports_offline_ready() {
        let mut container = container_with(&["/service-worker.js"]);
        let event = smol::block_on(container.register("/service-worker.js", "/")).unwrap();
        assert_eq!(event, RegistrationEvent::OfflineReady);
        assert!(container.ready("/"));
    }

    #[test]
    fn unchanged_script_registration_is_a_no_op() {
        let mut container = container_with(&["/service-worker.js"]);
        smol::block_on(container.register("/service-worker.js", "/")).unwrap();
        let worker = container.active_worker("/").unwrap();

        let event = smol::block_on(container.register("/service-worker.js", "/")).unwrap();
        assert_eq!(event, RegistrationEvent::AlreadyRegistered);
        // The original worker keeps serving
        assert_eq!(worker.state(), WorkerState::Activated);
    }

    #[test]
    fn redeployed_script_installs_an_update() {
        let mut container = container_with(&["/service-worker.js"]);
        smol::block_on(container.register("/service-worker.js", "/")).unwrap();
        let first = container.active_worker("/").unwrap();

        // New deploy of the script
        container.add_script("/service-worker.js");
        let event = smol::block_on(container.register("/service-worker.js", "/")).unwrap();
        assert_eq!(event, RegistrationEvent::UpdateAvailable);
        assert_eq!(first.state(), WorkerState::Redundant);

        let second = container.active_worker("/").unwrap();
        assert_eq!(second.state(), WorkerState::Activated);
    }

    #[test]
    fn page_relative_scripts_resolve_against_scope() {
        let mut container = container_with(&["/service-worker.js"]);
        let event = smol::block_on(container.register("./service-worker.js", "/")).unwrap();
        assert_eq!(event, RegistrationEvent::OfflineReady);
    }

    #[test]
    fn post_message_requires_active_worker() {
        let container = container_with(&[]);
        let result = container.post_message("/", WorkerMessage::GetVersion, None);
        assert!(matches!(result, Err(WorkerError::NoActiveWorker(_))));
    }

    #[test]
    fn get_version_round_trip_through_container() {
        let mut container = container_with(&["/service-worker.js"]);
        smol::block_on(container.register("/service-worker.js", "/")).unwrap();

        let (port, receiver) = reply_channel();
        container
            .post_message("/", WorkerMessage::GetVersion, Some(&port))
            .unwrap();

        match receiver.take() {
            Some(WorkerReply::Version { version }) => {
                assert!(version.starts_with("storymaps-v"));
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[test]
    fn unregister_retires_worker() {
        let mut container = container_with(&["/service-worker.js"]);
        smol::block_on(container.register("/service-worker.js", "/")).unwrap();
        let worker = container.active_worker("/").unwrap();

        assert!(container.unregister("/"));
        assert_eq!(worker.state(), WorkerState::Redundant);
        assert!(!container.ready("/"));
        assert!(!container.unregister("/"));
    }
}
