//! The service worker
//!
//! Event handlers for install, activate, fetch, push, notification
//! click, and foreground messages. Every async handler's future must be
//! driven to completion by the caller before the worker context is
//! allowed to go away (the wait-until contract); the registration
//! container does exactly that.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use storymaps_cache::{CacheStore, Network, PopulationReport, Request, RequestMode, Response};

use crate::clients::ClientRegistry;
use crate::config::WorkerConfig;
use crate::messages::{DebugReport, ReplyPort, WorkerMessage, WorkerReply};
use crate::notification::{NotificationData, NotificationRequest, NotificationSink};
use crate::state::WorkerState;
use crate::WorkerError;

/// Where a served response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    Cache,
    Network,
    OfflineFallback,
}

/// Outcome of the fetch interceptor
#[derive(Debug)]
pub enum FetchOutcome {
    /// The worker declined to handle this request; the browser proceeds
    /// on its own (non-GET, non-http schemes).
    PassThrough,
    Served {
        response: Response,
        source: FetchSource,
    },
}

impl FetchOutcome {
    pub fn is_pass_through(&self) -> bool {
        matches!(self, FetchOutcome::PassThrough)
    }

    pub fn source(&self) -> Option<FetchSource> {
        match self {
            FetchOutcome::PassThrough => None,
            FetchOutcome::Served { source, .. } => Some(*source),
        }
    }
}

/// A click on a displayed notification
#[derive(Debug, Clone)]
pub struct NotificationClickEvent {
    pub notification_id: u64,
    /// The action button pressed, if any
    pub action: Option<String>,
    pub data: NotificationData,
}

/// What the click handler did. Exactly one client is focused or opened
/// per non-dismiss click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// The dismiss action: close and do nothing else
    Dismissed,
    /// An existing same-origin window was navigated and focused
    Focused { client: u32, url: String },
    /// No same-origin window was open; a new one was opened
    Opened { client: u32, url: String },
}

/// One service worker instance
pub struct ServiceWorker {
    config: WorkerConfig,
    state: Mutex<WorkerState>,
    skip_waiting: AtomicBool,
    caches: Arc<CacheStore>,
    network: Arc<dyn Network>,
    notifications: Arc<dyn NotificationSink>,
    clients: Arc<ClientRegistry>,
}

impl ServiceWorker {
    pub fn new(
        config: WorkerConfig,
        caches: Arc<CacheStore>,
        network: Arc<dyn Network>,
        notifications: Arc<dyn NotificationSink>,
        clients: Arc<ClientRegistry>,
    ) -> Self {
        Self {
            config,
            state: Mutex::new(WorkerState::Installing),
            skip_waiting: AtomicBool::new(false),
            caches,
            network,
            notifications,
            clients,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap()
    }

    fn set_state(&self, next: WorkerState) {
        let mut state = self.state.lock().unwrap();
        log::debug!("Worker {} -> {}", state, next);
        *state = next;
    }

    /// The current cache version string
    pub fn version(&self) -> &str {
        self.config.version()
    }

    /// Request immediate activation instead of waiting for old
    /// instances to release control.
    pub fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    pub fn wants_skip_waiting(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    pub(crate) fn set_redundant(&self) {
        self.set_state(WorkerState::Redundant);
    }

    /// Install: pre-populate the current cache with the app shell.
    /// Individual URL failures are reported, never fatal; the worker
    /// then asks to activate immediately so shell changes take effect
    /// without every tab closing first.
    pub async fn handle_install(&self) -> PopulationReport {
        log::info!("Service worker installing ({})", self.version());
        let shell = self.config.app_shell();
        let report = self
            .caches
            .populate(&self.config.cache_name, &shell, &self.network)
            .await;

        self.skip_waiting();
        self.set_state(WorkerState::Installed);
        log::info!(
            "Service worker installed: {} cached, {} failed",
            report.succeeded,
            report.failed_count()
        );
        report
    }

    /// Activate: evict every other cache version, then claim open
    /// clients so this worker handles their fetches without a reload.
    pub async fn handle_activate(&self) {
        self.set_state(WorkerState::Activating);
        let deleted = self.caches.evict_others(&self.config.cache_name);
        if !deleted.is_empty() {
            log::info!("Evicted {} stale cache(s): {:?}", deleted.len(), deleted);
        }
        self.clients.claim();
        self.set_state(WorkerState::Activated);
        log::info!("Service worker activated ({})", self.version());
    }

    /// Fetch interception: cache-first, network on miss with
    /// fire-and-forget write-back, offline fallback for failed
    /// navigations.
    pub async fn handle_fetch(&self, request: Request) -> Result<FetchOutcome, WorkerError> {
        if !request.method.is_cacheable() || !request.is_http() {
            return Ok(FetchOutcome::PassThrough);
        }

        if let Some(response) = self.caches.lookup(&request) {
            log::debug!("Cache hit: {}", request.url);
            return Ok(FetchOutcome::Served {
                response,
                source: FetchSource::Cache,
            });
        }

        log::debug!("Cache miss, fetching: {}", request.url);
        let network = Arc::clone(&self.network);
        let outgoing = request.clone();
        match smol::unblock(move || network.fetch(&outgoing)).await {
            Ok(response) => {
                if response.is_cacheable() {
                    // The page gets its response now; the write-back
                    // settles on its own time.
                    let caches = Arc::clone(&self.caches);
                    let cache_name = self.config.cache_name.clone();
                    let request = request.clone();
                    let snapshot = response.clone();
                    smol::spawn(async move {
                        if let Err(e) = caches.store(&cache_name, &request, snapshot) {
                            log::warn!("Write-back failed for {}: {}", request.url, e);
                        }
                    })
                    .detach();
                }
                Ok(FetchOutcome::Served {
                    response,
                    source: FetchSource::Network,
                })
            }
            Err(e) => {
                log::warn!("Fetch failed: {} ({})", request.url, e);
                if request.mode == RequestMode::Navigate {
                    for candidate in self.config.fallback_candidates() {
                        if let Some(response) = self.caches.lookup(&Request::get(&candidate)) {
                            log::info!("Serving cached {} for failed navigation", candidate);
                            return Ok(FetchOutcome::Served {
                                response,
                                source: FetchSource::OfflineFallback,
                            });
                        }
                    }
                    return Err(WorkerError::Offline(request.url));
                }
                Err(WorkerError::FetchFailed(request.url))
            }
        }
    }

    /// Push event: merge the payload over the defaults and display.
    /// Display failures are logged, never propagated.
    pub async fn handle_push(&self, payload: Option<&[u8]>) -> NotificationRequest {
        let request = NotificationRequest::from_push(payload, &self.config);
        match self.notifications.show(&request) {
            Ok(id) => log::info!("Push notification {} displayed", id),
            Err(e) => log::error!("Failed to show notification: {}", e),
        }
        request
    }

    /// Notification click: close, then route. The dismiss action stops
    /// here; anything else focuses an existing same-origin window or
    /// opens exactly one new one.
    pub async fn handle_notification_click(&self, event: NotificationClickEvent) -> ClickOutcome {
        self.notifications.close(event.notification_id);

        if event.action.as_deref() == Some("dismiss") {
            log::debug!("Notification {} dismissed", event.notification_id);
            return ClickOutcome::Dismissed;
        }

        let target = self.config.absolutize(&event.data.url);
        log::debug!("Notification click opens {}", target);

        for client in self.clients.match_all() {
            if client.url.starts_with(&self.config.origin) {
                self.clients.navigate(client.id, &target);
                self.clients.focus(client.id);
                return ClickOutcome::Focused {
                    client: client.id,
                    url: target,
                };
            }
        }

        let client = self.clients.open_window(&target);
        ClickOutcome::Opened {
            client,
            url: target,
        }
    }

    /// Foreground message dispatch. Replies go out on the provided
    /// port, at most once; unknown types are logged and ignored.
    pub fn handle_message(&self, message: WorkerMessage, port: Option<&ReplyPort>) {
        match message {
            WorkerMessage::SkipWaiting => {
                log::debug!("Skip-waiting requested via message");
                self.skip_waiting();
            }
            WorkerMessage::GetVersion => {
                let reply = WorkerReply::Version {
                    version: self.version().to_string(),
                };
                match port {
                    Some(port) => {
                        port.send(reply);
                    }
                    None => log::warn!("GET_VERSION without a reply port"),
                }
            }
            WorkerMessage::TriggerNotification(patch) => {
                let request = NotificationRequest::from_patch(patch, &self.config);
                match self.notifications.show(&request) {
                    Ok(id) => log::info!("Triggered notification {} displayed", id),
                    Err(e) => log::error!("Triggered notification failed: {}", e),
                }
            }
            WorkerMessage::DebugInfo => {
                let reply = WorkerReply::Debug(DebugReport {
                    base_path: self.config.base_path.clone(),
                    cache_name: self.config.cache_name.clone(),
                    location: self.config.location.clone(),
                    registration: true,
                });
                match port {
                    Some(port) => {
                        port.send(reply);
                    }
                    None => log::warn!("DEBUG_INFO without a reply port"),
                }
            }
            WorkerMessage::Unknown(tag) => {
                log::warn!("Unknown message type: {}", tag);
            }
        }
    }
}
