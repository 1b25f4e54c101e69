//! End-to-end offline flow
//!
//! Drives a registration through install, activation, eviction, offline
//! serving, push display, and click routing.

use std::sync::Arc;

use storymaps_cache::{CacheStore, Network, Request, Response, StaticNetwork};
use storymaps_worker::{
    ClickOutcome, ClientRegistry, FetchSource, NotificationCenter, NotificationClickEvent,
    NotificationSink, RegistrationEvent, WorkerContainer,
};

const ORIGIN: &str = "https://app.test";

struct World {
    container: WorkerContainer,
    caches: Arc<CacheStore>,
    network: Arc<StaticNetwork>,
    center: Arc<NotificationCenter>,
    clients: Arc<ClientRegistry>,
}

fn world() -> World {
    let caches = Arc::new(CacheStore::new());
    let network = Arc::new(StaticNetwork::new());
    let center = Arc::new(NotificationCenter::new());
    let clients = Arc::new(ClientRegistry::new());

    let mut container = WorkerContainer::new(
        ORIGIN,
        Arc::clone(&caches),
        Arc::clone(&network) as Arc<dyn Network>,
        Arc::clone(&center) as Arc<dyn NotificationSink>,
        Arc::clone(&clients),
    );
    container.add_script("/service-worker.js");

    World {
        container,
        caches,
        network,
        center,
        clients,
    }
}

fn serve_full_shell(network: &StaticNetwork) {
    network.insert(&format!("{}/", ORIGIN), Response::new(200, b"<entry>".to_vec()));
    network.insert(
        &format!("{}/index.html", ORIGIN),
        Response::new(200, b"<shell>".to_vec()),
    );
    network.insert(
        &format!("{}/manifest.json", ORIGIN),
        Response::new(200, b"{}".to_vec()),
    );
    for url in storymaps_worker::config::THIRD_PARTY_ASSETS {
        network.insert(url, Response::new(200, b"asset".to_vec()));
    }
}

#[test]
fn install_activate_evict_and_serve_offline() {
    let mut w = world();
    serve_full_shell(&w.network);

    // A previous build's cache is lying around
    w.caches.open("storymaps-v0.9.0");

    let event = smol::block_on(w.container.register("/service-worker.js", "/")).unwrap();
    assert_eq!(event, RegistrationEvent::OfflineReady);
    assert!(w.container.ready("/"));

    // Exactly one cache namespace survives activation
    let worker = w.container.active_worker("/").unwrap();
    assert_eq!(w.caches.keys(), vec![worker.version().to_string()]);

    // Go offline: cached entries still serve, without touching the network
    let before = w.network.request_count();
    let outcome =
        smol::block_on(worker.handle_fetch(Request::get(&format!("{}/", ORIGIN)))).unwrap();
    assert_eq!(outcome.source(), Some(FetchSource::Cache));
    assert_eq!(w.network.request_count(), before);

    // A navigation to an uncached page falls back to the cached shell
    let outcome = smol::block_on(
        worker.handle_fetch(Request::navigate(&format!("{}/detail/42", ORIGIN))),
    )
    .unwrap();
    match outcome {
        storymaps_worker::FetchOutcome::Served { response, source } => {
            assert_eq!(source, FetchSource::OfflineFallback);
            assert_eq!(response.body, b"<shell>");
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[test]
fn partial_shell_failure_still_activates() {
    let mut w = world();
    // Only the entry page resolves; index, manifest, and CDNs are down
    w.network
        .insert(&format!("{}/", ORIGIN), Response::new(200, b"<entry>".to_vec()));
    w.caches.open("storymaps-v0.9.0");

    let event = smol::block_on(w.container.register("/service-worker.js", "/")).unwrap();
    assert_eq!(event, RegistrationEvent::OfflineReady);

    // Activation proceeded regardless of individual failures
    assert!(w.container.ready("/"));
    let worker = w.container.active_worker("/").unwrap();

    // Eviction still ran
    assert_eq!(w.caches.keys(), vec![worker.version().to_string()]);

    // The entry page made it in; the failed URLs did not
    assert!(w
        .caches
        .lookup(&Request::get(&format!("{}/", ORIGIN)))
        .is_some());
    assert!(w
        .caches
        .lookup(&Request::get(&format!("{}/index.html", ORIGIN)))
        .is_none());
    assert_eq!(w.caches.entry_count(worker.version()), 1);
}

#[test]
fn push_then_click_routes_into_the_app() {
    let mut w = world();
    serve_full_shell(&w.network);
    smol::block_on(w.container.register("/service-worker.js", "/")).unwrap();
    let worker = w.container.active_worker("/").unwrap();

    let shown = smol::block_on(worker.handle_push(Some(
        br#"{"title":"New Story","body":"Alice shared a story","data":{"url":"/detail/42"}}"#,
    )));
    assert_eq!(shown.title, "New Story");
    assert_eq!(w.center.active_count(), 1);
    let displayed = &w.center.active()[0];

    // No windows open: the click opens exactly one
    let outcome = smol::block_on(worker.handle_notification_click(NotificationClickEvent {
        notification_id: displayed.id,
        action: None,
        data: displayed.request.data.clone(),
    }));
    match outcome {
        ClickOutcome::Opened { url, .. } => assert_eq!(url, format!("{}/detail/42", ORIGIN)),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(w.clients.len(), 1);
    assert_eq!(w.center.active_count(), 0);

    // With the window now open, a second push's click focuses it instead
    let shown = smol::block_on(worker.handle_push(Some(br#"{"data":{"url":"/detail/43"}}"#)));
    let outcome = smol::block_on(worker.handle_notification_click(NotificationClickEvent {
        notification_id: w.center.active()[0].id,
        action: Some("view".to_string()),
        data: shown.data.clone(),
    }));
    match outcome {
        ClickOutcome::Focused { url, .. } => assert_eq!(url, format!("{}/detail/43", ORIGIN)),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(w.clients.len(), 1);
}

#[test]
fn update_keeps_a_single_version_serving() {
    let mut w = world();
    serve_full_shell(&w.network);

    smol::block_on(w.container.register("/service-worker.js", "/")).unwrap();
    // Same script again: nothing to install
    let event = smol::block_on(w.container.register("/service-worker.js", "/")).unwrap();
    assert_eq!(event, RegistrationEvent::AlreadyRegistered);

    // A redeploy makes the next registration an update
    w.container.add_script("/service-worker.js");
    let event = smol::block_on(w.container.register("/service-worker.js", "/")).unwrap();
    assert_eq!(event, RegistrationEvent::UpdateAvailable);

    let worker = w.container.active_worker("/").unwrap();
    assert_eq!(w.caches.keys(), vec![worker.version().to_string()]);
    assert!(w.container.ready("/"));
}
