//! StoryMaps offline/push runtime - Demo Entry Point
//!
//! Wires the in-memory platform pieces together and walks the whole
//! flow: register, cache the shell, subscribe, notify, go offline.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use storymaps_cache::{CacheStore, Network, Request, Response, StaticNetwork};
use storymaps_push::{
    register_worker, Environment, KeyValueStore, LocalPushService, MemoryStore,
    NotificationPermissionBanner, PermissionPrompt, PushManager, PushService, RegistrarCallbacks,
    StaticPrompt, StoryRef,
};
use storymaps_worker::{
    reply_channel, ClientRegistry, NotificationCenter, NotificationClickEvent, NotificationSink,
    WorkerContainer, WorkerMessage,
};

const ORIGIN: &str = "https://app.test";
const VAPID_KEY: &str = "BNcRdreALRFXTkOOUHK1EtK2wtaz5Ry4YfYCA_0QTpQtUbVlUls0VJXg7A8u-Ts1XbjhazAkj7I99e8QcYP7DkM";

fn seed_shell(network: &StaticNetwork) {
    network.insert(&format!("{}/", ORIGIN), Response::new(200, b"<entry>".to_vec()));
    network.insert(
        &format!("{}/index.html", ORIGIN),
        Response::new(200, b"<shell>".to_vec()),
    );
    network.insert(
        &format!("{}/manifest.json", ORIGIN),
        Response::new(200, b"{}".to_vec()),
    );
    // Leave the CDN assets unreachable; install tolerates that
}

fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting StoryMaps offline/push demo...");

    let caches = Arc::new(CacheStore::new());
    let network = Arc::new(StaticNetwork::new());
    seed_shell(&network);
    let center = Arc::new(NotificationCenter::new());
    let clients = Arc::new(ClientRegistry::new());
    let store = Arc::new(MemoryStore::new());
    let prompt = Arc::new(StaticPrompt::granting());

    let mut container = WorkerContainer::new(
        ORIGIN,
        Arc::clone(&caches),
        Arc::clone(&network) as Arc<dyn Network>,
        Arc::clone(&center) as Arc<dyn NotificationSink>,
        Arc::clone(&clients),
    );
    container.add_script("/service-worker.js");

    let env = Environment::secure("app.test").with_vapid_key(VAPID_KEY);
    let mut manager = PushManager::new(
        env,
        Arc::new(LocalPushService::new()) as Arc<dyn PushService>,
        Arc::clone(&prompt) as Arc<dyn PermissionPrompt>,
        Arc::clone(&center) as Arc<dyn NotificationSink>,
        Arc::clone(&store) as Arc<dyn KeyValueStore>,
    );
    let mut banner = NotificationPermissionBanner::new();

    let result: Result<(), Box<dyn Error>> = smol::block_on(async {
        // Register the worker; the shell gets cached on install
        let callbacks = RegistrarCallbacks::new()
            .on_offline_ready(|| log::info!("UX: ready for offline use"))
            .on_update_available(|| log::info!("UX: new version available, reload?"));
        register_worker(&mut container, &mut manager, &callbacks).await?;

        // The permission banner shows after its delay; the user accepts
        banner
            .auto_show_after(Duration::from_millis(200), &manager, store.as_ref())
            .await;
        banner.handle_enable(&mut manager, &mut container).await?;

        let status = manager.subscription_status();
        log::info!(
            "Subscription status: supported={} permission={} subscribed={}",
            status.is_supported,
            status.permission,
            status.is_subscribed
        );

        // A story lands; both delivery paths fire
        manager.send_story_notification(
            &container,
            &StoryRef {
                id: "42".to_string(),
                name: "Alice".to_string(),
            },
        );

        // A push arrives from the backend and the user clicks it
        let worker = container
            .active_worker("/")
            .ok_or("no active worker for scope /")?;
        let shown = worker
            .handle_push(Some(br#"{"title":"New Story","body":"Bob shared a story","data":{"url":"/detail/43"}}"#))
            .await;
        let outcome = worker
            .handle_notification_click(NotificationClickEvent {
                notification_id: center.by_tag(&shown.tag)[0].id,
                action: None,
                data: shown.data.clone(),
            })
            .await;
        log::info!("Notification click outcome: {:?}", outcome);

        // The network goes away; the cached shell still serves
        network.remove(&format!("{}/", ORIGIN));
        network.remove(&format!("{}/index.html", ORIGIN));
        let offline = worker
            .handle_fetch(Request::navigate(&format!("{}/favorites", ORIGIN)))
            .await?;
        log::info!("Offline navigation served from {:?}", offline.source());

        // Ask the worker which build is live
        let (port, receiver) = reply_channel();
        container.post_message("/", WorkerMessage::GetVersion, Some(&port))?;
        if let Some(reply) = receiver.take() {
            log::info!("Worker reported {:?}", reply);
        }

        log::info!(
            "Demo complete: {} notification(s) active, {} client window(s) open",
            center.active_count(),
            clients.len()
        );
        Ok(())
    });
    result
}
