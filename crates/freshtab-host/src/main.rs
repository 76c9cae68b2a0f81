mod cli;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use freshtab_bridge::{
    names, Histograms, LoopbackFrame, LoopbackHost, MessageBridge, PageIdentity, RemoteLocation,
};
use freshtab_common::{HostEvents, Visibility, WindowId};
use freshtab_page::PageController;
use freshtab_places::{Link, LinksProvider};
use freshtab_prefs::{file, keys, PrefsProvider, ReloadManager};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = cli::parse();

    let log_directive = args.log_level.as_deref().unwrap_or("freshtab=info");
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                log_directive
                    .parse()
                    .unwrap_or_else(|_| "freshtab=info".parse().unwrap()),
            ),
        )
        .init();

    tracing::info!("Freshtab v{} starting...", env!("CARGO_PKG_VERSION"));

    let prefs_path = match args.prefs {
        Some(ref path) => PathBuf::from(path),
        None => file::default_prefs_path().unwrap_or_else(|e| {
            tracing::warn!("No pref path available ({e}), using ./prefs.toml");
            PathBuf::from("prefs.toml")
        }),
    };
    let (store, _snapshots) = ReloadManager::start(prefs_path).await;
    if args.remote {
        store.set(keys::REMOTE_ENABLED, true);
    }
    for key in keys::TRACKED {
        if let Some(value) = store.get(key) {
            tracing::debug!(key, ?value, "pref loaded");
        }
    }

    let events = Arc::new(HostEvents::new());
    let telemetry = Arc::new(Histograms::new());
    let provider = Arc::new(PrefsProvider::new(Arc::clone(&store)));
    let location = Arc::new(RemoteLocation::new(&args.channel, Arc::clone(&store)));
    location.track(&provider);
    tracing::info!("New-tab page location: {}", location.href());

    // No rendering engine here: the frame and the outer channel are
    // in-process loopbacks that record the traffic.
    let frame = Arc::new(LoopbackFrame::new(&location.href()));
    let host_channel = Arc::new(LoopbackHost::new());
    let bridge = Arc::new(MessageBridge::new(
        frame.clone(),
        host_channel.clone(),
        Arc::clone(&store),
        Arc::clone(&events),
        telemetry.clone(),
        Arc::clone(&location),
        PageIdentity {
            window_id: WindowId(1),
            private_browsing: false,
        },
    ));
    let links = Arc::new(LinksProvider::new(Arc::clone(&events)));
    let controller = PageController::with_refresh_to_frame(
        bridge,
        Arc::clone(&provider),
        Arc::clone(&links),
        events,
        telemetry.clone(),
        WindowId(1),
    );
    controller.start();

    // Simulate one full page load and the frame's opening commands.
    frame.navigate(&location.href());
    let seq = controller.init_remote_page(json!({ "url": location.href() }));
    frame.finish_load();
    controller.bridge().frame_loaded(seq);
    controller
        .bridge()
        .handle_post_message(&location.origin(), names::GET_INITIAL_STATE, Value::Null);
    controller.set_visibility(Visibility::Visible);

    // History mutations while backgrounded coalesce into one refresh.
    controller.set_visibility(Visibility::Hidden);
    links.set_links(vec![
        Link::new("https://example.org/a", 120, 1_000),
        Link::new("https://example.org/b", 90, 3_000),
        Link::new("https://example.org/c", 200, 2_000),
    ]);
    links.set_links(vec![
        Link::new("https://example.org/a", 120, 1_000),
        Link::new("https://example.org/b", 95, 3_000),
        Link::new("https://example.org/c", 200, 2_000),
        Link::new("https://example.org/d", 10, 4_000),
    ]);
    tokio::time::sleep(Duration::from_millis(1200)).await;
    controller.set_visibility(Visibility::Visible);

    for message in frame.drain_posted() {
        tracing::info!("frame received: {}", message.name);
    }
    for (name, _data) in host_channel.drain_sent() {
        tracing::info!("forwarded to host: {name}");
    }

    controller.teardown();
    tracing::info!(
        "Page impressions recorded: {}",
        telemetry.count(freshtab_bridge::probes::PAGE_SHOWN)
    );
    tracing::info!("Shutdown complete");
}
