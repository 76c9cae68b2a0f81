//! Page lifecycle orchestration.
//!
//! One controller per open new-tab page. It wires the prefs provider, the
//! places notifications, the update scheduler, and the message bridge
//! together, and owns the init/observe/teardown lifecycle.

use std::sync::{Arc, Mutex};

use freshtab_bridge::{names, probes, MessageBridge, TelemetrySink};
use freshtab_common::{topic, HostEvents, Visibility};
use freshtab_places::LinksProvider;
use freshtab_prefs::{keys, HandlerId, PrefsProvider};
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::scheduler::UpdateScheduler;
use crate::update::{UpdateReason, UpdateRequest};

struct PageState {
    initialized: bool,
    shown_at: Option<Instant>,
    suggested_tile_visible: bool,
    pref_handlers: Vec<(&'static str, HandlerId)>,
    relays: Vec<JoinHandle<()>>,
}

/// The privileged controller for a single new-tab page.
pub struct PageController {
    bridge: Arc<MessageBridge>,
    prefs: Arc<PrefsProvider>,
    events: Arc<HostEvents>,
    telemetry: Arc<dyn TelemetrySink>,
    scheduler: Arc<UpdateScheduler>,
    state: Mutex<PageState>,
}

impl PageController {
    pub fn new(
        bridge: Arc<MessageBridge>,
        prefs: Arc<PrefsProvider>,
        events: Arc<HostEvents>,
        telemetry: Arc<dyn TelemetrySink>,
        scheduler: Arc<UpdateScheduler>,
    ) -> Arc<Self> {
        Arc::new(Self {
            bridge,
            prefs,
            events,
            telemetry,
            scheduler,
            state: Mutex::new(PageState {
                initialized: false,
                shown_at: None,
                suggested_tile_visible: false,
                pref_handlers: Vec::new(),
                relays: Vec::new(),
            }),
        })
    }

    /// Build the standard wiring: the scheduler's refresh callback pushes
    /// the current sorted links into the frame as `NewTab:UpdatePages`.
    pub fn with_refresh_to_frame(
        bridge: Arc<MessageBridge>,
        prefs: Arc<PrefsProvider>,
        links: Arc<LinksProvider>,
        events: Arc<HostEvents>,
        telemetry: Arc<dyn TelemetrySink>,
        own_window: freshtab_common::WindowId,
    ) -> Arc<Self> {
        let refresh_bridge = Arc::clone(&bridge);
        let scheduler = Arc::new(UpdateScheduler::new(
            own_window,
            Arc::clone(&events),
            move || match links.sorted_links() {
                Ok(sorted) => {
                    let data = json!({ "links": sorted });
                    refresh_bridge.send_to_frame(names::UPDATE_PAGES, data);
                }
                // A malformed record is an upstream data bug; surface it
                // rather than rendering a partial grid.
                Err(e) => error!(error = %e, "grid refresh aborted"),
            },
        ));
        Self::new(bridge, prefs, events, telemetry, scheduler)
    }

    pub fn bridge(&self) -> &Arc<MessageBridge> {
        &self.bridge
    }

    pub fn scheduler(&self) -> &Arc<UpdateScheduler> {
        &self.scheduler
    }

    /// Start the lifecycle: track prefs, subscribe to places notifications,
    /// and kick off the frame handshake.
    pub fn start(self: &Arc<Self>) {
        self.prefs.start_tracking();
        self.register_pref_handlers();
        self.register_places_relays();
        self.register_frame_handlers();

        // Handshake: ask the host side for the bootstrap location. The
        // reply arrives as a NewTabFrame:init command from the frame side.
        self.bridge
            .dispatch_from_frame(names::FRAME_GET_INIT, Value::Null);

        if self.enabled() {
            self.init_page();
        } else {
            debug!("page disabled at startup, waiting for pref flip");
        }
    }

    fn register_pref_handlers(self: &Arc<Self>) {
        let mut registered = Vec::new();

        let weak = Arc::downgrade(self);
        registered.push((
            keys::ENABLED,
            self.prefs.on(keys::ENABLED, move |_, value| {
                if let Some(ctrl) = weak.upgrade() {
                    ctrl.observe_enabled(value.as_bool().unwrap_or(false));
                }
            }),
        ));

        let weak = Arc::downgrade(self);
        registered.push((
            keys::ENHANCED,
            self.prefs.on(keys::ENHANCED, move |_, value| {
                if let Some(ctrl) = weak.upgrade() {
                    ctrl.observe_enhanced(value.as_bool().unwrap_or(false));
                }
            }),
        ));

        for key in [keys::ROWS, keys::COLUMNS] {
            let weak = Arc::downgrade(self);
            registered.push((
                key,
                self.prefs.on(key, move |key, value| {
                    if let Some(ctrl) = weak.upgrade() {
                        ctrl.notify_frame_pref(key, value.as_int().map(Value::from));
                    }
                }),
            ));
        }

        self.state.lock().unwrap().pref_handlers = registered;
    }

    /// Funnel places notifications into the scheduler. The relay tasks are
    /// cancelled on teardown.
    fn register_places_relays(self: &Arc<Self>) {
        let topics = [
            topic::PLACES_MANY_LINKS_CHANGED,
            topic::PLACES_LINK_CHANGED,
            topic::PLACES_CLEAR_HISTORY,
        ];
        let mut relays = Vec::new();
        for name in topics {
            let mut rx = self.events.subscribe(name);
            let weak = Arc::downgrade(self);
            relays.push(tokio::spawn(async move {
                while let Ok(_value) = rx.recv().await {
                    let Some(ctrl) = weak.upgrade() else { break };
                    ctrl.scheduler
                        .request_update(&UpdateRequest::refresh(UpdateReason::LinksChanged));
                }
            }));
        }
        self.state.lock().unwrap().relays = relays;
    }

    fn register_frame_handlers(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.bridge
            .register_local_handler(names::FRAME_INIT, move |data| {
                if let Some(ctrl) = weak.upgrade() {
                    ctrl.init_remote_page(data);
                }
            });
    }

    /// `NewTabFrame:init` arrived: begin the load of the bootstrap
    /// location and finish wiring once that document is ready. A handler
    /// for a superseded load never fires. Returns the load's sequence so
    /// the embedder can report completion via
    /// [`MessageBridge::frame_loaded`].
    pub fn init_remote_page(self: &Arc<Self>, data: Value) -> freshtab_bridge::LoadSeq {
        let url = data
            .get("url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| self.bridge.location().href());
        info!(url = %url, "initializing remote page");

        let seq = self.bridge.begin_load(&url);
        let weak = Arc::downgrade(self);
        self.bridge.on_frame_ready(seq, move || {
            if let Some(ctrl) = weak.upgrade() {
                ctrl.on_page_ready();
            }
        });
        seq
    }

    fn on_page_ready(&self) {
        debug!("frame document ready, wiring command channel");
        // Subscribe the frame to host observe notifications, then let its
        // scripts know the command channel is live.
        self.bridge
            .dispatch_from_frame(names::REGISTER, json!({ "type": names::OBSERVE }));
        self.bridge.send_to_frame(names::COMMAND_READY, Value::Null);
    }

    fn init_page(&self) {
        let mut state = self.state.lock().unwrap();
        if state.initialized {
            return;
        }
        state.initialized = true;
        drop(state);
        info!("page initialized");
        self.scheduler
            .request_update(&UpdateRequest::refresh(UpdateReason::LinksChanged));
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().unwrap().initialized
    }

    fn enabled(&self) -> bool {
        self.prefs.store().get_bool(keys::ENABLED, true)
    }

    fn observe_enabled(&self, enabled: bool) {
        debug!(enabled, "enabled pref changed");
        if enabled {
            self.init_page();
        }
        self.events.publish(
            names::OBSERVE,
            json!({ "name": "enabled", "value": enabled }),
        );
    }

    fn observe_enhanced(&self, enhanced: bool) {
        debug!(enhanced, "enhanced pref changed");
        self.events.publish(
            names::OBSERVE,
            json!({ "name": "enhanced", "value": enhanced }),
        );
        // First toggle of the enhanced view counts as having seen the intro.
        let store = self.prefs.store();
        if enhanced && !store.get_bool(keys::INTRO_SHOWN, false) {
            store.set(keys::INTRO_SHOWN, true);
        }
    }

    fn notify_frame_pref(&self, key: &str, value: Option<Value>) {
        self.events.publish(
            names::OBSERVE,
            json!({ "name": key, "value": value.unwrap_or(Value::Null) }),
        );
    }

    /// Report a visibility change for the page document. The first time
    /// the page becomes visible counts as its impression.
    pub fn set_visibility(&self, visibility: Visibility) {
        self.scheduler.set_visibility(visibility);
        if visibility.is_visible() {
            let mut state = self.state.lock().unwrap();
            if state.shown_at.is_none() {
                state.shown_at = Some(Instant::now());
                drop(state);
                self.telemetry.add(probes::PAGE_SHOWN, 1);
            }
        }
    }

    /// Mark that a suggested tile is on screen; picks the life-span probe
    /// variant recorded at teardown.
    pub fn set_suggested_tile_visible(&self, visible: bool) {
        self.state.lock().unwrap().suggested_tile_visible = visible;
    }

    /// Push pin-state for a site into the frame.
    pub fn push_pin_state(&self, data: Value) {
        self.bridge.send_to_frame(names::PIN_STATE, data);
    }

    /// Push block-state for a site into the frame.
    pub fn push_block_state(&self, data: Value) {
        self.bridge.send_to_frame(names::BLOCK_STATE, data);
    }

    /// Push a resolved thumbnail URI into the frame.
    pub fn push_thumbnail_uri(&self, url: &str, uri: &str) {
        self.bridge
            .send_to_frame(names::THUMBNAIL_URI, json!({ "url": url, "uri": uri }));
    }

    /// Tear the page down: record its life span, cancel every timer,
    /// relay, and subscription. Nothing may fire into the controller
    /// afterwards.
    pub fn teardown(&self) {
        let (shown_at, suggested) = {
            let mut state = self.state.lock().unwrap();
            let shown_at = state.shown_at.take();
            let suggested = state.suggested_tile_visible;
            for handle in state.relays.drain(..) {
                handle.abort();
            }
            let handlers = std::mem::take(&mut state.pref_handlers);
            drop(state);
            for (key, id) in handlers {
                self.prefs.off(key, id);
            }
            (shown_at, suggested)
        };

        if let Some(shown_at) = shown_at {
            // Life span is recorded in half-second buckets.
            let buckets = (shown_at.elapsed().as_millis() / 500) as i64;
            let probe = if suggested {
                probes::PAGE_LIFE_SPAN_SUGGESTED
            } else {
                probes::PAGE_LIFE_SPAN
            };
            self.telemetry.add(probe, buckets);
        }

        self.scheduler.shutdown();
        self.prefs.stop_tracking();
        self.bridge.shutdown();
        info!("page torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freshtab_bridge::{
        Histograms, LoopbackFrame, LoopbackHost, PageIdentity, RemoteLocation,
    };
    use freshtab_bridge::location::LOCAL_URL;
    use freshtab_common::WindowId;
    use freshtab_places::Link;
    use freshtab_prefs::PrefStore;
    use std::time::Duration;
    use tokio::time::advance;

    struct Fixture {
        controller: Arc<PageController>,
        frame: Arc<LoopbackFrame>,
        store: Arc<PrefStore>,
        links: Arc<LinksProvider>,
        telemetry: Arc<Histograms>,
    }

    fn fixture() -> Fixture {
        let frame = Arc::new(LoopbackFrame::new(LOCAL_URL));
        let host = Arc::new(LoopbackHost::new());
        let store = Arc::new(PrefStore::with_defaults());
        let events = Arc::new(HostEvents::new());
        let telemetry = Arc::new(Histograms::new());
        let location = Arc::new(RemoteLocation::new("release", Arc::clone(&store)));
        let identity = PageIdentity {
            window_id: WindowId(1),
            private_browsing: false,
        };
        let bridge = Arc::new(MessageBridge::new(
            frame.clone(),
            host,
            Arc::clone(&store),
            Arc::clone(&events),
            telemetry.clone(),
            location,
            identity,
        ));
        let prefs = Arc::new(PrefsProvider::new(Arc::clone(&store)));
        let links = Arc::new(LinksProvider::new(Arc::clone(&events)));
        let controller = PageController::with_refresh_to_frame(
            bridge,
            prefs,
            Arc::clone(&links),
            events,
            telemetry.clone(),
            WindowId(1),
        );
        Fixture {
            controller,
            frame,
            store,
            links,
            telemetry,
        }
    }

    fn update_pages_count(frame: &LoopbackFrame) -> usize {
        frame
            .drain_posted()
            .iter()
            .filter(|m| m.name == names::UPDATE_PAGES)
            .count()
    }

    // Moves the paused clock, then lets relay and timer tasks run.
    async fn advance_and_run(d: Duration) {
        advance(d).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn visible_page_gets_refresh_with_sorted_links() {
        let fx = fixture();
        fx.controller.start();
        fx.controller.set_visibility(Visibility::Visible);
        fx.frame.drain_posted();

        fx.links.set_links(vec![
            Link::new("http://example.org/old", 5, 100),
            Link::new("http://example.org/new", 5, 200),
        ]);
        // Let the places relay deliver.
        advance_and_run(Duration::from_millis(1)).await;

        let posted = fx.frame.drain_posted();
        let update = posted
            .iter()
            .find(|m| m.name == names::UPDATE_PAGES)
            .expect("refresh reached the frame");
        assert_eq!(update.data["links"][0]["url"], "http://example.org/new");
        assert_eq!(update.data["links"][1]["url"], "http://example.org/old");
    }

    #[tokio::test(start_paused = true)]
    async fn hidden_page_defers_and_coalesces_refreshes() {
        let fx = fixture();
        fx.controller.start();
        fx.frame.drain_posted();

        for i in 0..3 {
            fx.links
                .set_links(vec![Link::new(&format!("http://example.org/{i}"), 1, i)]);
        }
        advance_and_run(Duration::from_millis(1)).await;
        assert_eq!(update_pages_count(&fx.frame), 0);

        advance_and_run(Duration::from_millis(1100)).await;
        assert_eq!(update_pages_count(&fx.frame), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn becoming_visible_flushes_pending_refresh() {
        let fx = fixture();
        fx.controller.start();
        fx.frame.drain_posted();

        fx.links
            .set_links(vec![Link::new("http://example.org/", 1, 1)]);
        advance_and_run(Duration::from_millis(200)).await;
        assert_eq!(update_pages_count(&fx.frame), 0);

        fx.controller.set_visibility(Visibility::Visible);
        assert_eq!(update_pages_count(&fx.frame), 1);

        advance_and_run(Duration::from_millis(2000)).await;
        assert_eq!(update_pages_count(&fx.frame), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn frame_init_completes_handshake_when_ready() {
        let fx = fixture();
        fx.controller.start();
        fx.frame.drain_posted();

        fx.frame.navigate(LOCAL_URL);
        let seq = fx
            .controller
            .init_remote_page(json!({ "url": LOCAL_URL }));
        // Nothing is wired while the document is still loading.
        assert!(fx.frame.drain_posted().is_empty());

        fx.frame.finish_load();
        fx.controller.bridge().frame_loaded(seq);

        let posted = fx.frame.drain_posted();
        assert!(posted.iter().any(|m| m.name == names::COMMAND_READY));
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_load_never_completes_handshake() {
        let fx = fixture();
        fx.controller.start();
        fx.frame.drain_posted();

        fx.frame.navigate(LOCAL_URL);
        let first = fx
            .controller
            .init_remote_page(json!({ "url": LOCAL_URL }));

        // A second init supersedes the first before it completes.
        fx.frame.navigate(LOCAL_URL);
        let second = fx
            .controller
            .init_remote_page(json!({ "url": LOCAL_URL }));

        fx.frame.finish_load();
        fx.controller.bridge().frame_loaded(first);
        assert!(fx.frame.drain_posted().is_empty());

        fx.controller.bridge().frame_loaded(second);
        let posted = fx.frame.drain_posted();
        assert!(posted.iter().any(|m| m.name == names::COMMAND_READY));
    }

    #[tokio::test(start_paused = true)]
    async fn enabling_pref_initializes_once() {
        let fx = fixture();
        fx.store.set(keys::ENABLED, false);
        fx.controller.start();
        assert!(!fx.controller.is_initialized());

        fx.store.set(keys::ENABLED, true);
        assert!(fx.controller.is_initialized());

        // A second flip does not re-run init.
        fx.store.set(keys::ENABLED, false);
        fx.store.set(keys::ENABLED, true);
        assert!(fx.controller.is_initialized());
    }

    #[tokio::test(start_paused = true)]
    async fn enhanced_toggle_marks_intro_shown() {
        let fx = fixture();
        fx.controller.start();
        assert!(!fx.store.get_bool(keys::INTRO_SHOWN, false));

        fx.store.set(keys::ENHANCED, true);
        assert!(fx.store.get_bool(keys::INTRO_SHOWN, false));
    }

    #[tokio::test(start_paused = true)]
    async fn first_show_records_impression_once() {
        let fx = fixture();
        fx.controller.start();

        fx.controller.set_visibility(Visibility::Visible);
        fx.controller.set_visibility(Visibility::Hidden);
        fx.controller.set_visibility(Visibility::Visible);

        assert_eq!(fx.telemetry.count(probes::PAGE_SHOWN), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_records_life_span_in_half_second_buckets() {
        let fx = fixture();
        fx.controller.start();
        fx.controller.set_visibility(Visibility::Visible);

        advance(Duration::from_millis(2500)).await;
        fx.controller.teardown();

        assert_eq!(fx.telemetry.samples(probes::PAGE_LIFE_SPAN), vec![5]);
        assert_eq!(fx.telemetry.count(probes::PAGE_LIFE_SPAN_SUGGESTED), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_with_suggested_tile_uses_variant_probe() {
        let fx = fixture();
        fx.controller.start();
        fx.controller.set_visibility(Visibility::Visible);
        fx.controller.set_suggested_tile_visible(true);

        advance(Duration::from_millis(1000)).await;
        fx.controller.teardown();

        assert_eq!(
            fx.telemetry.samples(probes::PAGE_LIFE_SPAN_SUGGESTED),
            vec![2]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_fires_after_teardown() {
        let fx = fixture();
        fx.controller.start();
        fx.frame.drain_posted();

        fx.links
            .set_links(vec![Link::new("http://example.org/", 1, 1)]);
        fx.controller.teardown();

        advance_and_run(Duration::from_millis(3000)).await;
        assert_eq!(update_pages_count(&fx.frame), 0);

        // Pref changes no longer reach the controller either.
        fx.store.set(keys::ENABLED, false);
        fx.store.set(keys::ENABLED, true);
        advance_and_run(Duration::from_millis(1)).await;
        assert_eq!(update_pages_count(&fx.frame), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn pin_and_block_state_reach_the_frame() {
        let fx = fixture();
        fx.controller.start();
        fx.frame.drain_posted();

        fx.controller
            .push_pin_state(json!({ "url": "http://example.org/", "pinned": true }));
        fx.controller
            .push_block_state(json!({ "url": "http://example.org/", "blocked": false }));
        fx.controller
            .push_thumbnail_uri("http://example.org/", "data:image/png;base64,AAAA");

        let posted = fx.frame.drain_posted();
        let posted_names: Vec<_> = posted.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            posted_names,
            [names::PIN_STATE, names::BLOCK_STATE, names::THUMBNAIL_URI]
        );
    }
}
