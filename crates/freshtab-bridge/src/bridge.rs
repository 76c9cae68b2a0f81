//! The message bridge proper: command registry, built-ins, origin checks,
//! and the frame-ready guard.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use freshtab_common::{HostEvents, WindowId};
use freshtab_prefs::{keys, PrefStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::command::{names, FrameMessage};
use crate::frame::{Frame, HostChannel, ReadyState};
use crate::location::RemoteLocation;
use crate::ready::{LoadSeq, LoadTracker};
use crate::telemetry::TelemetrySink;

/// Outcome of dispatching one frame-originated command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Consumed by a built-in or a registered local handler.
    Handled,
    /// Passed to the outer host channel, fire-and-forget.
    Forwarded,
}

/// Host-assigned identity of the page this bridge serves.
#[derive(Debug, Clone, Copy)]
pub struct PageIdentity {
    pub window_id: WindowId,
    pub private_browsing: bool,
}

/// The snapshot sent back for `NewTab:GetInitialState`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialState {
    pub enabled: bool,
    pub enhanced: bool,
    pub rows: i64,
    pub columns: i64,
    pub intro_shown: bool,
    pub private_browsing_mode: bool,
    #[serde(rename = "windowID")]
    pub window_id: WindowId,
}

type LocalHandler = Arc<Mutex<dyn FnMut(Value) + Send>>;

pub struct MessageBridge {
    frame: Arc<dyn Frame>,
    host: Arc<dyn HostChannel>,
    prefs: Arc<PrefStore>,
    events: Arc<HostEvents>,
    telemetry: Arc<dyn TelemetrySink>,
    location: Arc<RemoteLocation>,
    identity: PageIdentity,
    handlers: Mutex<HashMap<String, LocalHandler>>,
    load: LoadTracker,
    pending_ready: Mutex<Vec<(LoadSeq, Box<dyn FnOnce() + Send>)>>,
    relays: Mutex<Vec<(String, JoinHandle<()>)>>,
}

impl MessageBridge {
    pub fn new(
        frame: Arc<dyn Frame>,
        host: Arc<dyn HostChannel>,
        prefs: Arc<PrefStore>,
        events: Arc<HostEvents>,
        telemetry: Arc<dyn TelemetrySink>,
        location: Arc<RemoteLocation>,
        identity: PageIdentity,
    ) -> Self {
        Self {
            frame,
            host,
            prefs,
            events,
            telemetry,
            location,
            identity,
            handlers: Mutex::new(HashMap::new()),
            load: LoadTracker::new(),
            pending_ready: Mutex::new(Vec::new()),
            relays: Mutex::new(Vec::new()),
        }
    }

    pub fn location(&self) -> &Arc<RemoteLocation> {
        &self.location
    }

    /// Register a local handler for a frame-originated command. Matching
    /// commands are consumed here instead of being forwarded outward.
    pub fn register_local_handler(
        &self,
        name: &str,
        handler: impl FnMut(Value) + Send + 'static,
    ) {
        self.handlers
            .lock()
            .unwrap()
            .insert(name.to_string(), Arc::new(Mutex::new(handler)));
    }

    /// The single dispatch point for inbound frame commands. Built-ins are
    /// consumed first, then registered local handlers; anything else is
    /// forwarded verbatim exactly once.
    pub fn dispatch_from_frame(&self, command: &str, data: Value) -> Dispatch {
        match command {
            names::GET_INITIAL_STATE => {
                self.send_initial_state();
                Dispatch::Handled
            }
            names::REGISTER => {
                match data.get("type").and_then(Value::as_str) {
                    Some(event_type) => self.register_event(event_type),
                    None => warn!("Register command without an event type"),
                }
                Dispatch::Handled
            }
            names::UPDATE_TELEMETRY_PROBE => {
                let probe = data.get("probe").and_then(Value::as_str);
                let value = data.get("value").and_then(Value::as_i64);
                match (probe, value) {
                    (Some(probe), Some(value)) => self.telemetry.add(probe, value),
                    _ => warn!(?data, "malformed telemetry probe command"),
                }
                Dispatch::Handled
            }
            _ => {
                let handler = self.handlers.lock().unwrap().get(command).cloned();
                if let Some(handler) = handler {
                    debug!(command, "frame command handled locally");
                    (handler.lock().unwrap())(data);
                    Dispatch::Handled
                } else {
                    debug!(command, "frame command forwarded to host");
                    if let Err(e) = self.host.send(command, data) {
                        // Forwarding is transport, not RPC: the frame never
                        // learns about outward channel failures.
                        debug!(command, error = %e, "outward forward failed");
                    }
                    Dispatch::Forwarded
                }
            }
        }
    }

    /// Entry point for postMessage-style traffic from the frame: the
    /// message only reaches dispatch when its origin matches the frame's
    /// current expected origin. Mismatches are dropped silently.
    pub fn handle_post_message(
        &self,
        origin: &str,
        command: &str,
        data: Value,
    ) -> Option<Dispatch> {
        let expected = self.location.origin();
        if origin != expected {
            debug!(origin, expected = %expected, command, "inbound message dropped: origin mismatch");
            return None;
        }
        Some(self.dispatch_from_frame(command, data))
    }

    /// Post a message into the frame against its current expected origin.
    pub fn send_to_frame(&self, name: &str, data: Value) {
        let origin = self.location.origin();
        let message = FrameMessage::new(name, data);
        if let Err(e) = self.frame.post_message(&message, &origin) {
            warn!(name = %message.name, error = %e, "failed to post message to frame");
        }
    }

    fn send_initial_state(&self) {
        let state = InitialState {
            enabled: self.prefs.get_bool(keys::ENABLED, true),
            enhanced: self.prefs.get_bool(keys::ENHANCED, false),
            rows: self.prefs.get_int(keys::ROWS, 3),
            columns: self.prefs.get_int(keys::COLUMNS, 5),
            intro_shown: self.prefs.get_bool(keys::INTRO_SHOWN, false),
            private_browsing_mode: self.identity.private_browsing,
            window_id: self.identity.window_id,
        };
        match serde_json::to_value(&state) {
            Ok(data) => self.send_to_frame(names::STATE, data),
            Err(e) => warn!(error = %e, "failed to serialize initial state"),
        }
    }

    /// Subscribe the bridge to a named host event stream and relay every
    /// future occurrence into the frame. A repeat registration for the same
    /// event type replaces the earlier relay, so a page that re-runs its
    /// init handshake never receives duplicate deliveries.
    fn register_event(&self, event_type: &str) {
        debug!(event_type, "frame registered for host events");
        {
            let mut relays = self.relays.lock().unwrap();
            if let Some(pos) = relays.iter().position(|(name, _)| name == event_type) {
                let (_, stale) = relays.remove(pos);
                stale.abort();
                debug!(event_type, "replaced existing relay");
            }
        }
        let mut rx = self.events.subscribe(event_type);
        let frame = Arc::clone(&self.frame);
        let location = Arc::clone(&self.location);
        let name = event_type.to_string();
        let relay_name = name.clone();
        let handle = tokio::spawn(async move {
            while let Ok(data) = rx.recv().await {
                let message = FrameMessage::new(relay_name.clone(), data);
                // Origin is re-read per delivery so a location change cuts
                // off relays into the old document.
                if let Err(e) = frame.post_message(&message, &location.origin()) {
                    warn!(name = %message.name, error = %e, "relay into frame failed");
                }
            }
        });
        self.relays.lock().unwrap().push((name, handle));
    }

    /// Begin a new frame load, invalidating earlier ready handlers.
    /// Callers navigate the frame first, then register the ready handler.
    pub fn begin_load(&self, url: &str) -> LoadSeq {
        let seq = self.load.begin_load();
        debug!(url, ?seq, "frame load started");
        seq
    }

    /// Run `handler` once the document for load `seq` is complete. Fires
    /// immediately if the document already finished loading; a handler for
    /// a superseded load is discarded without error.
    pub fn on_frame_ready(&self, seq: LoadSeq, handler: impl FnOnce() + Send + 'static) {
        if !self.load.is_current(seq) {
            debug!(?seq, "ready handler discarded: load superseded");
            return;
        }
        if self.frame.ready_state() == ReadyState::Complete {
            handler();
            return;
        }
        self.pending_ready
            .lock()
            .unwrap()
            .push((seq, Box::new(handler)));
    }

    /// Host reports that the frame finished loading `seq`. Stale
    /// notifications are discarded; current ones fire pending handlers.
    pub fn frame_loaded(&self, seq: LoadSeq) {
        if !self.load.is_current(seq) {
            debug!(?seq, "load notification discarded: superseded");
            return;
        }
        // Anything queued for an earlier load is stale by definition and
        // dropped alongside firing the current handlers.
        let ready: Vec<Box<dyn FnOnce() + Send>> = {
            let mut pending = self.pending_ready.lock().unwrap();
            pending
                .drain(..)
                .filter(|(s, _)| *s == seq)
                .map(|(_, h)| h)
                .collect()
        };
        for handler in ready {
            handler();
        }
    }

    /// Cancel relays and pending ready handlers. Must run before the
    /// owning page is torn down so nothing fires into a dead controller.
    pub fn shutdown(&self) {
        for (name, handle) in self.relays.lock().unwrap().drain(..) {
            debug!(event_type = %name, "cancelling event relay");
            handle.abort();
        }
        self.pending_ready.lock().unwrap().clear();
        self.handlers.lock().unwrap().clear();
    }
}

impl Drop for MessageBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}
