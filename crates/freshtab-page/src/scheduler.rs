//! Coalesced grid-refresh scheduling.
//!
//! A backgrounded page must not redraw once per history mutation; requests
//! arriving while the page is hidden collapse into a single deferred
//! refresh. The flush re-reads current state, so dropping all but the
//! first request within the window loses nothing.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use freshtab_common::{topic, HostEvents, Visibility, WindowId};
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::update::UpdateRequest;

/// The fixed coalescing window. Starts at the first deferred request;
/// later requests inside the window do not extend it.
pub const COALESCE_DELAY: Duration = Duration::from_millis(1000);

type ApplyFn = Arc<dyn Fn() + Send + Sync>;

struct State {
    visibility: Visibility,
    timer: Option<JoinHandle<()>>,
    closed: bool,
}

/// Coalesces refresh requests for one page instance.
pub struct UpdateScheduler {
    own_window: WindowId,
    events: Arc<HostEvents>,
    apply: ApplyFn,
    state: Arc<Mutex<State>>,
}

impl UpdateScheduler {
    /// `apply` performs the actual grid refresh. It re-reads current state
    /// when invoked, so the scheduler never carries a payload into it.
    pub fn new(
        own_window: WindowId,
        events: Arc<HostEvents>,
        apply: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self {
            own_window,
            events,
            apply: Arc::new(apply),
            state: Arc::new(Mutex::new(State {
                visibility: Visibility::Hidden,
                timer: None,
                closed: false,
            })),
        }
    }

    /// Handle one refresh request.
    ///
    /// Requests from this page's own window, and requests that need no
    /// redraw, only emit an `update-signal` event. Otherwise the refresh
    /// runs synchronously when visible, or is deferred behind the
    /// coalescing timer when hidden; at most one timer exists at a time.
    pub fn request_update(&self, req: &UpdateRequest) {
        if req.outer_window_id == Some(self.own_window) || !req.needs_refresh() {
            debug!(reason = ?req.reason, "update request skipped");
            self.events
                .publish(topic::UPDATE_SIGNAL, json!({ "reason": req.reason.clone() }));
            return;
        }

        let mut state = self.state.lock().unwrap();
        if state.closed {
            return;
        }
        if state.visibility.is_visible() {
            drop(state);
            debug!(reason = ?req.reason, "applying refresh immediately");
            (self.apply)();
            return;
        }
        if state.timer.is_some() {
            debug!(reason = ?req.reason, "coalesced into pending refresh");
            return;
        }

        debug!(reason = ?req.reason, delay_ms = COALESCE_DELAY.as_millis() as u64, "refresh deferred");
        // The window is anchored here, not at the task's first poll.
        let deadline = tokio::time::Instant::now() + COALESCE_DELAY;
        let apply = Arc::clone(&self.apply);
        let shared = Arc::clone(&self.state);
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            {
                let mut state = shared.lock().unwrap();
                // The visibility handler or shutdown may have flushed or
                // cancelled while the sleep was completing.
                if state.timer.take().is_none() || state.closed {
                    return;
                }
            }
            debug!("coalesced refresh firing");
            apply();
        }));
    }

    /// Report a visibility change. Turning visible with a timer pending
    /// flushes immediately; the cancelled timer never fires.
    pub fn set_visibility(&self, visibility: Visibility) {
        let pending = {
            let mut state = self.state.lock().unwrap();
            let was_visible = state.visibility.is_visible();
            state.visibility = visibility;
            if visibility.is_visible() && !was_visible {
                state.timer.take()
            } else {
                None
            }
        };
        if let Some(timer) = pending {
            timer.abort();
            debug!("visibility flush: applying pending refresh now");
            (self.apply)();
        }
    }

    pub fn visibility(&self) -> Visibility {
        self.state.lock().unwrap().visibility
    }

    /// Cancel any pending timer and refuse further requests. Safe to call
    /// repeatedly.
    pub fn shutdown(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        if let Some(timer) = state.timer.take() {
            timer.abort();
            debug!("pending refresh cancelled on shutdown");
        }
    }
}

impl Drop for UpdateScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
