//! In-process frame and host-channel endpoints.
//!
//! Used by the demo host and by tests: a [`LoopbackFrame`] records every
//! message posted into it (enforcing postMessage origin semantics) and a
//! [`LoopbackHost`] records every command forwarded outward.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use freshtab_common::BridgeError;
use serde_json::Value;
use tracing::debug;

use crate::command::FrameMessage;
use crate::frame::{Frame, HostChannel, ReadyState};
use crate::location::origin_of;

/// A frame endpoint backed by in-process buffers.
pub struct LoopbackFrame {
    url: Mutex<String>,
    origin: Mutex<String>,
    ready: Mutex<ReadyState>,
    posted: Mutex<Vec<FrameMessage>>,
    dropped: AtomicUsize,
}

impl LoopbackFrame {
    /// A frame already displaying `url` with a complete document.
    pub fn new(url: &str) -> Self {
        Self {
            url: Mutex::new(url.to_string()),
            origin: Mutex::new(origin_of(url)),
            ready: Mutex::new(ReadyState::Complete),
            posted: Mutex::new(Vec::new()),
            dropped: AtomicUsize::new(0),
        }
    }

    /// Start a navigation: the document goes back to `Loading` and the
    /// frame's origin becomes that of the new URL.
    pub fn navigate(&self, url: &str) {
        *self.url.lock().unwrap() = url.to_string();
        *self.origin.lock().unwrap() = origin_of(url);
        *self.ready.lock().unwrap() = ReadyState::Loading;
    }

    /// Complete the pending navigation.
    pub fn finish_load(&self) {
        *self.ready.lock().unwrap() = ReadyState::Complete;
    }

    /// Messages delivered so far, clearing the buffer.
    pub fn drain_posted(&self) -> Vec<FrameMessage> {
        std::mem::take(&mut *self.posted.lock().unwrap())
    }

    /// How many messages were dropped for origin mismatch.
    pub fn dropped_count(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }
}

impl Frame for LoopbackFrame {
    fn post_message(
        &self,
        message: &FrameMessage,
        target_origin: &str,
    ) -> Result<(), BridgeError> {
        // postMessage semantics: delivery requires the document's actual
        // origin to match the sender's expected origin.
        let own_origin = self.origin.lock().unwrap().clone();
        if target_origin != own_origin {
            debug!(
                expected = target_origin,
                actual = %own_origin,
                name = %message.name,
                "message dropped: origin mismatch"
            );
            self.dropped.fetch_add(1, Ordering::SeqCst);
            return Ok(());
        }
        self.posted.lock().unwrap().push(message.clone());
        Ok(())
    }

    fn current_url(&self) -> String {
        self.url.lock().unwrap().clone()
    }

    fn ready_state(&self) -> ReadyState {
        *self.ready.lock().unwrap()
    }
}

/// A host channel backed by an in-process buffer, with a switchable
/// failure mode for exercising fire-and-forget forwarding.
#[derive(Default)]
pub struct LoopbackHost {
    sent: Mutex<Vec<(String, Value)>>,
    failing: AtomicBool,
}

impl LoopbackHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Commands forwarded so far, clearing the buffer.
    pub fn drain_sent(&self) -> Vec<(String, Value)> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }
}

impl HostChannel for LoopbackHost {
    fn send(&self, name: &str, data: Value) -> Result<(), BridgeError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BridgeError::ChannelError("loopback host failing".into()));
        }
        self.sent.lock().unwrap().push((name.to_string(), data));
        Ok(())
    }
}
