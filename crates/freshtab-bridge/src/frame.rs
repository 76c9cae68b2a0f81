//! Seams to the embedded frame and the outer host channel.
//!
//! The rendering engine owns the real frame; this subsystem only talks to
//! it through these traits. Production embedders wrap their engine's
//! document handle; tests and the demo host use [`crate::loopback`].

use freshtab_common::BridgeError;
use serde_json::Value;

use crate::command::FrameMessage;

/// Load state of the frame's document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Complete,
}

/// The embedded document endpoint.
pub trait Frame: Send + Sync {
    /// Post a message into the frame's window. `target_origin` is the
    /// origin the document is expected to have; the frame side must drop
    /// the message if its actual origin differs.
    fn post_message(&self, message: &FrameMessage, target_origin: &str)
        -> Result<(), BridgeError>;

    /// The URL the frame is currently displaying (best-effort).
    fn current_url(&self) -> String;

    /// Whether the document has finished loading.
    fn ready_state(&self) -> ReadyState;
}

/// Outward channel to the privileged host process. Forwarding is
/// transport, not RPC: there are no replies and the bridge swallows
/// send errors.
pub trait HostChannel: Send + Sync {
    fn send(&self, name: &str, data: Value) -> Result<(), BridgeError>;
}
