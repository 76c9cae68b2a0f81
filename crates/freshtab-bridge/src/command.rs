//! Wire types for bridge traffic.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Command names carried over the bridge. These are wire strings shared
/// with the frame scripts and must match exactly.
pub mod names {
    /// Frame asks the controller to record a telemetry probe.
    pub const UPDATE_TELEMETRY_PROBE: &str = "NewTab:UpdateTelemetryProbe";
    /// Frame subscribes to a named host event stream.
    pub const REGISTER: &str = "NewTab:Register";
    /// Frame requests a state snapshot.
    pub const GET_INITIAL_STATE: &str = "NewTab:GetInitialState";
    /// Host notification relayed into the frame.
    pub const OBSERVE: &str = "NewTab:Observe";
    /// Response to `GET_INITIAL_STATE`.
    pub const STATE: &str = "NewTab:State";
    /// Pin-state change pushed to the frame.
    pub const PIN_STATE: &str = "NewTab:PinState";
    /// Block-state change pushed to the frame.
    pub const BLOCK_STATE: &str = "NewTab:BlockState";
    /// Thumbnail URI resolved for a site.
    pub const THUMBNAIL_URI: &str = "NewTab:ThumbnailURI";
    /// Grid refresh request fanned out to all pages.
    pub const UPDATE_PAGES: &str = "NewTab:UpdatePages";
    /// Frame reports tile view/click actions (forwarded outward).
    pub const REPORT_SITES_ACTION: &str = "NewTab:ReportSitesAction";
    /// Handshake: host delivers the remote location bootstrap data.
    pub const FRAME_INIT: &str = "NewTabFrame:init";
    /// Handshake: controller requests the bootstrap data.
    pub const FRAME_GET_INIT: &str = "NewTabFrame:GetInit";
    /// Dispatched into the frame once the command channel is wired.
    pub const COMMAND_READY: &str = "NewTabCommandReady";
}

/// An inbound command raised by the frame, the `detail` of its custom
/// command event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameCommand {
    pub command: String,
    #[serde(default)]
    pub data: Value,
}

impl FrameCommand {
    /// Parse a command from a raw JSON event detail.
    pub fn from_json(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    pub fn new(command: impl Into<String>, data: Value) -> Self {
        Self {
            command: command.into(),
            data,
        }
    }
}

/// An outbound message posted into the frame's window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameMessage {
    pub name: String,
    #[serde(default)]
    pub data: Value,
}

impl FrameMessage {
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}
