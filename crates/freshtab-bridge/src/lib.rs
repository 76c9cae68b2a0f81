//! Message bridge between the privileged controller and the embedded
//! new-tab frame.
//!
//! Commands flow in both directions:
//! - **Frame -> controller**: the frame raises a custom event carrying
//!   `{command, data}`; every such event passes through
//!   [`MessageBridge::dispatch_from_frame`] exactly once, where it is either
//!   consumed by a built-in, handled by a registered local handler, or
//!   forwarded to the host process (fire-and-forget).
//! - **Controller -> frame**: [`MessageBridge::send_to_frame`] posts
//!   `{name, data}` against the frame's current expected origin, never a
//!   wildcard, so a navigated-away document cannot receive stale messages.

pub mod bridge;
pub mod command;
pub mod frame;
pub mod location;
pub mod loopback;
pub mod ready;
pub mod telemetry;

pub use bridge::{Dispatch, InitialState, MessageBridge, PageIdentity};
pub use command::{names, FrameCommand, FrameMessage};
pub use frame::{Frame, HostChannel, ReadyState};
pub use location::RemoteLocation;
pub use loopback::{LoopbackFrame, LoopbackHost};
pub use ready::{LoadSeq, LoadTracker};
pub use telemetry::{probes, Histograms, TelemetrySink};
