//! Page-side orchestration for the new-tab subsystem.
//!
//! [`UpdateScheduler`] coalesces grid-refresh requests for a hidden page
//! into a single deferred redraw; [`PageController`] owns the page
//! lifecycle and wires prefs, places notifications, telemetry, and the
//! message bridge together.

pub mod controller;
pub mod scheduler;
pub mod update;

pub use controller::PageController;
pub use scheduler::{UpdateScheduler, COALESCE_DELAY};
pub use update::{UpdateReason, UpdateRequest};
