//! Update request wire type.

use freshtab_common::WindowId;
use serde::{Deserialize, Serialize};

/// Why a grid refresh was requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateReason {
    LinksChanged,
    Other(String),
}

/// A request to refresh a page's grid, typically fanned out to every open
/// page when history or pin/block state changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    /// The window that triggered the request, if any. A page skips
    /// requests originating from its own window; its grid already reflects
    /// the change that caused them.
    #[serde(rename = "outerWindowID", skip_serializing_if = "Option::is_none")]
    pub outer_window_id: Option<WindowId>,
    /// Whether the grid actually needs redrawing. Signal-only requests
    /// exist for test synchronization.
    pub refresh_page: bool,
    pub reason: UpdateReason,
}

impl UpdateRequest {
    /// A request that requires a grid refresh.
    pub fn refresh(reason: UpdateReason) -> Self {
        Self {
            outer_window_id: None,
            refresh_page: true,
            reason,
        }
    }

    /// A signal-only request that never triggers a redraw.
    pub fn signal(reason: UpdateReason) -> Self {
        Self {
            outer_window_id: None,
            refresh_page: false,
            reason,
        }
    }

    pub fn from_window(mut self, window_id: WindowId) -> Self {
        self.outer_window_id = Some(window_id);
        self
    }

    /// Whether this request needs an actual redraw. Links-changed requests
    /// always refresh; other reasons only when explicitly flagged.
    pub fn needs_refresh(&self) -> bool {
        self.refresh_page || self.reason == UpdateReason::LinksChanged
    }
}
