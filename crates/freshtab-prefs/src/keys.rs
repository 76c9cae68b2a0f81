//! Well-known pref keys consumed by this subsystem.

/// Whether the new-tab page feature is enabled at all.
pub const ENABLED: &str = "newtab.enabled";
/// Whether enhanced (suggested) tiles are shown.
pub const ENHANCED: &str = "newtab.enhanced";
/// Grid rows.
pub const ROWS: &str = "newtab.rows";
/// Grid columns.
pub const COLUMNS: &str = "newtab.columns";
/// Whether the intro panel has already been shown.
pub const INTRO_SHOWN: &str = "newtab.intro-shown";
/// Whether the remote (CDN-hosted) page is enabled.
pub const REMOTE_ENABLED: &str = "newtab.remote";
/// Whether the locale should follow the OS locale.
pub const MATCH_OS_LOCALE: &str = "locale.match-os";
/// The user-selected locale string.
pub const SELECTED_LOCALE: &str = "locale.selected";

/// Every key this subsystem tracks, in stable order.
pub const TRACKED: &[&str] = &[
    ENABLED,
    ENHANCED,
    ROWS,
    COLUMNS,
    INTRO_SHOWN,
    REMOTE_ENABLED,
    MATCH_OS_LOCALE,
    SELECTED_LOCALE,
];
