//! Pref storage and change observation for the new-tab subsystem.
//!
//! The host configuration store is modeled by [`PrefStore`]: a keyed store
//! of typed values that notifies registered observers synchronously on every
//! mutation. [`PrefsProvider`] is the observer bridge consumed by the page
//! controller and the message bridge built-ins: scoped tracking plus
//! per-key `on`/`once`/`off` registration.
//!
//! Prefs persist as a TOML file (watched for external edits) the same way
//! the rest of the host persists configuration.

pub mod file;
pub mod keys;
pub mod provider;
pub mod reload;
pub mod store;
pub mod watcher;

pub use provider::{HandlerId, PrefsProvider};
pub use reload::ReloadManager;
pub use store::{PrefStore, PrefValue};
pub use watcher::PrefsWatcher;
