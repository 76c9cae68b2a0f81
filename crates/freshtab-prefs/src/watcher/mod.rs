//! Pref file watching.

mod prefs_watcher;

pub use prefs_watcher::PrefsWatcher;
