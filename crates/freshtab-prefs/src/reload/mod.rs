//! Live pref reloading from disk.

mod manager;

pub use manager::ReloadManager;
