//! Core reload manager implementation.
//!
//! Loads the pref file, watches it for changes, and pushes reloaded values
//! into a shared [`PrefStore`] so registered observers see each change.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};

use crate::file;
use crate::store::{PrefStore, PrefValue};
use crate::watcher::PrefsWatcher;

/// Manages live pref reloading.
///
/// Watches the pref file for changes and applies new values to the store.
/// A [`tokio::sync::watch`] channel publishes each applied snapshot.
pub struct ReloadManager {
    prefs_path: PathBuf,
}

impl ReloadManager {
    /// Load initial prefs from the given path into a fresh store (defaults
    /// when the file is absent or malformed) and start watching for changes.
    ///
    /// The watcher runs in a background task. Returns the shared store and
    /// a watch receiver carrying each reloaded snapshot.
    pub async fn start(
        prefs_path: PathBuf,
    ) -> (Arc<PrefStore>, watch::Receiver<HashMap<String, PrefValue>>) {
        let store = Arc::new(PrefStore::with_defaults());

        match file::load_from_path(&prefs_path) {
            Ok(values) => store.replace_all(merged_with_defaults(&store, values)),
            Err(e) => {
                warn!("failed to load prefs: {e}, using defaults");
            }
        }

        let (snapshot_tx, snapshot_rx) = watch::channel(store.snapshot());

        let watch_path = prefs_path.clone();
        let watch_store = Arc::clone(&store);
        tokio::spawn(async move {
            let manager = ReloadManager {
                prefs_path: watch_path,
            };
            manager.run_watch_loop(watch_store, snapshot_tx).await;
        });

        (store, snapshot_rx)
    }

    async fn run_watch_loop(
        &self,
        store: Arc<PrefStore>,
        snapshot_tx: watch::Sender<HashMap<String, PrefValue>>,
    ) {
        let watcher = match PrefsWatcher::new(self.prefs_path.clone()) {
            Ok(w) => w,
            Err(e) => {
                error!("failed to create pref watcher: {e}");
                return;
            }
        };

        let (change_tx, mut change_rx) = broadcast::channel::<()>(16);

        tokio::spawn(async move {
            if let Err(e) = watcher.watch(change_tx).await {
                error!("pref watcher error: {e}");
            }
        });

        loop {
            match change_rx.recv().await {
                Ok(()) => {
                    info!("reloading prefs from {}", self.prefs_path.display());
                    match file::load_from_path(&self.prefs_path) {
                        Ok(values) => {
                            store.replace_all(merged_with_defaults(&store, values));
                            if snapshot_tx.send(store.snapshot()).is_err() {
                                info!("all pref receivers dropped, stopping reload manager");
                                break;
                            }
                        }
                        Err(e) => {
                            warn!("pref reload failed: {e}");
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("pref watcher lagged by {n} events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("pref watcher channel closed");
                    break;
                }
            }
        }
    }
}

/// Keys absent from the file keep their current (default) values.
fn merged_with_defaults(
    store: &PrefStore,
    loaded: HashMap<String, PrefValue>,
) -> HashMap<String, PrefValue> {
    let mut merged = store.snapshot();
    merged.extend(loaded);
    merged
}
