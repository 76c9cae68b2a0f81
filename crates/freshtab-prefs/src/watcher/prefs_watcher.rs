//! Watches the pref file for external edits using the `notify` crate,
//! with debounced change signals.

use std::path::PathBuf;
use std::sync::Arc;

use freshtab_common::PrefsError;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Debounce window for editors that do atomic save (write + rename).
const DEBOUNCE_MS: u64 = 500;

/// Watches a pref file for changes and sends notifications.
pub struct PrefsWatcher {
    path: PathBuf,
}

impl PrefsWatcher {
    /// Create a new watcher for the given pref file path.
    pub fn new(path: PathBuf) -> Result<Self, PrefsError> {
        if !path.exists() {
            warn!(
                "pref file {} does not exist yet, will watch for creation",
                path.display()
            );
        }
        Ok(Self { path })
    }

    /// Watch the pref file, sending `()` on the broadcast channel whenever
    /// a debounced change is detected. Runs until the channel closes.
    pub async fn watch(&self, tx: broadcast::Sender<()>) -> Result<(), PrefsError> {
        let path = self.path.clone();
        let watch_path = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| path.clone());

        let file_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();

        info!("starting pref file watcher for {}", path.display());

        // Bridge the sync notify callback into async.
        let (notify_tx, mut notify_rx) = tokio::sync::mpsc::channel::<()>(16);

        let _watcher = {
            let file_name = file_name.clone();

            let mut watcher = RecommendedWatcher::new(
                move |result: Result<Event, notify::Error>| match result {
                    Ok(event) => {
                        if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                            return;
                        }
                        let is_our_file = event
                            .paths
                            .iter()
                            .any(|p| p.file_name().map(|n| n == file_name).unwrap_or(false));
                        if is_our_file {
                            debug!("pref file change detected");
                            let _ = notify_tx.try_send(());
                        }
                    }
                    Err(e) => {
                        error!("file watcher error: {e}");
                    }
                },
                notify::Config::default(),
            )
            .map_err(|e| PrefsError::WatchError(format!("failed to create watcher: {e}")))?;

            watcher
                .watch(&watch_path, RecursiveMode::NonRecursive)
                .map_err(|e| {
                    PrefsError::WatchError(format!("failed to watch {}: {e}", watch_path.display()))
                })?;

            // Keep the watcher alive for the duration of the loop.
            Arc::new(watcher)
        };

        loop {
            if notify_rx.recv().await.is_none() {
                break;
            }

            // Debounce: drain additional signals within the window.
            let debounce = tokio::time::sleep(std::time::Duration::from_millis(DEBOUNCE_MS));
            tokio::pin!(debounce);
            loop {
                tokio::select! {
                    _ = &mut debounce => break,
                    msg = notify_rx.recv() => {
                        if msg.is_none() {
                            return Ok(());
                        }
                    }
                }
            }

            info!("pref file changed, sending reload signal");
            if tx.send(()).is_err() {
                debug!("no receivers for pref reload signal");
            }
        }

        Ok(())
    }
}
