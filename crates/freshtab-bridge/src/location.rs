//! The frame's remote location: which URL the new-tab frame loads and
//! which origin the bridge accepts messages from.
//!
//! The effective URL is the local bundled page unless the remote pref is
//! on, in which case it is generated from version, update channel, and
//! locale. Explicit overrides beat both; `reset` returns to pref-driven
//! behavior. Every change is published on a watch channel.

use std::sync::{Arc, Mutex};

use freshtab_common::BridgeError;
use freshtab_prefs::{keys, HandlerId, PrefStore, PrefsProvider};
use tokio::sync::watch;
use tracing::{debug, info};
use url::{Origin, Url};

/// The bundled local page, served over the host's custom protocol.
pub const LOCAL_URL: &str = "freshtab://localhost/newtab/index.html";

const REMOTE_URL_TEMPLATE: &str =
    "https://newtab.cdn.example.net/v%VERSION%/%CHANNEL%/%LOCALE%/index.html";

const REMOTE_VERSION: &str = "0";

const VALID_CHANNELS: &[&str] = &["esr", "release", "beta", "aurora", "nightly"];

/// Map an update channel name to a release directory name. Unknown
/// channels fall back to `nightly`.
pub fn release_from_update_channel(channel: &str) -> &str {
    if VALID_CHANNELS.contains(&channel) {
        channel
    } else {
        "nightly"
    }
}

/// Expected-origin token for a URL. Custom-scheme URLs have an opaque
/// origin, so the full href stands in as the token.
pub(crate) fn origin_of(href: &str) -> String {
    match Url::parse(href) {
        Ok(url) => match url.origin() {
            Origin::Tuple(..) => url.origin().ascii_serialization(),
            Origin::Opaque(_) => href.to_string(),
        },
        Err(_) => href.to_string(),
    }
}

struct State {
    href: String,
    origin: String,
    overridden: bool,
    remote_enabled: bool,
}

/// The current frame location. Mutated only through `override_url`,
/// `reset`, and the pref reactions; read by the bridge on every send to
/// validate origins.
pub struct RemoteLocation {
    update_channel: String,
    prefs: Arc<PrefStore>,
    state: Mutex<State>,
    changes: watch::Sender<String>,
    tracked: Mutex<Vec<(&'static str, HandlerId)>>,
}

impl RemoteLocation {
    /// Build the location from the host's update channel and the pref
    /// store. Starts remote if the remote pref is already on.
    pub fn new(update_channel: &str, prefs: Arc<PrefStore>) -> Self {
        let (changes, _) = watch::channel(LOCAL_URL.to_string());
        let location = Self {
            update_channel: update_channel.to_string(),
            prefs,
            state: Mutex::new(State {
                href: LOCAL_URL.to_string(),
                origin: origin_of(LOCAL_URL),
                overridden: false,
                remote_enabled: false,
            }),
            changes,
            tracked: Mutex::new(Vec::new()),
        };
        let remote = location.prefs.get_bool(keys::REMOTE_ENABLED, false);
        location.toggle_remote(remote, true);
        location
    }

    pub fn href(&self) -> String {
        self.state.lock().unwrap().href.clone()
    }

    pub fn origin(&self) -> String {
        self.state.lock().unwrap().origin.clone()
    }

    pub fn overridden(&self) -> bool {
        self.state.lock().unwrap().overridden
    }

    pub fn remote_enabled(&self) -> bool {
        self.state.lock().unwrap().remote_enabled
    }

    /// Receiver that observes every location change.
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.changes.subscribe()
    }

    pub fn release_name(&self) -> &str {
        release_from_update_channel(&self.update_channel)
    }

    /// The remote URL for the current channel and locale prefs.
    pub fn generate_remote_url(&self) -> String {
        let locale = self.prefs.get_str(keys::SELECTED_LOCALE, "en-US");
        REMOTE_URL_TEMPLATE
            .replace("%VERSION%", REMOTE_VERSION)
            .replace("%CHANNEL%", self.release_name())
            .replace("%LOCALE%", &locale)
    }

    /// React to the remote pref. Only acts on a state change (unless
    /// forced) and never while overridden. Returns whether the location
    /// changed.
    pub fn toggle_remote(&self, enabled: bool, force: bool) -> bool {
        let href = {
            let mut state = self.state.lock().unwrap();
            if !force && (state.overridden || enabled == state.remote_enabled) {
                return false;
            }
            state.remote_enabled = enabled;
            state.href = if enabled {
                self.generate_remote_url()
            } else {
                LOCAL_URL.to_string()
            };
            state.origin = origin_of(&state.href);
            state.href.clone()
        };
        info!(remote = enabled, href = %href, "new-tab location toggled");
        self.changes.send_replace(href);
        true
    }

    /// Regenerate the remote URL after a dependent pref change. No-op
    /// while remote is off or the location is overridden.
    pub fn update_remote_maybe(&self) {
        let changed = {
            let mut state = self.state.lock().unwrap();
            if !state.remote_enabled || state.overridden {
                return;
            }
            let url = self.generate_remote_url();
            if url == state.href {
                None
            } else {
                state.href = url.clone();
                state.origin = origin_of(&url);
                Some(url)
            }
        };
        if let Some(href) = changed {
            info!(href = %href, "remote new-tab location updated");
            self.changes.send_replace(href);
        }
    }

    /// Point the frame at an explicit URL, disabling pref-driven remote
    /// switching until `reset`. Overriding with the current default is
    /// treated as a reset.
    pub fn override_url(&self, href: &str) -> Result<(), BridgeError> {
        let href = href.trim();
        if href.is_empty() {
            return Err(BridgeError::InvalidLocation("empty url".into()));
        }
        if href == LOCAL_URL || href == self.generate_remote_url() {
            if self.overridden() {
                self.reset();
            }
            return Ok(());
        }
        Url::parse(href).map_err(|e| BridgeError::InvalidLocation(format!("{href}: {e}")))?;

        {
            let mut state = self.state.lock().unwrap();
            state.remote_enabled = false;
            state.overridden = true;
            state.href = href.to_string();
            state.origin = origin_of(href);
        }
        info!(href, "new-tab location overridden");
        self.changes.send_replace(href.to_string());
        Ok(())
    }

    /// Clear any override and return to the pref-driven location.
    pub fn reset(&self) {
        {
            let mut state = self.state.lock().unwrap();
            state.overridden = false;
        }
        let remote = self.prefs.get_bool(keys::REMOTE_ENABLED, false);
        self.toggle_remote(remote, true);
        debug!("new-tab location reset");
    }

    /// Register pref handlers that keep the location in sync with the
    /// remote and locale prefs.
    pub fn track(self: &Arc<Self>, provider: &PrefsProvider) {
        let mut tracked = self.tracked.lock().unwrap();
        if !tracked.is_empty() {
            return;
        }

        let loc = Arc::clone(self);
        tracked.push((
            keys::REMOTE_ENABLED,
            provider.on(keys::REMOTE_ENABLED, move |_, value| {
                loc.toggle_remote(value.as_bool().unwrap_or(false), false);
            }),
        ));

        for key in [keys::SELECTED_LOCALE, keys::MATCH_OS_LOCALE] {
            let loc = Arc::clone(self);
            tracked.push((
                key,
                provider.on(key, move |_, _| {
                    loc.update_remote_maybe();
                }),
            ));
        }
    }

    /// Deregister the handlers installed by `track`.
    pub fn untrack(&self, provider: &PrefsProvider) {
        for (key, id) in self.tracked.lock().unwrap().drain(..) {
            provider.off(key, id);
        }
    }
}
