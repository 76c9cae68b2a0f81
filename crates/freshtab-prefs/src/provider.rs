//! The observer bridge: per-key pref change subscriptions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::store::{ObserverId, PrefStore, PrefValue};

/// Token returned by `on`/`once`, used to deregister with `off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(uuid::Uuid);

impl HandlerId {
    fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

type KeyHandler = Arc<dyn Fn(&str, &PrefValue) + Send + Sync>;

struct Registration {
    id: HandlerId,
    handler: KeyHandler,
    once: bool,
}

#[derive(Default)]
struct Handlers {
    by_key: HashMap<String, Vec<Registration>>,
}

/// Translates store-wide change notifications into per-key handler calls.
///
/// Tracking is scoped: handlers only fire between `start_tracking` and
/// `stop_tracking`. Both calls are idempotent; a single `stop_tracking`
/// tears down the store subscription no matter how many times tracking
/// was started.
pub struct PrefsProvider {
    store: Arc<PrefStore>,
    handlers: Arc<Mutex<Handlers>>,
    tracking: Mutex<Option<ObserverId>>,
}

impl PrefsProvider {
    pub fn new(store: Arc<PrefStore>) -> Self {
        Self {
            store,
            handlers: Arc::new(Mutex::new(Handlers::default())),
            tracking: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<PrefStore> {
        &self.store
    }

    /// Attach to the store's notification stream. No-op if already tracking.
    pub fn start_tracking(&self) {
        let mut tracking = self.tracking.lock().unwrap();
        if tracking.is_some() {
            return;
        }
        let handlers = Arc::clone(&self.handlers);
        let id = self.store.add_observer(Arc::new(move |key, value| {
            Self::dispatch(&handlers, key, value);
        }));
        *tracking = Some(id);
        debug!("pref tracking started");
    }

    /// Detach from the store. No-op if not tracking. Registered handlers
    /// stay registered; they simply stop firing.
    pub fn stop_tracking(&self) {
        let mut tracking = self.tracking.lock().unwrap();
        if let Some(id) = tracking.take() {
            self.store.remove_observer(id);
            debug!("pref tracking stopped");
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking.lock().unwrap().is_some()
    }

    /// Register a handler for changes to `key`.
    pub fn on(
        &self,
        key: &str,
        handler: impl Fn(&str, &PrefValue) + Send + Sync + 'static,
    ) -> HandlerId {
        self.register(key, Arc::new(handler), false)
    }

    /// Register a handler that auto-deregisters after its first delivery.
    pub fn once(
        &self,
        key: &str,
        handler: impl Fn(&str, &PrefValue) + Send + Sync + 'static,
    ) -> HandlerId {
        self.register(key, Arc::new(handler), true)
    }

    /// Deregister a handler. Unknown ids are ignored.
    pub fn off(&self, key: &str, id: HandlerId) {
        let mut handlers = self.handlers.lock().unwrap();
        if let Some(regs) = handlers.by_key.get_mut(key) {
            regs.retain(|r| r.id != id);
        }
    }

    fn register(&self, key: &str, handler: KeyHandler, once: bool) -> HandlerId {
        let id = HandlerId::new();
        let mut handlers = self.handlers.lock().unwrap();
        handlers
            .by_key
            .entry(key.to_string())
            .or_default()
            .push(Registration { id, handler, once });
        id
    }

    fn dispatch(handlers: &Mutex<Handlers>, key: &str, value: &PrefValue) {
        // Collect matching handlers and drop once-registrations under the
        // lock, then invoke outside of it so handlers may re-register.
        let to_call: Vec<KeyHandler> = {
            let mut handlers = handlers.lock().unwrap();
            match handlers.by_key.get_mut(key) {
                Some(regs) => {
                    let to_call = regs.iter().map(|r| Arc::clone(&r.handler)).collect();
                    regs.retain(|r| !r.once);
                    to_call
                }
                None => return,
            }
        };
        for handler in to_call {
            handler(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counted_provider() -> (PrefsProvider, Arc<PrefStore>) {
        let store = Arc::new(PrefStore::new());
        (PrefsProvider::new(Arc::clone(&store)), store)
    }

    #[test]
    fn handler_fires_while_tracking() {
        let (provider, store) = counted_provider();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);

        provider.on(keys::ENABLED, move |_, _| {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        provider.start_tracking();

        store.set(keys::ENABLED, true);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handler_receives_key_and_new_value() {
        let (provider, store) = counted_provider();
        let seen = Arc::new(Mutex::new(None));
        let seen2 = Arc::clone(&seen);

        provider.on(keys::ROWS, move |key, value| {
            *seen2.lock().unwrap() = Some((key.to_string(), value.clone()));
        });
        provider.start_tracking();

        store.set(keys::ROWS, 4i64);
        assert_eq!(
            seen.lock().unwrap().clone(),
            Some((keys::ROWS.to_string(), PrefValue::Int(4)))
        );
    }

    #[test]
    fn no_delivery_before_tracking_or_after_stop() {
        let (provider, store) = counted_provider();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);

        provider.on(keys::ENABLED, move |_, _| {
            count2.fetch_add(1, Ordering::SeqCst);
        });

        store.set(keys::ENABLED, true);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        provider.start_tracking();
        store.set(keys::ENABLED, false);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        provider.stop_tracking();
        store.set(keys::ENABLED, true);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_tracking_after_repeated_starts_leaves_nothing_leaked() {
        let (provider, store) = counted_provider();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);

        provider.on(keys::ENABLED, move |_, _| {
            count2.fetch_add(1, Ordering::SeqCst);
        });

        provider.start_tracking();
        provider.start_tracking();
        provider.start_tracking();

        store.set(keys::ENABLED, true);
        // Repeated starts do not multiply deliveries.
        assert_eq!(count.load(Ordering::SeqCst), 1);

        provider.stop_tracking();
        assert!(!provider.is_tracking());
        store.set(keys::ENABLED, false);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Extra stops are harmless.
        provider.stop_tracking();
    }

    #[test]
    fn once_fires_exactly_one_time() {
        let (provider, store) = counted_provider();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);

        provider.once(keys::ENHANCED, move |_, _| {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        provider.start_tracking();

        store.set(keys::ENHANCED, true);
        store.set(keys::ENHANCED, false);
        store.set(keys::ENHANCED, true);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn off_deregisters_handler() {
        let (provider, store) = counted_provider();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);

        let id = provider.on(keys::ENABLED, move |_, _| {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        provider.start_tracking();

        provider.off(keys::ENABLED, id);
        store.set(keys::ENABLED, true);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handlers_are_keyed() {
        let (provider, store) = counted_provider();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::clone(&count);

        provider.on(keys::ROWS, move |_, _| {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        provider.start_tracking();

        store.set(keys::COLUMNS, 6i64);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        store.set(keys::ROWS, 2i64);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
