//! In-memory keyed pref store with synchronous change notification.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::keys;

/// A single pref value. Untagged so TOML/JSON scalars map directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl PrefValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PrefValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PrefValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PrefValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for PrefValue {
    fn from(b: bool) -> Self {
        PrefValue::Bool(b)
    }
}

impl From<i64> for PrefValue {
    fn from(i: i64) -> Self {
        PrefValue::Int(i)
    }
}

impl From<&str> for PrefValue {
    fn from(s: &str) -> Self {
        PrefValue::Str(s.to_string())
    }
}

/// Identifies one store-level observer registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverId(u64);

type Observer = std::sync::Arc<dyn Fn(&str, &PrefValue) + Send + Sync>;

/// The pref store. Stands in for the host configuration store: typed
/// get/set plus observer registration. Observers run synchronously on the
/// mutating call, in registration order, with no batching.
pub struct PrefStore {
    values: Mutex<HashMap<String, PrefValue>>,
    observers: Mutex<Vec<(ObserverId, Observer)>>,
    next_observer: Mutex<u64>,
}

impl PrefStore {
    /// An empty store.
    pub fn new() -> Self {
        Self {
            values: Mutex::new(HashMap::new()),
            observers: Mutex::new(Vec::new()),
            next_observer: Mutex::new(0),
        }
    }

    /// A store pre-populated with this subsystem's default prefs.
    pub fn with_defaults() -> Self {
        let store = Self::new();
        {
            let mut values = store.values.lock().unwrap();
            values.insert(keys::ENABLED.into(), PrefValue::Bool(true));
            values.insert(keys::ENHANCED.into(), PrefValue::Bool(false));
            values.insert(keys::ROWS.into(), PrefValue::Int(3));
            values.insert(keys::COLUMNS.into(), PrefValue::Int(5));
            values.insert(keys::INTRO_SHOWN.into(), PrefValue::Bool(false));
            values.insert(keys::REMOTE_ENABLED.into(), PrefValue::Bool(false));
            values.insert(keys::MATCH_OS_LOCALE.into(), PrefValue::Bool(true));
            values.insert(keys::SELECTED_LOCALE.into(), PrefValue::Str("en-US".into()));
        }
        store
    }

    pub fn get(&self, key: &str) -> Option<PrefValue> {
        self.values.lock().unwrap().get(key).cloned()
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
    }

    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.get(key).and_then(|v| v.as_int()).unwrap_or(default)
    }

    pub fn get_str(&self, key: &str, default: &str) -> String {
        self.get(key)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| default.to_string())
    }

    /// Set a pref. Observers fire only when the stored value actually
    /// changes; re-setting the current value is a no-op.
    pub fn set(&self, key: &str, value: impl Into<PrefValue>) {
        let value = value.into();
        {
            let mut values = self.values.lock().unwrap();
            if values.get(key) == Some(&value) {
                return;
            }
            values.insert(key.to_string(), value.clone());
        }
        debug!(key, ?value, "pref changed");
        self.notify(key, &value);
    }

    /// Replace all values at once (used by file reload). Observers fire
    /// once per key whose value differs from the current one.
    pub fn replace_all(&self, new_values: HashMap<String, PrefValue>) {
        let changed: Vec<(String, PrefValue)> = {
            let mut values = self.values.lock().unwrap();
            let changed = new_values
                .iter()
                .filter(|(k, v)| values.get(*k) != Some(v))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            *values = new_values;
            changed
        };
        for (key, value) in &changed {
            self.notify(key, value);
        }
    }

    /// Snapshot of the current values.
    pub fn snapshot(&self) -> HashMap<String, PrefValue> {
        self.values.lock().unwrap().clone()
    }

    /// Register a store-wide observer, called for every pref change.
    pub fn add_observer(
        &self,
        observer: std::sync::Arc<dyn Fn(&str, &PrefValue) + Send + Sync>,
    ) -> ObserverId {
        let mut next = self.next_observer.lock().unwrap();
        let id = ObserverId(*next);
        *next += 1;
        self.observers.lock().unwrap().push((id, observer));
        id
    }

    /// Remove a previously registered observer. Unknown ids are ignored.
    pub fn remove_observer(&self, id: ObserverId) {
        self.observers.lock().unwrap().retain(|(oid, _)| *oid != id);
    }

    fn notify(&self, key: &str, value: &PrefValue) {
        // Clone the list so handlers may re-enter the store.
        let observers: Vec<Observer> = self
            .observers
            .lock()
            .unwrap()
            .iter()
            .map(|(_, o)| o.clone())
            .collect();
        for observer in observers {
            observer(key, value);
        }
    }
}

impl Default for PrefStore {
    fn default() -> Self {
        Self::with_defaults()
    }
}
