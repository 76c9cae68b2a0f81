//! Named host-side event streams.
//!
//! The host process exposes a number of notification streams (pref changes,
//! places mutations, page updates). The embedded frame subscribes to them by
//! name through the bridge's `NewTab:Register` command, so the bus is keyed
//! by topic rather than being a single typed channel.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::broadcast;

/// Well-known topic names.
pub mod topic {
    /// A tracked pref changed. Payload: `{ "topic": "pref-changed", "data": <key> }`.
    pub const PREF_CHANGED: &str = "pref-changed";
    /// The entire places history was cleared.
    pub const PLACES_CLEAR_HISTORY: &str = "places.clear-history";
    /// A single link record changed.
    pub const PLACES_LINK_CHANGED: &str = "places.link-changed";
    /// A bulk links change (e.g. frecency recalculation).
    pub const PLACES_MANY_LINKS_CHANGED: &str = "places.many-links-changed";
    /// Emitted by the scheduler for requests that require no refresh.
    /// Exists for test synchronization only.
    pub const UPDATE_SIGNAL: &str = "update-signal";
}

const CHANNEL_CAPACITY: usize = 64;

/// Topic-keyed broadcast bus. Channels are created lazily on first
/// subscribe or publish and live for the lifetime of the bus.
pub struct HostEvents {
    channels: Mutex<HashMap<String, broadcast::Sender<Value>>>,
}

impl HostEvents {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to a named stream. Future publishes on `topic` are
    /// delivered to the returned receiver.
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<Value> {
        let mut channels = self.channels.lock().unwrap();
        channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Publish onto a named stream. Returns the number of receivers that
    /// saw the event; zero when nobody is subscribed.
    pub fn publish(&self, topic: &str, value: Value) -> usize {
        let mut channels = self.channels.lock().unwrap();
        let sender = channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.send(value).unwrap_or(0)
    }
}

impl Default for HostEvents {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = HostEvents::new();
        let mut rx = bus.subscribe(topic::PREF_CHANGED);

        bus.publish(topic::PREF_CHANGED, json!({"data": "newtab.enabled"}));

        let value = rx.recv().await.unwrap();
        assert_eq!(value["data"], "newtab.enabled");
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let bus = HostEvents::new();
        let mut pref_rx = bus.subscribe(topic::PREF_CHANGED);
        let mut places_rx = bus.subscribe(topic::PLACES_CLEAR_HISTORY);

        bus.publish(topic::PLACES_CLEAR_HISTORY, Value::Null);

        assert!(places_rx.recv().await.is_ok());
        assert!(pref_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn multiple_subscribers_same_topic() {
        let bus = HostEvents::new();
        let mut rx1 = bus.subscribe("custom");
        let mut rx2 = bus.subscribe("custom");

        let count = bus.publish("custom", json!(1));
        assert_eq!(count, 2);

        assert_eq!(rx1.recv().await.unwrap(), json!(1));
        assert_eq!(rx2.recv().await.unwrap(), json!(1));
    }

    #[test]
    fn publish_without_subscribers_returns_zero() {
        let bus = HostEvents::new();
        assert_eq!(bus.publish("nobody-listening", Value::Null), 0);
    }
}
