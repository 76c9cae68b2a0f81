//! The links provider: a capped snapshot of frecent sites plus host
//! notifications for the bridge to relay.

use std::sync::{Arc, Mutex};

use freshtab_common::{topic, HostEvents, LinkError};
use serde_json::json;
use tracing::debug;

use crate::link::{compare_links, Link};

/// The maximum number of links the provider retains.
const HISTORY_RESULTS_LIMIT: usize = 100;

/// Holds the current set of history links and publishes places
/// notifications onto the host event bus.
pub struct LinksProvider {
    events: Arc<HostEvents>,
    links: Mutex<Vec<Link>>,
}

impl LinksProvider {
    pub fn new(events: Arc<HostEvents>) -> Self {
        Self {
            events,
            links: Mutex::new(Vec::new()),
        }
    }

    /// Replace the link snapshot, truncating to the history limit, and
    /// notify subscribers that many links changed.
    pub fn set_links(&self, mut links: Vec<Link>) {
        links.truncate(HISTORY_RESULTS_LIMIT);
        let count = links.len();
        *self.links.lock().unwrap() = links;
        debug!(count, "links snapshot replaced");
        self.events
            .publish(topic::PLACES_MANY_LINKS_CHANGED, json!({ "count": count }));
    }

    /// Current snapshot, unsorted.
    pub fn links(&self) -> Vec<Link> {
        self.links.lock().unwrap().clone()
    }

    /// Current snapshot ordered by [`compare_links`].
    ///
    /// Every record is validated up front; a malformed record fails the
    /// whole call rather than being skipped.
    pub fn sorted_links(&self) -> Result<Vec<Link>, LinkError> {
        let mut links = self.links();
        // Validate first so the sort comparator cannot fail mid-flight.
        for link in &links {
            compare_links(link, link)?;
        }
        links.sort_by(|a, b| {
            // Safe: all records were validated above.
            compare_links(a, b).unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(links)
    }

    /// Record that a single link changed and notify subscribers.
    pub fn link_changed(&self, link: &Link) {
        self.events.publish(
            topic::PLACES_LINK_CHANGED,
            serde_json::to_value(link).unwrap_or(serde_json::Value::Null),
        );
    }

    /// Drop all links and notify subscribers that history was cleared.
    pub fn clear_history(&self) {
        self.links.lock().unwrap().clear();
        debug!("history cleared");
        self.events
            .publish(topic::PLACES_CLEAR_HISTORY, serde_json::Value::Null);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> (LinksProvider, Arc<HostEvents>) {
        let events = Arc::new(HostEvents::new());
        (LinksProvider::new(Arc::clone(&events)), events)
    }

    #[test]
    fn sorted_links_orders_by_recency() {
        let (provider, _events) = provider();
        provider.set_links(vec![
            Link::new("http://example.org/old", 10, 100),
            Link::new("http://example.org/new", 10, 300),
            Link::new("http://example.org/mid", 10, 200),
        ]);

        let sorted = provider.sorted_links().unwrap();
        let urls: Vec<_> = sorted.iter().map(|l| l.url.clone().unwrap()).collect();
        assert_eq!(
            urls,
            [
                "http://example.org/new",
                "http://example.org/mid",
                "http://example.org/old"
            ]
        );
    }

    #[test]
    fn sorted_links_propagates_malformed_record() {
        let (provider, _events) = provider();
        provider.set_links(vec![
            Link::new("http://example.org/ok", 10, 100),
            Link {
                url: Some("http://example.org/bad".into()),
                title: None,
                frecency: None,
                last_visit_date: Some(50),
            },
        ]);

        assert!(provider.sorted_links().is_err());
    }

    #[test]
    fn snapshot_is_capped() {
        let (provider, _events) = provider();
        let links = (0..150)
            .map(|i| Link::new(&format!("http://example.org/{i}"), 1, i))
            .collect();
        provider.set_links(links);
        assert_eq!(provider.links().len(), HISTORY_RESULTS_LIMIT);
    }

    #[tokio::test]
    async fn clear_history_publishes_notification() {
        let (provider, events) = provider();
        let mut rx = events.subscribe(topic::PLACES_CLEAR_HISTORY);

        provider.set_links(vec![Link::new("http://example.org/", 1, 1)]);
        provider.clear_history();

        assert!(rx.recv().await.is_ok());
        assert!(provider.links().is_empty());
    }

    #[tokio::test]
    async fn link_changed_publishes_the_record() {
        let (provider, events) = provider();
        let mut rx = events.subscribe(topic::PLACES_LINK_CHANGED);

        let link = Link::new("http://example.org/", 7, 42);
        provider.link_changed(&link);

        let value = rx.recv().await.unwrap();
        assert_eq!(value["url"], "http://example.org/");
        assert_eq!(value["lastVisitDate"], 42);
    }
}
