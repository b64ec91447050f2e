//! Change feed for live-updating lists
//!
//! Writers publish a [`ChangeEvent`] per stored record. Readers hold a
//! [`Subscription`] for one collection; dropping it unsubscribes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, trace};
use uuid::Uuid;

/// Stored collections that publish changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    CommunityHalls,
    HallBookings,
    Events,
    EventBookings,
    CityUpdates,
    Feedback,
    ScanLogs,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::CommunityHalls => "communityHalls",
            Collection::HallBookings => "hallBookings",
            Collection::Events => "events",
            Collection::EventBookings => "eventBookings",
            Collection::CityUpdates => "cityUpdates",
            Collection::Feedback => "feedback",
            Collection::ScanLogs => "scanLogs",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub kind: ChangeKind,
    pub id: Uuid,
}

struct Subscriber {
    collection: Collection,
    sender: Sender<ChangeEvent>,
}

#[derive(Default)]
struct FeedInner {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<u64, Subscriber>>,
}

/// Cloneable publish/subscribe hub
#[derive(Clone, Default)]
pub struct ChangeFeed {
    inner: Arc<FeedInner>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in one collection
    pub fn subscribe(&self, collection: Collection) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel();

        if let Ok(mut subs) = self.inner.subscribers.lock() {
            subs.insert(id, Subscriber { collection, sender });
        }
        debug!(id, collection = collection.as_str(), "Subscribed to change feed");

        Subscription {
            id,
            collection,
            receiver,
            feed: Arc::clone(&self.inner),
        }
    }

    /// Deliver an event to every subscriber of its collection
    pub fn publish(&self, event: ChangeEvent) {
        let Ok(mut subs) = self.inner.subscribers.lock() else {
            return;
        };

        // A closed receiver means its Subscription is mid-drop
        subs.retain(|_, sub| {
            sub.collection != event.collection || sub.sender.send(event.clone()).is_ok()
        });
        trace!(collection = event.collection.as_str(), id = %event.id, "Published change");
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .map(|subs| subs.len())
            .unwrap_or(0)
    }
}

/// Handle for one live subscription. Released on drop.
pub struct Subscription {
    id: u64,
    collection: Collection,
    receiver: Receiver<ChangeEvent>,
    feed: Arc<FeedInner>,
}

impl Subscription {
    pub fn collection(&self) -> Collection {
        self.collection
    }

    /// Next pending event, if any
    pub fn try_next(&self) -> Option<ChangeEvent> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Wait up to `timeout` for the next event
    pub fn next_timeout(&self, timeout: Duration) -> Option<ChangeEvent> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Everything queued so far
    pub fn drain(&self) -> Vec<ChangeEvent> {
        self.receiver.try_iter().collect()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Ok(mut subs) = self.feed.subscribers.lock() {
            subs.remove(&self.id);
        }
        debug!(id = self.id, "Unsubscribed from change feed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(collection: Collection) -> ChangeEvent {
        ChangeEvent {
            collection,
            kind: ChangeKind::Added,
            id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_subscriber_receives_own_collection_only() {
        let feed = ChangeFeed::new();
        let sub = feed.subscribe(Collection::HallBookings);

        let booking = event(Collection::HallBookings);
        feed.publish(booking.clone());
        feed.publish(event(Collection::Feedback));

        assert_eq!(sub.drain(), vec![booking]);
        assert!(sub.try_next().is_none());
    }

    #[test]
    fn test_drop_unsubscribes() {
        let feed = ChangeFeed::new();
        let first = feed.subscribe(Collection::Events);
        let second = feed.subscribe(Collection::Events);
        assert_eq!(feed.subscriber_count(), 2);

        drop(first);
        assert_eq!(feed.subscriber_count(), 1);

        feed.publish(event(Collection::Events));
        assert!(second.try_next().is_some());
    }

    #[test]
    fn test_publish_without_subscribers() {
        let feed = ChangeFeed::new();
        feed.publish(event(Collection::CityUpdates));
        assert_eq!(feed.subscriber_count(), 0);
    }
}
