//! EventBus (C8): single-process pub/sub fan-out of worker lifecycle events.

use serde::Serialize;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Bounded channel capacity per subscriber. A subscriber slow enough to fill
/// this is dropped rather than back-pressuring the publisher.
const SUBSCRIBER_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    JobStarted,
    ChapterStarted,
    ChapterCompleted,
    JobCompleted,
    JobFailed,
    QueuePaused,
    QueueResumed,
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub event_type: EventType,
    pub data: serde_json::Value,
}

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<Event>,
}

#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: Mutex<u64>,
}

pub struct Subscription {
    pub id: u64,
    pub rx: mpsc::Receiver<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber and returns its receiving half.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        let id = *next_id;
        self.subscribers.lock().unwrap().push(Subscriber { id, tx });
        Subscription { id, rx }
    }

    pub fn unsubscribe(&self, id: u64) {
        self.subscribers.lock().unwrap().retain(|s| s.id != id);
    }

    /// Fans an event out to every subscriber in FIFO order per-publisher.
    /// Subscribers whose channel is full are dropped rather than awaited.
    pub fn publish(&self, event_type: EventType, data: serde_json::Value) {
        let event = Event { event_type, data };
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|s| match s.tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(subscriber_id = s.id, "event subscriber full, dropping");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_delivers_to_subscriber() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        bus.publish(EventType::JobStarted, serde_json::json!({"job_id": 1}));
        let event = sub.rx.recv().await.unwrap();
        assert_eq!(event.event_type, EventType::JobStarted);
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let sub = bus.subscribe();
        bus.unsubscribe(sub.id);
        bus.publish(EventType::JobFailed, serde_json::json!({}));
        assert_eq!(bus.subscribers.lock().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn full_subscriber_is_dropped_not_blocked() {
        let bus = EventBus::new();
        let sub = bus.subscribe();
        for _ in 0..SUBSCRIBER_CAPACITY {
            bus.publish(EventType::ChapterStarted, serde_json::json!({}));
        }
        // one more publish should observe the channel full and drop it
        bus.publish(EventType::ChapterStarted, serde_json::json!({}));
        assert_eq!(bus.subscribers.lock().unwrap().len(), 0);
        drop(sub);
    }
}
