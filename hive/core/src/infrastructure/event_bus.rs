// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
// Event Bus - Pub/Sub for Hive Domain Events
//
// In-memory event streaming using tokio broadcast channels, one channel per
// topic. Delivery order within a topic is FIFO; cross-topic ordering is
// unspecified. A subscriber that does not drain its channel promptly loses the
// oldest unread events once the per-subscriber capacity is exceeded; the drop
// is counted and exposed, not hidden. This is a deliberate lossy-broadcast
// policy, not a bug.
//
// The bus also keeps decayed frequency counters per (topic, urgency bucket)
// pair ("trail strength", ADR-122), consumed by the routing graph as a
// prioritization hint only — never for correctness.

use crate::domain::config::BusConfig;
use crate::domain::events::HiveEvent;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// A published event as seen by subscribers.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub topic: String,
    pub urgency: f64,
    pub payload: Value,
    pub published_at: DateTime<Utc>,
    /// Bus-wide publish sequence, for observability only.
    pub sequence: u64,
}

/// Errors that can occur when receiving events.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Event bus topic is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (oldest events were dropped)")]
    Lagged(u64),
}

/// Per-subscriber drop accounting, exposed through [`BusStats`].
#[derive(Debug, Clone)]
pub struct SubscriberStats {
    pub topic: String,
    pub subscriber: u64,
    pub dropped: u64,
}

#[derive(Debug, Clone, Default)]
pub struct BusStats {
    pub published: u64,
    pub dropped_total: u64,
    pub subscribers: Vec<SubscriberStats>,
}

struct Trail {
    strength: f64,
    updated_at: DateTime<Utc>,
}

/// In-process publish/subscribe broker with trail accounting.
pub struct EventBus {
    capacity: usize,
    trail_half_life: Duration,
    topics: DashMap<String, broadcast::Sender<Envelope>>,
    trails: DashMap<(String, u8), Trail>,
    drop_counters: DashMap<(String, u64), Arc<AtomicU64>>,
    sequence: AtomicU64,
    next_subscriber: AtomicU64,
}

impl EventBus {
    pub fn new(config: BusConfig) -> Self {
        Self {
            capacity: config.capacity.max(1),
            trail_half_life: config.trail_half_life,
            topics: DashMap::new(),
            trails: DashMap::new(),
            drop_counters: DashMap::new(),
            sequence: AtomicU64::new(0),
            next_subscriber: AtomicU64::new(0),
        }
    }

    /// Publish a payload to all current subscribers of `topic`.
    ///
    /// Returns the number of receivers the event was delivered to. Publishing
    /// to a topic with no subscribers is not an error; the event is dropped
    /// and only the trail counter records that it happened.
    pub fn publish(&self, topic: &str, payload: Value, urgency: f64) -> usize {
        self.sequence.fetch_add(1, Ordering::Relaxed);
        self.bump_trail(topic, urgency);

        let envelope = Envelope {
            topic: topic.to_string(),
            urgency,
            payload,
            published_at: Utc::now(),
            sequence: self.sequence.load(Ordering::Relaxed),
        };

        metrics::counter!("hive_bus_published").increment(1);

        let Some(sender) = self.topics.get(topic).map(|s| s.value().clone()) else {
            debug!(topic, "No subscribers for topic");
            return 0;
        };

        match sender.send(envelope) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!(topic, "All subscribers for topic have gone away");
                0
            }
        }
    }

    /// Publish a domain event under its canonical topic and urgency.
    pub fn publish_event(&self, event: &HiveEvent) -> usize {
        let payload = serde_json::to_value(event).unwrap_or(Value::Null);
        self.publish(event.topic(), payload, event.urgency())
    }

    /// Subscribe to a topic. Each subscription owns a bounded queue of
    /// `capacity` events; see the module docs for the overflow policy.
    pub fn subscribe(&self, topic: &str) -> Subscription {
        let sender = self
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone();

        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let dropped = Arc::new(AtomicU64::new(0));
        self.drop_counters
            .insert((topic.to_string(), id), Arc::clone(&dropped));

        Subscription {
            topic: topic.to_string(),
            receiver: sender.subscribe(),
            dropped,
        }
    }

    /// Active subscriber count for a topic.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .get(topic)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }

    /// Decayed trail strength for a `(topic, urgency)` pair.
    pub fn trail_strength(&self, topic: &str, urgency: f64) -> f64 {
        let key = (topic.to_string(), urgency_bucket(urgency));
        self.trails
            .get(&key)
            .map(|t| decayed(t.strength, Utc::now() - t.updated_at, self.trail_half_life))
            .unwrap_or(0.0)
    }

    pub fn stats(&self) -> BusStats {
        let mut stats = BusStats {
            published: self.sequence.load(Ordering::Relaxed),
            ..Default::default()
        };
        for entry in self.drop_counters.iter() {
            let (topic, subscriber) = entry.key().clone();
            let dropped = entry.value().load(Ordering::Relaxed);
            stats.dropped_total += dropped;
            stats.subscribers.push(SubscriberStats {
                topic,
                subscriber,
                dropped,
            });
        }
        stats
            .subscribers
            .sort_by(|a, b| (&a.topic, a.subscriber).cmp(&(&b.topic, b.subscriber)));
        stats
    }

    fn bump_trail(&self, topic: &str, urgency: f64) {
        let key = (topic.to_string(), urgency_bucket(urgency));
        let now = Utc::now();
        let half_life = self.trail_half_life;
        let mut trail = self.trails.entry(key).or_insert_with(|| Trail {
            strength: 0.0,
            updated_at: now,
        });
        trail.strength = decayed(trail.strength, now - trail.updated_at, half_life) + 1.0;
        trail.updated_at = now;
    }
}

/// Urgency bucketing: five bands over the clamped `[0, 1]` range.
fn urgency_bucket(urgency: f64) -> u8 {
    ((urgency.clamp(0.0, 1.0) * 4.0).floor() as u8).min(4)
}

/// Exponential half-life decay applied lazily on read and update.
fn decayed(strength: f64, elapsed: chrono::Duration, half_life: Duration) -> f64 {
    let half_life_secs = half_life.as_secs_f64();
    if half_life_secs <= 0.0 {
        return strength;
    }
    let elapsed_secs = elapsed.num_milliseconds().max(0) as f64 / 1000.0;
    strength * 0.5_f64.powf(elapsed_secs / half_life_secs)
}

/// Receiver half of a subscription, with drop accounting.
pub struct Subscription {
    topic: String,
    receiver: broadcast::Receiver<Envelope>,
    dropped: Arc<AtomicU64>,
}

impl Subscription {
    /// Receive the next event, blocking until one is available.
    ///
    /// A `Lagged` result means this subscriber fell behind and the oldest `n`
    /// unread events were discarded; the next call resumes from the oldest
    /// retained event.
    pub async fn recv(&mut self) -> Result<Envelope, BusError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => BusError::Closed,
            broadcast::error::RecvError::Lagged(n) => self.record_lag(n),
        })
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Result<Envelope, BusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => BusError::Empty,
            broadcast::error::TryRecvError::Closed => BusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => self.record_lag(n),
        })
    }

    /// Total events this subscription has lost to overflow.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn record_lag(&self, n: u64) -> BusError {
        self.dropped.fetch_add(n, Ordering::Relaxed);
        metrics::counter!("hive_bus_dropped").increment(n);
        warn!(topic = %self.topic, lagged = n, "Subscriber lagged; oldest events dropped");
        BusError::Lagged(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn small_bus(capacity: usize) -> EventBus {
        EventBus::new(BusConfig {
            capacity,
            trail_half_life: Duration::from_secs(60),
        })
    }

    #[tokio::test]
    async fn test_publish_subscribe_round_trip() {
        let bus = small_bus(16);
        let mut sub = bus.subscribe("swarm.round_completed");

        let delivered = bus.publish("swarm.round_completed", json!({"round": 1}), 0.5);
        assert_eq!(delivered, 1);

        let envelope = sub.recv().await.unwrap();
        assert_eq!(envelope.topic, "swarm.round_completed");
        assert_eq!(envelope.payload["round"], 1);
    }

    #[tokio::test]
    async fn test_fifo_within_topic() {
        let bus = small_bus(16);
        let mut sub = bus.subscribe("t");
        for i in 0..5 {
            bus.publish("t", json!(i), 0.1);
        }
        for i in 0..5 {
            assert_eq!(sub.recv().await.unwrap().payload, json!(i));
        }
    }

    #[tokio::test]
    async fn test_overflow_drops_oldest_and_counts() {
        let bus = small_bus(4);
        let mut sub = bus.subscribe("t");
        for i in 0..10 {
            bus.publish("t", json!(i), 0.1);
        }

        // First receive surfaces the lag.
        let err = sub.recv().await.unwrap_err();
        assert!(matches!(err, BusError::Lagged(6)));
        assert_eq!(sub.dropped(), 6);

        // Delivery resumes from the oldest retained event.
        assert_eq!(sub.recv().await.unwrap().payload, json!(6));

        let stats = bus.stats();
        assert_eq!(stats.dropped_total, 6);
        assert_eq!(stats.subscribers.len(), 1);
    }

    #[tokio::test]
    async fn test_no_subscribers_is_not_an_error() {
        let bus = small_bus(4);
        assert_eq!(bus.publish("nobody.home", json!(null), 0.0), 0);
    }

    #[tokio::test]
    async fn test_multiple_subscribers_each_receive() {
        let bus = small_bus(8);
        let mut a = bus.subscribe("t");
        let mut b = bus.subscribe("t");
        assert_eq!(bus.subscriber_count("t"), 2);

        assert_eq!(bus.publish("t", json!("x"), 0.5), 2);
        assert_eq!(a.recv().await.unwrap().payload, json!("x"));
        assert_eq!(b.recv().await.unwrap().payload, json!("x"));
    }

    #[tokio::test]
    async fn test_domain_event_uses_canonical_topic() {
        let bus = small_bus(8);
        let mut sub = bus.subscribe("routing.edges_pruned");
        let event = HiveEvent::EdgesPruned {
            pruned: 2,
            highways: 0,
            remaining: 5,
            pruned_at: Utc::now(),
        };
        assert_eq!(bus.publish_event(&event), 1);
        let envelope = sub.recv().await.unwrap();
        assert_eq!(envelope.payload["type"], "edges_pruned");
    }

    #[test]
    fn test_trail_accumulates_per_bucket() {
        let bus = small_bus(8);
        bus.publish("t", json!(1), 0.1);
        bus.publish("t", json!(2), 0.1);
        bus.publish("t", json!(3), 0.9);

        let low = bus.trail_strength("t", 0.1);
        let high = bus.trail_strength("t", 0.9);
        assert!(low > high);
        assert!(low > 1.5 && low <= 2.0);
        assert!(high > 0.5 && high <= 1.0);
        assert_eq!(bus.trail_strength("t", 0.5), 0.0);
    }

    #[test]
    fn test_decay_is_monotonic_without_publishes() {
        let half_life = Duration::from_secs(10);
        let fresh = decayed(8.0, chrono::Duration::zero(), half_life);
        let later = decayed(8.0, chrono::Duration::seconds(10), half_life);
        let much_later = decayed(8.0, chrono::Duration::seconds(30), half_life);
        assert_eq!(fresh, 8.0);
        assert!((later - 4.0).abs() < 1e-9);
        assert!(much_later < later);
    }

    #[test]
    fn test_urgency_buckets() {
        assert_eq!(urgency_bucket(0.0), 0);
        assert_eq!(urgency_bucket(0.24), 0);
        assert_eq!(urgency_bucket(0.5), 2);
        assert_eq!(urgency_bucket(1.0), 4);
        assert_eq!(urgency_bucket(7.0), 4);
        assert_eq!(urgency_bucket(-1.0), 0);
    }
}
