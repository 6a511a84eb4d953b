//! Event bus seam and the in-process implementation.

use super::envelope::{EventEnvelope, Topic, TournamentEvent};
use super::errors::{BusError, BusResult};
use async_trait::async_trait;
use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tokio::sync::{Mutex, mpsc};

/// Stream of envelopes delivered to one consumer group on one topic
pub struct Subscription {
    topic: Topic,
    receiver: mpsc::UnboundedReceiver<EventEnvelope>,
}

impl Subscription {
    pub fn new(topic: Topic, receiver: mpsc::UnboundedReceiver<EventEnvelope>) -> Self {
        Self { topic, receiver }
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Next envelope in publish order, `None` once the bus is gone
    pub async fn next(&mut self) -> Option<EventEnvelope> {
        self.receiver.recv().await
    }
}

/// Ordered, durable, multi-consumer pub/sub log
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Append an envelope to `topic` under partition `key`
    async fn publish(&self, topic: Topic, key: &str, envelope: EventEnvelope) -> BusResult<()>;

    /// Join consumer group `group` on `topic`
    async fn subscribe(&self, topic: Topic, group: &str) -> BusResult<Subscription>;

    /// Wrap `event` in a fresh envelope and publish it to its topic, keyed by
    /// tournament id
    async fn emit(&self, event: TournamentEvent) -> BusResult<EventEnvelope> {
        let envelope = EventEnvelope::new(&event)?;
        let key = event.tournament_id().to_string();
        self.publish(event.topic(), &key, envelope.clone()).await?;
        Ok(envelope)
    }
}

/// Envelopes kept per topic by [`MemoryBus::new`]
pub const DEFAULT_RETENTION: usize = 10_000;

#[derive(Default)]
struct TopicLog {
    entries: VecDeque<EventEnvelope>,
    groups: HashMap<String, mpsc::UnboundedSender<EventEnvelope>>,
}

/// In-process bus with one log per topic.
///
/// Each log keeps the newest `retention` envelopes and drops older ones. A
/// group joining late is replayed only what is still retained. Groups that
/// are already subscribed receive every event regardless. Clones share state.
#[derive(Clone)]
pub struct MemoryBus {
    topics: Arc<Mutex<HashMap<Topic, TopicLog>>>,
    unavailable: Arc<AtomicBool>,
    retention: usize,
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `retention` envelopes per topic (at least one)
    pub fn with_retention(retention: usize) -> Self {
        Self {
            topics: Arc::default(),
            unavailable: Arc::default(),
            retention: retention.max(1),
        }
    }

    /// Simulate a broker outage: publish and subscribe fail while unavailable
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Retained envelopes of `topic`, oldest first
    pub async fn published(&self, topic: Topic) -> Vec<EventEnvelope> {
        self.topics
            .lock()
            .await
            .get(&topic)
            .map(|log| log.entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Published envelopes of one event type across all topics
    pub async fn published_of_type(&self, event_type: &str) -> Vec<EventEnvelope> {
        let topics = self.topics.lock().await;
        let mut found: Vec<EventEnvelope> = topics
            .values()
            .flat_map(|log| log.entries.iter())
            .filter(|env| env.event_type == event_type)
            .cloned()
            .collect();
        found.sort_by_key(|env| env.occurred_at);
        found
    }

    fn check(&self) -> BusResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(BusError::Unavailable("memory bus marked unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl EventBus for MemoryBus {
    async fn publish(&self, topic: Topic, key: &str, envelope: EventEnvelope) -> BusResult<()> {
        self.check()?;
        let mut topics = self.topics.lock().await;
        let log = topics.entry(topic).or_default();

        log.groups
            .retain(|_, sender| sender.send(envelope.clone()).is_ok());
        log.entries.push_back(envelope);
        while log.entries.len() > self.retention {
            log.entries.pop_front();
        }

        log::trace!("Published to {} (key {})", topic, key);
        Ok(())
    }

    async fn subscribe(&self, topic: Topic, group: &str) -> BusResult<Subscription> {
        self.check()?;
        let mut topics = self.topics.lock().await;
        let log = topics.entry(topic).or_default();

        let (sender, receiver) = mpsc::unbounded_channel();
        for envelope in &log.entries {
            // Receiver is still in scope, send cannot fail
            let _ = sender.send(envelope.clone());
        }
        log.groups.insert(group.to_string(), sender);

        Ok(Subscription::new(topic, receiver))
    }
}
