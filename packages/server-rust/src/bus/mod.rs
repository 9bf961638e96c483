//! Topic-based event bus.
//!
//! Store mutations become [`DataEvent`]s published to named topics; any
//! number of subscribers per topic each get their own channel. Publishing
//! never blocks and never spawns per-publication tasks: each subscription
//! pairs an unbounded ingress with one long-lived forwarder task that sends
//! synchronously into the subscriber's bounded channel, so a slow consumer
//! backpressures only its own forwarder. Dead subscriptions are pruned
//! lazily on the next publish to their topic.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use rapido_core::Value;
use tokio::sync::mpsc;

/// One event flowing through the bus: which topic it was published under,
/// the key that was touched, and the value involved.
///
/// `Display` is the exact line pushed to subscribed clients.
#[derive(Debug, Clone, PartialEq)]
pub struct DataEvent {
    pub topic: String,
    pub key: String,
    pub value: Value,
}

impl DataEvent {
    /// Creates an event for `topic`.
    #[must_use]
    pub fn new(topic: impl Into<String>, key: impl Into<String>, value: Value) -> Self {
        Self {
            topic: topic.into(),
            key: key.into(),
            value,
        }
    }
}

impl fmt::Display for DataEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key: {} Value: {}", self.key, self.value)
    }
}

/// Topic -> subscriber channel broker.
///
/// Buses are constructed explicitly and passed through the composition
/// root; the server owns one global bus plus one private bus per
/// connection.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<HashMap<String, Vec<mpsc::UnboundedSender<DataEvent>>>>,
}

impl EventBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscription under `topic` and returns its receiving
    /// end, a bounded channel of at least capacity 1.
    ///
    /// Spawns the subscription's forwarder task, so this must be called
    /// from within a tokio runtime. The registration lives until the
    /// returned receiver is dropped.
    pub fn subscribe(&self, topic: &str, capacity: usize) -> mpsc::Receiver<DataEvent> {
        let (ingress_tx, mut ingress_rx) = mpsc::unbounded_channel();
        let (egress_tx, egress_rx) = mpsc::channel(capacity.max(1));

        tokio::spawn(async move {
            while let Some(event) = ingress_rx.recv().await {
                if egress_tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        self.subscribers
            .write()
            .entry(topic.to_string())
            .or_default()
            .push(ingress_tx);

        egress_rx
    }

    /// Publishes `event` to every subscription of `topic`.
    ///
    /// A topic without subscribers is a no-op. Delivery preserves
    /// publication order per subscription. Subscriptions whose receiver is
    /// gone are dropped here.
    pub fn publish(&self, topic: &str, event: &DataEvent) {
        let mut table = self.subscribers.write();
        let Some(subs) = table.get_mut(topic) else {
            return;
        };

        subs.retain(|tx| tx.send(event.clone()).is_ok());
        if subs.is_empty() {
            table.remove(topic);
        }
    }

    /// Number of live registrations under `topic`.
    ///
    /// Counts whatever the last publish has not yet pruned.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscribers.read().get(topic).map_or(0, Vec::len)
    }

    /// Fans several topics into one channel of at least capacity 1.
    ///
    /// Per-source arrival order is preserved; ordering across sources is
    /// unspecified. The fan-in tasks exit when the returned receiver is
    /// dropped.
    pub fn multiplex(&self, capacity: usize, topics: &[&str]) -> mpsc::Receiver<DataEvent> {
        let (tx, rx) = mpsc::channel(capacity.max(1));

        for topic in topics {
            let mut source = self.subscribe(topic, capacity);
            let tx = tx.clone();
            tokio::spawn(async move {
                while let Some(event) = source.recv().await {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
            });
        }

        rx
    }
}
