//! Broadcast hub implementation
//!
//! Owns the set of active subscribers and fans every record out to them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, RwLock};

use crate::record::PacketRecord;
use crate::stats::{HubStats, HubStatsSnapshot};

use super::config::HubConfig;
use super::subscriber::{DeliveryError, Subscriber, SubscriberId};

/// Live subscriber set with best-effort fan-out
///
/// Thread-safe via `RwLock`. Broadcasts only hold the read lock long enough
/// to copy the handles; the sends themselves happen outside the lock.
pub struct BroadcastHub {
    /// Active subscribers by id
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,

    /// Next id handed out by `new_subscriber`
    next_id: AtomicU64,

    stats: HubStats,

    config: HubConfig,
}

impl BroadcastHub {
    /// Create a new hub with default configuration
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create a new hub with custom configuration
    pub fn with_config(config: HubConfig) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            stats: HubStats::new(),
            config,
        }
    }

    /// Get the hub configuration
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Allocate a subscriber handle and its outbound queue
    ///
    /// The handle is not active until passed to [`register`](Self::register).
    pub fn new_subscriber(&self) -> (Subscriber, mpsc::Receiver<Bytes>) {
        let id = SubscriberId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        Subscriber::channel(id, self.config.subscriber_queue)
    }

    /// Add a subscriber to the active set
    ///
    /// Callers must not register the same subscriber twice.
    pub async fn register(&self, subscriber: Subscriber) {
        let id = subscriber.id();
        let mut subscribers = self.subscribers.write().await;
        subscribers.insert(id, subscriber);
        self.stats.record_registration();

        tracing::info!(
            subscriber = %id,
            subscribers = subscribers.len(),
            "Subscriber registered"
        );
    }

    /// Remove a subscriber from the active set
    ///
    /// Unknown ids are ignored.
    pub async fn unregister(&self, id: SubscriberId) {
        let mut subscribers = self.subscribers.write().await;

        if subscribers.remove(&id).is_some() {
            tracing::info!(
                subscriber = %id,
                subscribers = subscribers.len(),
                "Subscriber unregistered"
            );
        }
    }

    /// Deliver a record to every currently registered subscriber
    ///
    /// The record is serialized once and the buffer shared between all sends.
    /// Membership is snapshotted at the start of the call. Each send is a
    /// single non-blocking attempt; failures are counted and otherwise
    /// ignored, and never remove the subscriber.
    ///
    /// Returns the number of subscribers the record was queued for.
    pub async fn broadcast(&self, record: &PacketRecord) -> usize {
        let payload = match record.to_json_bytes() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(record = %record.id, error = %e, "Failed to serialize record");
                return 0;
            }
        };

        self.broadcast_payload(payload).await
    }

    /// Fan out an already serialized payload
    pub async fn broadcast_payload(&self, payload: Bytes) -> usize {
        let targets: Vec<Subscriber> = {
            let subscribers = self.subscribers.read().await;
            subscribers.values().cloned().collect()
        };

        let mut delivered = 0usize;
        let mut failed = 0usize;

        for subscriber in &targets {
            // Bytes clones are reference counted, not copied
            match subscriber.try_deliver(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    failed += 1;
                    match e {
                        DeliveryError::Lagging => tracing::trace!(
                            subscriber = %subscriber.id(),
                            "Subscriber lagging, record dropped"
                        ),
                        DeliveryError::Closed => tracing::trace!(
                            subscriber = %subscriber.id(),
                            "Subscriber closed, awaiting unregister"
                        ),
                    }
                }
            }
        }

        self.stats.record_broadcast(delivered as u64, failed as u64);
        delivered
    }

    /// Number of currently registered subscribers
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Check whether a subscriber is registered
    pub async fn is_registered(&self, id: SubscriberId) -> bool {
        self.subscribers.read().await.contains_key(&id)
    }

    /// Snapshot of the hub counters
    pub fn stats(&self) -> HubStatsSnapshot {
        self.stats.snapshot()
    }

    /// Spawn the task that drains captured records into `broadcast`
    ///
    /// The task ends once every sender of `records` has been dropped.
    pub fn spawn_dispatcher(
        self: &Arc<Self>,
        mut records: mpsc::UnboundedReceiver<PacketRecord>,
    ) -> tokio::task::JoinHandle<()> {
        let hub = Arc::clone(self);

        tokio::spawn(async move {
            while let Some(record) = records.recv().await {
                hub.broadcast(&record).await;
            }
            tracing::debug!("Record channel closed, dispatcher exiting");
        })
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use crate::record::TransportProtocol;

    use super::*;

    fn record(id: &str) -> PacketRecord {
        PacketRecord {
            id: id.to_string(),
            timestamp_ms: 1,
            src_addr: None,
            dst_addr: None,
            protocol: TransportProtocol::Other,
            src_port: None,
            dst_port: None,
            length: 42,
            payload_preview: None,
        }
    }

    fn record_id(payload: &Bytes) -> String {
        let value: serde_json::Value = serde_json::from_slice(payload).unwrap();
        value["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers() {
        let hub = BroadcastHub::new();

        assert_eq!(hub.broadcast(&record("r1")).await, 0);

        let stats = hub.stats();
        assert_eq!(stats.broadcasts, 1);
        assert_eq!(stats.deliveries, 0);
        assert_eq!(stats.failed_deliveries, 0);
    }

    #[tokio::test]
    async fn test_register_unregister() {
        let hub = BroadcastHub::new();
        let (sub, _rx) = hub.new_subscriber();
        let id = sub.id();

        hub.register(sub).await;
        assert!(hub.is_registered(id).await);
        assert_eq!(hub.subscriber_count().await, 1);

        hub.unregister(id).await;
        assert!(!hub.is_registered(id).await);
        assert_eq!(hub.subscriber_count().await, 0);

        // Removing a non-member is a no-op
        hub.unregister(id).await;
        hub.unregister(SubscriberId::new(999)).await;
        assert_eq!(hub.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let hub = BroadcastHub::new();
        let (a, _ra) = hub.new_subscriber();
        let (b, _rb) = hub.new_subscriber();

        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_record() {
        let hub = BroadcastHub::new();

        let (a, mut rx_a) = hub.new_subscriber();
        hub.register(a).await;
        assert_eq!(hub.broadcast(&record("first")).await, 1);

        let (b, mut rx_b) = hub.new_subscriber();
        hub.register(b).await;
        assert_eq!(hub.broadcast(&record("second")).await, 2);

        assert_eq!(record_id(&rx_a.recv().await.unwrap()), "first");
        assert_eq!(record_id(&rx_a.recv().await.unwrap()), "second");

        assert_eq!(record_id(&rx_b.recv().await.unwrap()), "second");
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failed_send_does_not_block_others() {
        let hub = BroadcastHub::new();

        let (a, rx_a) = hub.new_subscriber();
        let a_id = a.id();
        hub.register(a).await;
        drop(rx_a);

        let (b, mut rx_b) = hub.new_subscriber();
        hub.register(b).await;

        assert_eq!(hub.broadcast(&record("r")).await, 1);
        assert_eq!(record_id(&rx_b.recv().await.unwrap()), "r");

        // Failure alone never unregisters
        assert!(hub.is_registered(a_id).await);

        let stats = hub.stats();
        assert_eq!(stats.deliveries, 1);
        assert_eq!(stats.failed_deliveries, 1);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_drops_records() {
        let hub = BroadcastHub::with_config(HubConfig::default().subscriber_queue(1));

        let (slow, mut rx_slow) = hub.new_subscriber();
        hub.register(slow).await;
        let (fast, mut rx_fast) = hub.new_subscriber();
        hub.register(fast).await;

        hub.broadcast(&record("1")).await;
        assert_eq!(record_id(&rx_fast.recv().await.unwrap()), "1");

        // Slow queue still holds "1", so "2" is dropped for it only
        assert_eq!(hub.broadcast(&record("2")).await, 1);
        assert_eq!(record_id(&rx_fast.recv().await.unwrap()), "2");

        assert_eq!(record_id(&rx_slow.recv().await.unwrap()), "1");
        assert!(rx_slow.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_payload_is_shared() {
        let hub = BroadcastHub::new();
        let (a, mut rx_a) = hub.new_subscriber();
        let (b, mut rx_b) = hub.new_subscriber();
        hub.register(a).await;
        hub.register(b).await;

        hub.broadcast(&record("shared")).await;

        let pa = rx_a.recv().await.unwrap();
        let pb = rx_b.recv().await.unwrap();
        assert_eq!(pa.as_ptr(), pb.as_ptr());
    }

    #[tokio::test]
    async fn test_concurrent_membership_changes() {
        let hub = Arc::new(BroadcastHub::new());

        let churn = {
            let hub = Arc::clone(&hub);
            tokio::spawn(async move {
                for _ in 0..200 {
                    let (sub, _rx) = hub.new_subscriber();
                    let id = sub.id();
                    hub.register(sub).await;
                    tokio::task::yield_now().await;
                    hub.unregister(id).await;
                }
            })
        };

        for i in 0..200 {
            hub.broadcast(&record(&i.to_string())).await;
            tokio::task::yield_now().await;
        }

        churn.await.unwrap();
        assert_eq!(hub.subscriber_count().await, 0);
        assert_eq!(hub.stats().broadcasts, 200);
    }

    #[tokio::test]
    async fn test_dispatcher_drains_channel() {
        let hub = Arc::new(BroadcastHub::new());
        let (sub, mut rx) = hub.new_subscriber();
        hub.register(sub).await;

        let (tx, records) = mpsc::unbounded_channel();
        let handle = hub.spawn_dispatcher(records);

        tx.send(record("a")).unwrap();
        tx.send(record("b")).unwrap();
        drop(tx);

        handle.await.unwrap();
        assert_eq!(record_id(&rx.recv().await.unwrap()), "a");
        assert_eq!(record_id(&rx.recv().await.unwrap()), "b");
    }
}
