//! Broadcast hub configuration

/// Configuration for the broadcast hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Per-subscriber outbound queue capacity, in records
    ///
    /// When a subscriber's queue is full, new records for it are dropped
    /// instead of waiting.
    pub subscriber_queue: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            subscriber_queue: 1024,
        }
    }
}

impl HubConfig {
    /// Set the per-subscriber queue capacity (minimum 1)
    pub fn subscriber_queue(mut self, capacity: usize) -> Self {
        self.subscriber_queue = capacity.max(1);
        self
    }
}
