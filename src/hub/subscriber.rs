//! Subscriber handles
//!
//! A [`Subscriber`] is the hub's non-owning handle to one connection: an id
//! and the sending half of that connection's outbound queue. The connection
//! task owns the receiving half and the socket itself.

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Identifier of one subscriber, unique within a hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a single delivery did not happen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// Outbound queue is full; the subscriber is not keeping up
    Lagging,
    /// The connection side has gone away
    Closed,
}

impl std::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryError::Lagging => write!(f, "subscriber queue full"),
            DeliveryError::Closed => write!(f, "subscriber closed"),
        }
    }
}

impl std::error::Error for DeliveryError {}

/// Handle to one active connection
#[derive(Debug, Clone)]
pub struct Subscriber {
    id: SubscriberId,
    tx: mpsc::Sender<Bytes>,
}

impl Subscriber {
    /// Wrap an existing queue sender
    pub fn new(id: SubscriberId, tx: mpsc::Sender<Bytes>) -> Self {
        Self { id, tx }
    }

    /// Create a subscriber and the receiving end of its queue
    pub fn channel(id: SubscriberId, capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(id, tx), rx)
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Enqueue a payload without waiting
    pub(crate) fn try_deliver(&self, payload: Bytes) -> Result<(), DeliveryError> {
        self.tx.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Lagging,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}
