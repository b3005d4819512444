//! Broadcast hub for live record fan-out
//!
//! The hub owns the set of active subscribers and pushes every normalized
//! record to each of them. Capture never waits on subscriber I/O: records
//! arrive through a channel, and each subscriber has its own bounded queue
//! drained by its connection task.
//!
//! # Architecture
//!
//! ```text
//!   capture thread                  Arc<BroadcastHub>
//!   normalize() ──► mpsc ──► ┌──────────────────────────────┐
//!   (unbounded)     dispatcher│ subscribers: HashMap<Id,    │
//!                    task     │   Subscriber { tx }>         │
//!                             └──────────────┬───────────────┘
//!                                            │ try_send (Bytes)
//!                    ┌───────────────────────┼───────────────────────┐
//!                    ▼                       ▼                       ▼
//!              [queue] ──► WS          [queue] ──► WS          [queue] ──► WS
//! ```
//!
//! # Zero-Copy Design
//!
//! Each record is serialized to JSON exactly once into a `bytes::Bytes`.
//! Every subscriber queue receives a reference-counted clone of that buffer.

pub mod config;
pub mod store;
pub mod subscriber;

pub use config::HubConfig;
pub use store::BroadcastHub;
pub use subscriber::{DeliveryError, Subscriber, SubscriberId};
