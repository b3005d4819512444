//! Live packet-metadata streaming
//!
//! `netwatch` captures traffic on a network interface, reduces every frame to
//! a compact [`PacketRecord`] and pushes the records as JSON text frames to
//! any number of WebSocket subscribers.
//!
//! ```text
//!  interface ─► CaptureDriver ─► normalize ─► PacketRecord
//!               (own thread)                       │ mpsc
//!                                                  ▼
//!                                           BroadcastHub ─► N WebSockets
//! ```
//!
//! # Example
//! ```no_run
//! use netwatch::capture::{CaptureConfig, DatalinkSource};
//! use netwatch::{NetwatchServer, ServerConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> netwatch::Result<()> {
//! let source = DatalinkSource::open(&CaptureConfig::new("eth0"))?;
//! let server = NetwatchServer::new(ServerConfig::default());
//! server.run_until(source, CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod error;
pub mod hub;
pub mod normalize;
pub mod record;
pub mod server;
pub mod stats;

pub use error::{Error, Result};
pub use hub::BroadcastHub;
pub use record::{PacketRecord, TransportProtocol};
pub use server::{NetwatchServer, ServerConfig};
