//! Error types

use std::net::SocketAddr;

use crate::capture::CaptureError;

/// Crate-level error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Capture facility could not be opened
    #[error("capture: {0}")]
    Capture(#[from] CaptureError),

    #[error("bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("spawn capture thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;
