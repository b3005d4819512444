//! Frame source abstraction
//!
//! The capture driver pulls frames through [`FrameSource`]. The live
//! implementation sits on `pnet::datalink`; tests and replays can provide
//! their own.

use std::time::SystemTime;

use crate::normalize::LinkType;

/// Capture error types
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("interface not found: {0}")]
    InterfaceNotFound(String),

    #[error("permission denied opening {interface}; run as root or grant CAP_NET_RAW")]
    PermissionDenied { interface: String },

    #[error("unsupported datalink channel on {0}")]
    UnsupportedChannel(String),

    #[error("open {interface}: {source}")]
    Open {
        interface: String,
        #[source]
        source: std::io::Error,
    },

    /// No frame arrived within the read timeout
    #[error("read timed out")]
    Timeout,

    #[error("read: {0}")]
    Io(#[from] std::io::Error),
}

/// One frame as handed out by a source
///
/// Borrows the source's buffer; it is only valid until the next read.
#[derive(Debug, Clone, Copy)]
pub struct CapturedFrame<'a> {
    /// Raw frame bytes, starting at the link-layer header
    pub data: &'a [u8],
    /// When the frame was captured
    pub captured_at: SystemTime,
}

impl<'a> CapturedFrame<'a> {
    pub fn new(data: &'a [u8], captured_at: SystemTime) -> Self {
        Self { data, captured_at }
    }
}

/// A blocking supplier of raw frames
pub trait FrameSource: Send + 'static {
    /// Link-layer framing of the frames this source yields
    fn link_type(&self) -> LinkType;

    /// Block until the next frame is available
    ///
    /// `Ok(None)` means the source is exhausted and will yield nothing more.
    /// [`CaptureError::Timeout`] and other errors are per-read conditions; the
    /// caller may keep reading.
    fn next_frame(&mut self) -> Result<Option<CapturedFrame<'_>>, CaptureError>;
}
