//! Packet capture
//!
//! - [`FrameSource`]: blocking frame supplier
//! - [`DatalinkSource`]: live interface capture on `pnet::datalink`
//! - [`CaptureDriver`]: dedicated capture thread feeding normalized records
//!   into a channel

pub mod datalink;
pub mod driver;
pub mod source;

pub use datalink::{list_interfaces, CaptureConfig, DatalinkSource};
pub use driver::{CaptureDriver, MAX_CONSECUTIVE_ERRORS};
pub use source::{CaptureError, CapturedFrame, FrameSource};
