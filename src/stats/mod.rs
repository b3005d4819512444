//! Pipeline statistics

pub mod metrics;

pub use metrics::{CaptureStats, CaptureStatsSnapshot, HubStats, HubStatsSnapshot};
