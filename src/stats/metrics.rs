//! Counters for the capture and broadcast paths
//!
//! Both sides of the pipeline update these from different execution contexts,
//! so every counter is a relaxed atomic. `snapshot()` returns a plain copy for
//! logging.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Broadcast hub counters
#[derive(Debug)]
pub struct HubStats {
    started_at: Instant,
    broadcasts: AtomicU64,
    deliveries: AtomicU64,
    failed_deliveries: AtomicU64,
    registrations: AtomicU64,
}

/// Point-in-time copy of [`HubStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HubStatsSnapshot {
    /// Records handed to `broadcast`
    pub broadcasts: u64,
    /// Successful per-subscriber enqueues
    pub deliveries: u64,
    /// Per-subscriber sends that failed (queue full or connection gone)
    pub failed_deliveries: u64,
    /// Subscribers registered since start
    pub registrations: u64,
    /// Time since the hub was created
    pub uptime: Duration,
}

impl HubStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            broadcasts: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            failed_deliveries: AtomicU64::new(0),
            registrations: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_broadcast(&self, delivered: u64, failed: u64) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        self.deliveries.fetch_add(delivered, Ordering::Relaxed);
        self.failed_deliveries.fetch_add(failed, Ordering::Relaxed);
    }

    pub(crate) fn record_registration(&self) {
        self.registrations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HubStatsSnapshot {
        HubStatsSnapshot {
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            failed_deliveries: self.failed_deliveries.load(Ordering::Relaxed),
            registrations: self.registrations.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

impl Default for HubStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Capture driver counters
#[derive(Debug, Default)]
pub struct CaptureStats {
    frames: AtomicU64,
    bytes: AtomicU64,
    read_errors: AtomicU64,
}

/// Point-in-time copy of [`CaptureStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStatsSnapshot {
    /// Frames read and normalized
    pub frames: u64,
    /// Captured bytes across all frames
    pub bytes: u64,
    /// Per-frame read errors that were skipped
    pub read_errors: u64,
}

impl CaptureStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_frame(&self, len: usize) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CaptureStatsSnapshot {
        CaptureStatsSnapshot {
            frames: self.frames.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
        }
    }
}

impl CaptureStatsSnapshot {
    /// Average capture rate in bits per second over `elapsed`
    pub fn bitrate(&self, elapsed: Duration) -> u64 {
        let secs = elapsed.as_secs();
        if secs > 0 {
            (self.bytes * 8) / secs
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hub_stats_new() {
        let stats = HubStats::new().snapshot();
        assert_eq!(stats.broadcasts, 0);
        assert_eq!(stats.deliveries, 0);
        assert_eq!(stats.failed_deliveries, 0);
        assert_eq!(stats.registrations, 0);
    }

    #[test]
    fn test_hub_stats_accumulate() {
        let stats = HubStats::new();
        stats.record_broadcast(3, 1);
        stats.record_broadcast(0, 0);
        stats.record_registration();

        let snap = stats.snapshot();
        assert_eq!(snap.broadcasts, 2);
        assert_eq!(snap.deliveries, 3);
        assert_eq!(snap.failed_deliveries, 1);
        assert_eq!(snap.registrations, 1);
    }

    #[test]
    fn test_capture_stats_accumulate() {
        let stats = CaptureStats::new();
        stats.record_frame(60);
        stats.record_frame(1514);
        stats.record_error();

        let snap = stats.snapshot();
        assert_eq!(snap.frames, 2);
        assert_eq!(snap.bytes, 1574);
        assert_eq!(snap.read_errors, 1);
    }

    #[test]
    fn test_capture_bitrate() {
        let snap = CaptureStatsSnapshot {
            frames: 10,
            bytes: 1_000_000,
            read_errors: 0,
        };

        // 1,000,000 bytes * 8 bits / 10 seconds = 800,000 bps
        assert_eq!(snap.bitrate(Duration::from_secs(10)), 800_000);
        assert_eq!(snap.bitrate(Duration::ZERO), 0);
    }
}
