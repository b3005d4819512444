//! Capture driver
//!
//! Runs a [`FrameSource`] on a dedicated OS thread. Every frame is parsed and
//! normalized on that thread, and the record is pushed into an unbounded
//! channel towards the hub's dispatcher task. The channel send never blocks,
//! so capture is never held up by subscriber I/O.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::normalize::{normalize, ParsedFrame};
use crate::record::PacketRecord;
use crate::stats::{CaptureStats, CaptureStatsSnapshot};

use super::source::{CaptureError, FrameSource};

/// Pause after a failed read before trying again
const ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Consecutive failed reads after which the source is treated as gone
pub const MAX_CONSECUTIVE_ERRORS: u32 = 100;

/// Handle to a running capture thread
pub struct CaptureDriver {
    handle: Option<thread::JoinHandle<()>>,
    shutdown: CancellationToken,
    stats: Arc<CaptureStats>,
}

impl CaptureDriver {
    /// Start capturing from `source` on a new thread
    ///
    /// The thread stops when `shutdown` is cancelled, when the source is
    /// exhausted, after [`MAX_CONSECUTIVE_ERRORS`] failed reads in a row, or
    /// when the receiving side of `records` is dropped.
    pub fn spawn<S: FrameSource>(
        source: S,
        records: mpsc::UnboundedSender<PacketRecord>,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let stats = Arc::new(CaptureStats::new());

        let handle = {
            let stats = Arc::clone(&stats);
            let shutdown = shutdown.clone();
            thread::Builder::new()
                .name("netwatch-capture".into())
                .spawn(move || capture_loop(source, records, shutdown, stats))
                .map_err(Error::Spawn)?
        };

        Ok(Self {
            handle: Some(handle),
            shutdown,
            stats,
        })
    }

    /// Shared capture counters
    pub fn stats_handle(&self) -> Arc<CaptureStats> {
        Arc::clone(&self.stats)
    }

    /// Snapshot of the capture counters
    pub fn stats(&self) -> CaptureStatsSnapshot {
        self.stats.snapshot()
    }

    /// Ask the capture thread to stop after the current read
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Whether the capture thread has exited
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Stop the capture thread and wait for it to exit
    ///
    /// Blocks; from async code run it via `spawn_blocking`.
    pub fn join(mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Capture thread panicked");
            }
        }
    }
}

impl Drop for CaptureDriver {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn capture_loop<S: FrameSource>(
    mut source: S,
    records: mpsc::UnboundedSender<PacketRecord>,
    shutdown: CancellationToken,
    stats: Arc<CaptureStats>,
) {
    let link = source.link_type();
    tracing::debug!(link = ?link, "Capture loop started");

    let mut consecutive_errors = 0u32;

    while !shutdown.is_cancelled() {
        let record = match source.next_frame() {
            Ok(Some(frame)) => {
                consecutive_errors = 0;
                stats.record_frame(frame.data.len());
                let parsed = ParsedFrame::parse(link, frame.data);
                normalize(&parsed, frame.captured_at)
            }
            Ok(None) => {
                tracing::info!("Capture source exhausted");
                break;
            }
            Err(CaptureError::Timeout) => continue,
            Err(e) => {
                stats.record_error();
                consecutive_errors += 1;

                if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    tracing::error!(
                        error = %e,
                        consecutive_errors,
                        "Capture source keeps failing, stopping capture"
                    );
                    break;
                }
                // Warn on the first failure of a run only
                if consecutive_errors == 1 {
                    tracing::warn!(error = %e, "Frame read failed, continuing");
                } else {
                    tracing::debug!(error = %e, consecutive_errors, "Frame read failed");
                }
                thread::sleep(ERROR_BACKOFF);
                continue;
            }
        };

        if records.send(record).is_err() {
            tracing::debug!("Record receiver dropped, stopping capture");
            break;
        }
    }

    let stats = stats.snapshot();
    tracing::info!(
        frames = stats.frames,
        bytes = stats.bytes,
        read_errors = stats.read_errors,
        "Capture stopped"
    );
}
