//! Netwatch server
//!
//! Wires the capture driver, the broadcast hub and the WebSocket gateway
//! together and runs them until shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::capture::{CaptureDriver, FrameSource};
use crate::error::{Error, Result};
use crate::hub::{BroadcastHub, HubConfig};
use crate::server::config::ServerConfig;
use crate::server::gateway::{handle_ws, GatewayState};
use crate::stats::CaptureStats;

/// Capture-to-WebSocket streaming server
pub struct NetwatchServer {
    config: ServerConfig,
    hub: Arc<BroadcastHub>,
}

impl NetwatchServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        let hub_config = HubConfig::default().subscriber_queue(config.subscriber_queue);

        Self {
            config,
            hub: Arc::new(BroadcastHub::with_config(hub_config)),
        }
    }

    /// Get a reference to the broadcast hub
    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// WebSocket routes; every connection on `/` or `/ws` becomes a subscriber
    pub fn router(&self, shutdown: CancellationToken) -> Router {
        let state = GatewayState {
            hub: Arc::clone(&self.hub),
            max_message_size: self.config.max_message_size,
            shutdown,
        };

        Router::new()
            .route("/", get(handle_ws))
            .route("/ws", get(handle_ws))
            .with_state(state)
    }

    /// Bind the configured address and stream frames from `source`
    ///
    /// Runs until `shutdown` is cancelled or the source is exhausted.
    pub async fn run_until<S: FrameSource>(&self, source: S, shutdown: CancellationToken) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(|source| Error::Bind {
                addr: self.config.bind_addr,
                source,
            })?;

        self.serve(listener, source, shutdown).await
    }

    /// Stream frames from `source` to subscribers accepted on `listener`
    pub async fn serve<S: FrameSource>(
        &self,
        listener: TcpListener,
        source: S,
        shutdown: CancellationToken,
    ) -> Result<()> {
        let local_addr = listener.local_addr()?;

        // Capture thread is the sole producer, the dispatcher the sole consumer
        let (records_tx, records_rx) = mpsc::unbounded_channel();
        let dispatcher = self.hub.spawn_dispatcher(records_rx);
        let driver = CaptureDriver::spawn(source, records_tx, shutdown.child_token())?;

        let stats_task = self.spawn_stats_task(driver.stats_handle(), shutdown.clone());

        tracing::info!(addr = %local_addr, "WebSocket server listening");

        let graceful = {
            let shutdown = shutdown.clone();
            async move {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::info!("Shutdown signal received");
                    }
                    _ = dispatcher => {
                        tracing::info!("Capture ended, shutting down");
                    }
                }
                // Close open subscriber connections as well
                shutdown.cancel();
            }
        };

        let app = self.router(shutdown.clone());
        let result = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(graceful)
        .await;

        shutdown.cancel();
        if let Some(handle) = stats_task {
            handle.abort();
        }

        let capture_stats = driver.stats_handle();
        if let Err(e) = tokio::task::spawn_blocking(move || driver.join()).await {
            tracing::error!(error = %e, "Failed to join capture thread");
        }

        let capture = capture_stats.snapshot();

        let hub = self.hub.stats();
        tracing::info!(
            frames = capture.frames,
            broadcasts = hub.broadcasts,
            deliveries = hub.deliveries,
            failed_deliveries = hub.failed_deliveries,
            registrations = hub.registrations,
            uptime_secs = hub.uptime.as_secs(),
            "Server stopped"
        );

        result.map_err(Error::Io)
    }

    fn spawn_stats_task(
        &self,
        capture: Arc<CaptureStats>,
        shutdown: CancellationToken,
    ) -> Option<tokio::task::JoinHandle<()>> {
        let interval = self.config.stats_interval;
        if interval.is_zero() {
            return None;
        }

        let hub = Arc::clone(&self.hub);
        let started_at = Instant::now();

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let subscribers = hub.subscriber_count().await;
                let capture = capture.snapshot();
                let broadcast = hub.stats();
                tracing::info!(
                    subscribers,
                    registrations = broadcast.registrations,
                    frames = capture.frames,
                    bitrate = capture.bitrate(started_at.elapsed()),
                    read_errors = capture.read_errors,
                    deliveries = broadcast.deliveries,
                    failed_deliveries = broadcast.failed_deliveries,
                    "Pipeline stats"
                );
            }
        }))
    }
}
