// SPDX-License-Identifier: MIT

//! Live data synchronization for the readings and earthquakes streams.
//!
//! One strategy is chosen per activation and never re-evaluated:
//! - **Push**: a persistent websocket to the backend's event channel;
//!   incoming events are prepended into the shared cache.
//! - **Poll**: when the backend runs on serverless hosting that cannot hold
//!   a connection open, two interval timers mark the cache entries stale so
//!   the next read performs a full re-fetch.
//!
//! The handle owns its spawned tasks; shutdown (or drop) aborts them, so
//! repeated start/stop cycles leak no timers or sockets.

pub mod cache;
mod push;

pub use cache::{EventCache, StreamKey};

use crate::config::Config;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Synchronization strategy, decided once at activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Push,
    Poll,
}

impl SyncMode {
    /// Inspect the backend URL to decide the strategy. Serverless hosts
    /// cannot hold a duplex connection open, so they get poll mode.
    pub fn decide(config: &Config) -> Self {
        if config.backend_url.contains(&config.serverless_host_suffix) {
            SyncMode::Poll
        } else {
            SyncMode::Push
        }
    }
}

/// Owned handle for the live synchronization tasks.
///
/// Scoped to its owner's lifetime rather than held in a global, so two
/// handles never share a connection.
pub struct LiveSync {
    mode: SyncMode,
    connected_rx: watch::Receiver<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl LiveSync {
    /// Activate synchronization against the shared cache.
    pub fn start(config: &Config, cache: Arc<EventCache>) -> Self {
        let mode = SyncMode::decide(config);

        match mode {
            SyncMode::Push => {
                let (connected_tx, connected_rx) = watch::channel(false);
                let ws_url = config.backend_ws_url.clone();

                tracing::info!(url = %ws_url, "Live sync: push mode");
                let task = tokio::spawn(push::run_push_channel(ws_url, cache, connected_tx));

                Self {
                    mode,
                    connected_rx,
                    tasks: vec![task],
                }
            }
            SyncMode::Poll => {
                // No handshake to fail in poll mode.
                let (_, connected_rx) = watch::channel(true);
                let interval = Duration::from_secs(config.poll_interval_secs);

                tracing::info!(
                    interval_secs = config.poll_interval_secs,
                    "Live sync: poll mode"
                );

                let tasks = [StreamKey::Readings, StreamKey::Earthquakes]
                    .into_iter()
                    .map(|key| {
                        let cache = cache.clone();
                        tokio::spawn(async move {
                            let start = tokio::time::Instant::now() + interval;
                            let mut ticker = tokio::time::interval_at(start, interval);
                            loop {
                                ticker.tick().await;
                                tracing::debug!(stream = key.as_str(), "Poll: marking stale");
                                cache.mark_stale(key);
                            }
                        })
                    })
                    .collect();

                Self {
                    mode,
                    connected_rx,
                    tasks,
                }
            }
        }
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    /// Current connectivity. Always true in poll mode.
    pub fn is_connected(&self) -> bool {
        *self.connected_rx.borrow()
    }

    /// Stop all synchronization tasks.
    pub fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for LiveSync {
    fn drop(&mut self) {
        self.shutdown();
    }
}
