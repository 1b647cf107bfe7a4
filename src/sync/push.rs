// SPDX-License-Identifier: MIT

//! WebSocket push channel for live events.
//!
//! One persistent connection per [`LiveSync`](super::LiveSync) activation.
//! The channel carries named events (`newReading`, `newEarthquake`) which
//! are prepended into the shared cache in receipt order. Reconnection is
//! handled here at the transport level; consumers only observe the
//! connectivity flag flipping.

use crate::models::{Earthquake, Reading};
use crate::sync::EventCache;
use futures_util::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_tungstenite::{connect_async, tungstenite::Message};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// A named event frame from the backend channel.
#[derive(Debug, Deserialize)]
struct PushEvent {
    event: String,
    data: serde_json::Value,
}

/// Run the push channel until the owning task is aborted.
pub async fn run_push_channel(
    ws_url: String,
    cache: Arc<EventCache>,
    connected_tx: watch::Sender<bool>,
) {
    loop {
        tracing::info!(url = %ws_url, "Connecting to backend event channel");

        match connect_and_read(&ws_url, &cache, &connected_tx).await {
            Ok(()) => {
                tracing::info!("Event channel closed by backend");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Event channel error");
            }
        }

        let _ = connected_tx.send(false);
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

async fn connect_and_read(
    ws_url: &str,
    cache: &EventCache,
    connected_tx: &watch::Sender<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (ws_stream, _) = connect_async(ws_url).await?;
    let (_write, mut read) = ws_stream.split();

    let _ = connected_tx.send(true);
    tracing::info!("Event channel connected");

    while let Some(result) = read.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if let Err(e) = handle_event(&text, cache) {
                    tracing::warn!(error = %e, "Ignoring malformed push event");
                }
            }
            Ok(Message::Close(_)) => {
                tracing::info!("Backend sent close frame");
                return Ok(());
            }
            Ok(_) => {} // Ignore ping/pong/binary frames
            Err(e) => {
                return Err(format!("WebSocket error: {}", e).into());
            }
        }
    }

    Ok(())
}

fn handle_event(text: &str, cache: &EventCache) -> Result<(), serde_json::Error> {
    let event: PushEvent = serde_json::from_str(text)?;

    match event.event.as_str() {
        "newReading" => {
            let reading: Reading = serde_json::from_value(event.data)?;
            tracing::debug!(id = %reading.id, "Push: new reading");
            cache.prepend_reading(reading);
        }
        "newEarthquake" => {
            let earthquake: Earthquake = serde_json::from_value(event.data)?;
            tracing::debug!(id = %earthquake.id, "Push: new earthquake");
            cache.prepend_earthquake(earthquake);
        }
        other => {
            tracing::debug!(event = %other, "Ignoring unknown event type");
        }
    }

    Ok(())
}
