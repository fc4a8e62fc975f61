//! Push-stream connection manager.
//!
//! Owns a single long-lived SSE connection to `/stream/order-updates`.
//! Any stream failure closes the source and schedules exactly one
//! reconnect after a fixed delay; reconnection is unconditional and
//! indefinite, with no backoff growth. Only `ORDER_UPDATE` events are
//! forwarded to the dispatcher.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::dashboard::CoreEvent;

pub const ORDER_UPDATE_EVENT: &str = "ORDER_UPDATE";

/// Spawn the connection worker. Aborting the returned handle closes the
/// active connection and cancels any pending reconnect.
pub(crate) fn spawn(
    stream_url: String,
    reconnect_delay: Duration,
    tx: mpsc::Sender<CoreEvent>,
) -> JoinHandle<()> {
    tokio::spawn(run(stream_url, reconnect_delay, tx))
}

async fn run(stream_url: String, reconnect_delay: Duration, tx: mpsc::Sender<CoreEvent>) {
    loop {
        match connect_and_stream(&stream_url, &tx).await {
            StreamExit::DispatcherGone => return,
            StreamExit::Failed => {
                if tx.send(CoreEvent::StreamFailed).await.is_err() {
                    return;
                }
                sleep(reconnect_delay).await;
            }
        }
    }
}

enum StreamExit {
    Failed,
    DispatcherGone,
}

async fn connect_and_stream(stream_url: &str, tx: &mpsc::Sender<CoreEvent>) -> StreamExit {
    info!(url = %stream_url, "connecting to order-update stream");
    let mut source = EventSource::get(stream_url);

    while let Some(event) = source.next().await {
        match event {
            Ok(Event::Open) => {
                info!("order-update stream connected");
                if tx.send(CoreEvent::StreamOpened).await.is_err() {
                    source.close();
                    return StreamExit::DispatcherGone;
                }
            }
            Ok(Event::Message(msg)) => {
                if !is_order_update(&msg) {
                    // Other event types on the same connection are not ours.
                    debug!(event = %msg.event, "ignoring unrecognized stream event");
                    continue;
                }
                if tx
                    .send(CoreEvent::StreamEvent { data: msg.data })
                    .await
                    .is_err()
                {
                    source.close();
                    return StreamExit::DispatcherGone;
                }
            }
            Err(e) => {
                warn!(error = %e, "order-update stream failed; reconnect scheduled");
                // Close so the EventSource's built-in retry never runs; the
                // fixed-delay reconnect in `run` is the only retry mechanism.
                source.close();
                return StreamExit::Failed;
            }
        }
    }

    warn!("order-update stream ended; reconnect scheduled");
    StreamExit::Failed
}

/// Event-type filter: only `ORDER_UPDATE` messages reach the decoder.
fn is_order_update(msg: &eventsource_stream::Event) -> bool {
    msg.event == ORDER_UPDATE_EVENT
}
