//! Owning context for the reconciled dashboard state.
//!
//! All mutation flows through `DashboardState::apply`, a synchronous
//! transition over (state, event) driven by a single dispatcher task.
//! Worker tasks — the push connection and the summary poller — only
//! produce `CoreEvent`s into one channel, so writes are serialized and
//! the rendering layer always reads a consistent snapshot.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::models::{ActivityEntry, Config, Connectivity, OrderRecord, RiderSummary};
use crate::state::{ActivityLog, OrderStore};
use crate::stream::{connection, decoder};
use crate::summary::{self, SummaryClient};

const IDLE_BANNER: &str = "Waiting for rider events...";
const RECONNECTING_BANNER: &str = "Connection lost. Attempting to reconnect...";
const LIVE_PERIOD_LABEL: &str = "Today's Progress (Live)";

/// Everything that can change the reconciled state.
#[derive(Debug)]
pub enum CoreEvent {
    /// Push connection established (first open or recovery).
    StreamOpened,
    /// Raw `ORDER_UPDATE` payload delivered on the open connection.
    StreamEvent { data: String },
    /// Push connection failed; a reconnect is already scheduled.
    StreamFailed,
    /// A summary poll resolved. `riders: None` means the fetch failed and
    /// the view must empty rather than go stale.
    PollCompleted {
        seq: u64,
        riders: Option<Vec<RiderSummary>>,
    },
}

/// Read-only view handed to the rendering layer.
#[derive(Debug, Clone)]
pub struct DashboardSnapshot {
    /// Newest first, capped at the configured view limit (default 50).
    pub orders: Vec<OrderRecord>,
    /// Newest first, capped at the log capacity (default 20).
    pub activity: Vec<ActivityEntry>,
    pub riders: Vec<RiderSummary>,
    pub period_label: String,
    pub connectivity: Connectivity,
    pub banner: String,
}

struct DashboardState {
    orders: OrderStore,
    activity: ActivityLog,
    riders: Vec<RiderSummary>,
    period_label: String,
    connectivity: Connectivity,
    banner: String,
    last_poll_seq: u64,
    order_view_limit: usize,
}

impl DashboardState {
    fn new(config: &Config) -> Self {
        Self {
            orders: OrderStore::default(),
            activity: ActivityLog::new(config.activity_capacity),
            riders: Vec::new(),
            period_label: LIVE_PERIOD_LABEL.to_string(),
            connectivity: Connectivity::Connecting,
            banner: IDLE_BANNER.to_string(),
            last_poll_seq: 0,
            order_view_limit: config.order_view_limit,
        }
    }

    /// Single transition function over (state, event). The only input
    /// beyond the event itself is the local receipt time, so tests drive
    /// it directly with no network or timers. Returns whether anything
    /// observable changed.
    fn apply(&mut self, event: CoreEvent, now: DateTime<Utc>) -> bool {
        match event {
            CoreEvent::StreamOpened => {
                self.connectivity = Connectivity::Open;
                self.banner = IDLE_BANNER.to_string();
                true
            }
            CoreEvent::StreamFailed => {
                self.connectivity = Connectivity::Reconnecting;
                self.banner = RECONNECTING_BANNER.to_string();
                true
            }
            CoreEvent::StreamEvent { data } => {
                let Some(order_event) = decoder::decode_order_update(&data, now) else {
                    return false;
                };
                let message = decoder::activity_message(&order_event);

                self.orders.apply(&order_event);
                self.activity.append(ActivityEntry {
                    message: message.clone(),
                    observed_at: now,
                });
                self.banner = message;
                true
            }
            CoreEvent::PollCompleted { seq, riders } => {
                if seq <= self.last_poll_seq {
                    debug!(seq, latest = self.last_poll_seq, "discarding superseded poll result");
                    return false;
                }
                self.last_poll_seq = seq;
                match riders {
                    Some(riders) => {
                        self.riders = riders;
                        self.period_label = LIVE_PERIOD_LABEL.to_string();
                    }
                    None => self.riders.clear(),
                }
                true
            }
        }
    }

    fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            orders: self.orders.recent(self.order_view_limit),
            activity: self.activity.snapshot(),
            riders: self.riders.clone(),
            period_label: self.period_label.clone(),
            connectivity: self.connectivity,
            banner: self.banner.clone(),
        }
    }
}

/// The owning context: order table, activity log, summary view, banner,
/// and the connection/poll workers. One per application instance — no
/// ambient singletons, so tests can run several independently.
pub struct Dashboard {
    state: Arc<RwLock<DashboardState>>,
    changes: broadcast::Sender<()>,
    workers: Vec<JoinHandle<()>>,
}

impl Dashboard {
    /// Connect the push stream, start the summary poller, and start the
    /// dispatcher that folds their events into the shared state.
    pub fn spawn(config: Config) -> Result<Self> {
        let state = Arc::new(RwLock::new(DashboardState::new(&config)));
        let (changes, _) = broadcast::channel(256);
        let (tx, mut rx) = mpsc::channel::<CoreEvent>(1024);

        // Single dispatcher: the only writer to the shared state.
        let dispatch_state = state.clone();
        let dispatch_changes = changes.clone();
        let dispatcher = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let changed = dispatch_state.write().apply(event, Utc::now());
                if changed {
                    let _ = dispatch_changes.send(());
                }
            }
        });

        let stream_url = format!(
            "{}/stream/order-updates",
            config.base_url.trim_end_matches('/')
        );
        let stream_worker = connection::spawn(stream_url, config.reconnect_delay, tx.clone());

        let summary_client = SummaryClient::new(&config.base_url)?;
        let poller = tokio::spawn(summary::run_poller(
            summary_client,
            config.poll_interval,
            tx,
        ));

        Ok(Self {
            state,
            changes,
            workers: vec![dispatcher, stream_worker, poller],
        })
    }

    /// Consistent read of the whole surface.
    pub fn snapshot(&self) -> DashboardSnapshot {
        self.state.read().snapshot()
    }

    /// Change notification: fires after every applied event.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.changes.subscribe()
    }

    /// Stop all workers. No core callback fires after this returns; a poll
    /// already in flight may complete, but its result lands in a closed
    /// channel and is dropped.
    pub fn shutdown(&self) {
        for worker in &self.workers {
            worker.abort();
        }
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn state() -> DashboardState {
        DashboardState::new(&Config::default())
    }

    fn order_json(order_id: &str, rider_id: &str, status: &str) -> String {
        format!(r#"{{"orderId":"{order_id}","riderId":"{rider_id}","status":"{status}"}}"#)
    }

    fn rider(rider_id: &str) -> RiderSummary {
        RiderSummary {
            rider_id: rider_id.to_string(),
            delivered_orders: 3,
            avg_delivery_time_minutes: Some(21.5),
            delayed_orders: 1,
        }
    }

    #[test]
    fn test_accepted_event_updates_store_log_and_banner() {
        let mut state = state();
        let changed = state.apply(
            CoreEvent::StreamEvent {
                data: order_json("O1", "R1", "picked_up"),
            },
            now(),
        );

        assert!(changed);
        let record = state.orders.get("O1").unwrap();
        assert_eq!(record.rider_id, "R1");
        assert_eq!(record.status, "picked_up");
        assert_eq!(record.last_updated_at, now());

        assert_eq!(state.activity.len(), 1);
        assert_eq!(state.banner, "Rider R1 picked up Order O1");
    }

    #[test]
    fn test_later_event_supersedes_order_record() {
        let mut state = state();
        state.apply(
            CoreEvent::StreamEvent {
                data: order_json("O1", "R1", "in_transit"),
            },
            now(),
        );
        state.apply(
            CoreEvent::StreamEvent {
                data: order_json("O1", "R2", "delivered"),
            },
            now(),
        );

        assert_eq!(state.orders.len(), 1);
        let record = state.orders.get("O1").unwrap();
        assert_eq!(record.rider_id, "R2");
        assert_eq!(record.status, "delivered");
        assert_eq!(state.activity.len(), 2);
    }

    #[test]
    fn test_malformed_payload_mutates_nothing() {
        let mut state = state();
        let changed = state.apply(
            CoreEvent::StreamEvent {
                data: "{not json".to_string(),
            },
            now(),
        );

        assert!(!changed);
        assert!(state.orders.is_empty());
        assert!(state.activity.is_empty());
        assert_eq!(state.banner, IDLE_BANNER);

        state.apply(
            CoreEvent::StreamEvent {
                data: order_json("O2", "R1", "delivered"),
            },
            now(),
        );
        assert_eq!(state.orders.len(), 1);
        assert!(state.orders.get("O2").is_some());
        assert_eq!(state.activity.len(), 1);
    }

    #[test]
    fn test_incomplete_event_mutates_nothing() {
        let mut state = state();
        let changed = state.apply(
            CoreEvent::StreamEvent {
                data: r#"{"orderId":"O1","status":"delivered"}"#.to_string(),
            },
            now(),
        );

        assert!(!changed);
        assert!(state.orders.is_empty());
        assert!(state.activity.is_empty());
    }

    #[test]
    fn test_activity_log_keeps_most_recent_twenty() {
        let mut state = state();
        for i in 0..25 {
            state.apply(
                CoreEvent::StreamEvent {
                    data: order_json(&format!("O{i}"), "R1", "picked_up"),
                },
                now(),
            );
        }

        assert_eq!(state.orders.len(), 25);
        assert_eq!(state.activity.len(), 20);
        let entries = state.activity.snapshot();
        assert_eq!(entries[0].message, "Rider R1 picked up Order O24");
        assert_eq!(entries[19].message, "Rider R1 picked up Order O5");
    }

    #[test]
    fn test_poll_success_replaces_summary_wholesale() {
        let mut state = state();
        state.apply(
            CoreEvent::PollCompleted {
                seq: 1,
                riders: Some(vec![rider("R1"), rider("R2")]),
            },
            now(),
        );
        state.apply(
            CoreEvent::PollCompleted {
                seq: 2,
                riders: Some(vec![rider("R3")]),
            },
            now(),
        );

        let ids: Vec<&str> = state.riders.iter().map(|r| r.rider_id.as_str()).collect();
        assert_eq!(ids, vec!["R3"]);
    }

    #[test]
    fn test_poll_failure_empties_summary() {
        let mut state = state();
        state.apply(
            CoreEvent::PollCompleted {
                seq: 1,
                riders: Some(vec![rider("R1"), rider("R2")]),
            },
            now(),
        );
        state.apply(CoreEvent::PollCompleted { seq: 2, riders: None }, now());

        assert!(state.riders.is_empty());
    }

    #[test]
    fn test_superseded_poll_result_is_discarded() {
        let mut state = state();
        state.apply(
            CoreEvent::PollCompleted {
                seq: 2,
                riders: Some(vec![rider("R2")]),
            },
            now(),
        );
        // A slow poll issued earlier resolves late; it must not clobber.
        let changed = state.apply(
            CoreEvent::PollCompleted {
                seq: 1,
                riders: Some(vec![rider("R1")]),
            },
            now(),
        );

        assert!(!changed);
        let ids: Vec<&str> = state.riders.iter().map(|r| r.rider_id.as_str()).collect();
        assert_eq!(ids, vec!["R2"]);
    }

    #[test]
    fn test_connectivity_transitions_drive_banner() {
        let mut state = state();
        assert_eq!(state.connectivity, Connectivity::Connecting);
        assert_eq!(state.banner, IDLE_BANNER);

        state.apply(
            CoreEvent::StreamEvent {
                data: order_json("O1", "R1", "delivered"),
            },
            now(),
        );
        state.apply(CoreEvent::StreamFailed, now());
        assert_eq!(state.connectivity, Connectivity::Reconnecting);
        assert_eq!(state.banner, RECONNECTING_BANNER);

        state.apply(CoreEvent::StreamOpened, now());
        assert_eq!(state.connectivity, Connectivity::Open);
        assert_eq!(state.banner, IDLE_BANNER);
    }

    #[test]
    fn test_snapshot_orders_sorted_desc_and_capped() {
        let config = Config {
            order_view_limit: 2,
            ..Config::default()
        };
        let mut state = DashboardState::new(&config);

        for (i, id) in ["O1", "O2", "O3"].iter().enumerate() {
            let ts = format!("2024-05-01T10:0{}:00", i);
            state.apply(
                CoreEvent::StreamEvent {
                    data: format!(
                        r#"{{"orderId":"{id}","riderId":"R1","status":"picked_up","eventTimestamp":"{ts}"}}"#
                    ),
                },
                now(),
            );
        }

        let snapshot = state.snapshot();
        assert_eq!(snapshot.orders.len(), 2);
        assert_eq!(snapshot.orders[0].order_id, "O3");
        assert_eq!(snapshot.orders[1].order_id, "O2");
        assert_eq!(snapshot.period_label, LIVE_PERIOD_LABEL);
    }

    #[tokio::test]
    async fn test_shutdown_closes_change_stream() {
        let config = Config {
            base_url: "http://127.0.0.1:9".to_string(),
            ..Config::default()
        };
        let dashboard = Dashboard::spawn(config).unwrap();
        let mut changes = dashboard.subscribe();

        dashboard.shutdown();
        drop(dashboard);

        // Workers are gone and the sender is dropped; the subscription
        // drains any buffered notifications and then closes.
        loop {
            match changes.recv().await {
                Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
