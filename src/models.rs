//! Domain types and application configuration.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest-known state of one order. Replaced wholesale on every accepted
/// event; history lives only in the activity log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub rider_id: String,
    /// Open-ended status token. Unknown statuses from the backend are
    /// stored as-is, never rejected.
    pub status: String,
    pub last_updated_at: DateTime<Utc>,
    pub last_message: Option<String>,
}

/// One line of the recent-activity feed. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityEntry {
    pub message: String,
    /// Local receipt time, not the event's own timestamp.
    pub observed_at: DateTime<Utc>,
}

/// Per-rider aggregate from the daily-summary endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiderSummary {
    pub rider_id: String,
    #[serde(default)]
    pub delivered_orders: u32,
    #[serde(default)]
    pub avg_delivery_time_minutes: Option<f64>,
    #[serde(default)]
    pub delayed_orders: u32,
}

/// Push-connection lifecycle, surfaced next to the banner text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    Connecting,
    Open,
    Reconnecting,
}

/// A validated `ORDER_UPDATE`, ready to apply to the store and the log.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderEvent {
    pub order_id: String,
    pub rider_id: String,
    pub status: String,
    /// Event-supplied timestamp, falling back to local receipt time.
    pub event_timestamp: DateTime<Utc>,
    pub message: Option<String>,
}

/// Application configuration.
///
/// Only the backend base address is environment-driven; timings and view
/// caps are fixed defaults that tests override directly on the struct.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub reconnect_delay: Duration,
    pub poll_interval: Duration,
    pub order_view_limit: usize,
    pub activity_capacity: usize,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let base_url = std::env::var("ORDERTRACK_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8080".to_string());

        Self {
            base_url,
            ..Self::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            reconnect_delay: Duration::from_secs(5),
            poll_interval: Duration::from_secs(10),
            order_view_limit: 50,
            activity_capacity: 20,
        }
    }
}
