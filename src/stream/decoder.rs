//! `ORDER_UPDATE` payload decoding.
//!
//! Total over arbitrary input: malformed payloads are dropped with a debug
//! log, incomplete ones are silently filtered. A bad message never tears
//! down the stream.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::models::OrderEvent;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderUpdatePayload {
    #[serde(default)]
    order_id: Option<String>,
    #[serde(default)]
    rider_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    event_timestamp: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Decode one raw `ORDER_UPDATE` payload.
///
/// Returns `None` for malformed JSON and for events missing any required
/// field; `received_at` stands in for an absent event timestamp.
pub fn decode_order_update(raw: &str, received_at: DateTime<Utc>) -> Option<OrderEvent> {
    let payload: OrderUpdatePayload = match serde_json::from_str(raw) {
        Ok(payload) => payload,
        Err(e) => {
            debug!(error = %e, "dropping malformed ORDER_UPDATE payload");
            return None;
        }
    };

    let (Some(order_id), Some(rider_id), Some(status)) = (
        non_empty(payload.order_id),
        non_empty(payload.rider_id),
        non_empty(payload.status),
    ) else {
        debug!("dropping incomplete ORDER_UPDATE (missing orderId/riderId/status)");
        return None;
    };

    let event_timestamp = payload
        .event_timestamp
        .as_deref()
        .and_then(parse_event_timestamp)
        .unwrap_or(received_at);

    Some(OrderEvent {
        order_id,
        rider_id,
        status,
        event_timestamp,
        message: payload.message,
    })
}

fn non_empty(field: Option<String>) -> Option<String> {
    field.filter(|s| !s.trim().is_empty())
}

/// Event timestamps are ISO-8601, with or without a UTC offset (the
/// producer emits local-date-time strings like `2024-05-01T12:30:00`).
fn parse_event_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Activity line for an event, synthesized from the status when the event
/// did not carry its own message. Status matching is case-insensitive.
pub fn activity_message(event: &OrderEvent) -> String {
    if let Some(message) = &event.message {
        return message.clone();
    }

    match event.status.to_ascii_lowercase().as_str() {
        "picked_up" | "picked-up" => {
            format!("Rider {} picked up Order {}", event.rider_id, event.order_id)
        }
        "in_transit" | "in-transit" => {
            format!("Rider {} is delivering Order {}", event.rider_id, event.order_id)
        }
        "delivered" => {
            format!("Rider {} delivered Order {}", event.rider_id, event.order_id)
        }
        _ => format!(
            "Rider {} updated Order {} to {}",
            event.rider_id, event.order_id, event.status
        ),
    }
}
