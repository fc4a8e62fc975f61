//! In-memory order table and bounded activity log.

use std::collections::{HashMap, VecDeque};

use crate::models::{ActivityEntry, OrderEvent, OrderRecord};

/// Latest-known status per order, keyed by order id.
///
/// Upserts replace the whole record; no field-level merge. The map itself
/// is never evicted; truncation is a view-time projection only.
#[derive(Debug, Default)]
pub struct OrderStore {
    orders: HashMap<String, OrderRecord>,
}

impl OrderStore {
    pub fn apply(&mut self, event: &OrderEvent) {
        self.orders.insert(
            event.order_id.clone(),
            OrderRecord {
                order_id: event.order_id.clone(),
                rider_id: event.rider_id.clone(),
                status: event.status.clone(),
                last_updated_at: event.event_timestamp,
                last_message: event.message.clone(),
            },
        );
    }

    pub fn get(&self, order_id: &str) -> Option<&OrderRecord> {
        self.orders.get(order_id)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Display projection: newest first, truncated to `limit`. Ties on the
    /// timestamp break by order id so repeated snapshots of unchanged state
    /// never reorder rows.
    pub fn recent(&self, limit: usize) -> Vec<OrderRecord> {
        let mut rows: Vec<OrderRecord> = self.orders.values().cloned().collect();
        rows.sort_by(|a, b| {
            b.last_updated_at
                .cmp(&a.last_updated_at)
                .then_with(|| a.order_id.cmp(&b.order_id))
        });
        rows.truncate(limit);
        rows
    }
}

/// Most-recent-first feed of accepted events, capped at a fixed capacity.
/// Oldest entries beyond the cap are discarded, never the newest.
#[derive(Debug)]
pub struct ActivityLog {
    entries: VecDeque<ActivityEntry>,
    capacity: usize,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn append(&mut self, entry: ActivityEntry) {
        self.entries.push_front(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_back();
        }
    }

    pub fn snapshot(&self) -> Vec<ActivityEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
