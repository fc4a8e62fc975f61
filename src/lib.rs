//! Order-Tracking Dashboard Core
//!
//! Reconciles a push stream of order-status events and a periodically
//! polled daily rider summary into one bounded, in-memory view for
//! real-time display. The rendering layer consumes read-only snapshots.

pub mod dashboard;
pub mod models;
pub mod state;
pub mod stream;
pub mod summary;
