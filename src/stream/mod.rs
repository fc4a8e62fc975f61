//! Push-stream side: connection lifecycle and payload decoding.

pub mod connection;
pub mod decoder;
