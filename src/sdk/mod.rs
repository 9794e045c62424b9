//! High-level client over the session and stream layers.
//!
//! This is the entry point for collaborators translating a lighting protocol into
//! per-light colors: connect once, feed batches through `send_update`, and watch
//! the event channel for `Connected` and `Closed`.
pub mod client;

pub use client::EntertainmentClient;
