//! Group-study chat server library.
//!
//! Rooms with presence, a bounded per-room history and session recovery,
//! served over WebSocket. All room state is owned by a single dispatcher task.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

pub mod config;
