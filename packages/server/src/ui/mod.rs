//! WebSocket / HTTP server for the study rooms.

mod handler;
mod server;
mod signal;
pub mod state;

pub use server::Server;
