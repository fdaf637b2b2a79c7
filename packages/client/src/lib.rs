//! Terminal client for the study-room chat.
//!
//! The [`synchronizer`] keeps the optimistic local view consistent with what the
//! server confirmed; [`session`] and [`runner`] move frames between it, the
//! socket and the terminal, reconnecting when the connection drops.

pub mod config;
pub mod domain;
pub mod error;
pub mod formatter;
pub mod runner;
pub mod session;
pub mod synchronizer;
mod ui;

pub use config::ClientConfig;
pub use error::ClientError;
pub use runner::run_client;
pub use synchronizer::Synchronizer;
