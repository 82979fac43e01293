//! Respawn Client - polling consumer of the respawn tracker API.
//!
//! # Architecture
//!
//! ```text
//!   Respawn tracker server
//!          ↑  GET /get_state every fetch interval
//!          ↑  POST /update_boss_status, /reset_channel/{ch} on command
//! ┌─────────────────────────────────────────┐
//! │  fetch task        (RespawnClient)       │
//! │   - refetch snapshot                     │
//! │   - update offline cache on change       │
//! └─────────────────────────────────────────┘
//!          ↓  watch channel (latest result only)
//! ┌─────────────────────────────────────────┐
//! │  render loop       (Board)               │
//! │   - derive status per slot at "now"      │
//! │   - redraw every render interval         │
//! └─────────────────────────────────────────┘
//! ```
//!
//! The two timers are independent: a slow or failing fetch never delays a redraw,
//! and a redraw never triggers a request.

pub mod board;
pub mod client;
pub mod watch;

pub use board::{Board, ConnectionStatus};
pub use client::{ClientError, RespawnClient};
