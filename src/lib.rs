// Static deployment roster: bosses and channels
pub mod roster;

// Slot keys, timestamps and their validation
pub mod slot;

// Derived lifecycle status of a slot
pub mod status;

// Snapshot persistence and load-time recovery
pub mod store;

// Authoritative respawn-state service
pub mod service;

// HTTP API
pub mod api;

// TOML + environment configuration
pub mod config;

pub use roster::{BossDefinition, Roster};
pub use service::RespawnService;
pub use slot::{SlotKey, SlotState, Timestamp};
pub use status::{derive_status, derive_status_in, Status};
pub use store::{Snapshot, SnapshotStore};
