//! Sync engine subsystem.
//!
//! # Data Flow
//! ```text
//! frame from the side channel
//!     → server.rs (one task per frame)
//!     → sync.rs handle_frame (decode)
//!     → sync.rs process:
//!         RECEIVED → VALIDATING (schema) → APPLYING (store) → COMMITTED
//!                         └──────────────────┴──→ REJECTED
//!     → encode reply → side channel
//!
//! overrides file edit → config::OverridesWatcher
//!     → reload.rs → sync.rs apply_overrides
//! ```
//!
//! # Design Decisions
//! - The engine never retries; retry policy belongs to the caller
//! - Every rejection is machine readable (kind, key, message)
//! - Undecodable frames are answered, never dropped silently

pub mod reload;
pub mod server;
pub mod state;
pub mod sync;

pub use reload::spawn_overrides_reloader;
pub use server::ConfigServer;
pub use state::{RequestLifecycle, RequestState};
pub use sync::{OverrideRejected, SyncEngine};
