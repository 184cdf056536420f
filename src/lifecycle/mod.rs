//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load settings → Build schema → Apply overrides → Serve channel
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop reading frames → Drain in-flight requests → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Overrides are applied before the first frame is read
//! - A request already dispatched to the engine always completes

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
