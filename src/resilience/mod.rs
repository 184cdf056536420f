//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Client call times out or conflicts:
//!     → retries.rs (is this operation retryable, attempts left,
//!       how long to wait before the next attempt?)
//! ```
//!
//! # Design Decisions
//! - Every client wait has a deadline
//! - Retries live in the client only; the engine never retries
//! - Jittered backoff keeps concurrent clients from retrying in lockstep

pub mod retries;

pub use retries::RetryPolicy;
