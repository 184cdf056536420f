//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! engine, store, client:
//!     → logging.rs (structured events on stderr)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stderr of the environment process)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - stdout is reserved for the stdio transport, so logs never go there
//! - Request id, namespace and version are fields on every relevant event
//! - Metric updates are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
