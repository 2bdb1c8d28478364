//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Webhook handlers and the config watcher produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (review and reload counters, review latency)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON by default)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows from the HTTP layer into handler logs
//! - Metrics are cheap (atomic increments) and no-ops without an exporter

pub mod logging;
pub mod metrics;
