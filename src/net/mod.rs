//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → tls.rs (optional TLS handshake, optional client certificate check)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - TLS is optional so the service can run behind a local proxy or in tests
//! - Mutual TLS is enabled by configuring a client CA bundle

pub mod tls;
