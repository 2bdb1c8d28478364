//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate options → Load decision state → Watch files → Bind listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received or watcher dead → Stop accepting → Drain connections → Exit
//!
//! Signals (signals.rs):
//!     SIGINT/SIGTERM/SIGHUP/SIGQUIT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: state first, then watcher, then listener
//! - Ordered shutdown: stop accept, drain, close
//! - Draining has a deadline under TLS; plain HTTP waits for open requests

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::{wait_for_signal, Signal};
pub use startup::{start, Service, ServiceError, StartupError};
