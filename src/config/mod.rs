//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! options file (TOML) + command-line flags
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → Options (validated, immutable)
//!
//! On token or policy file change:
//!     watcher.rs receives the notification
//!     → reads and digests the file
//!     → unchanged digest: nothing happens
//!     → builds the provider, keeping the last good one on error
//!     → atomic swap into the StateStore
//! ```
//!
//! # Design Decisions
//! - Options are immutable once loaded; only the token and policy files reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_options, read_options, ConfigError};
pub use schema::{LogFormat, LoggingOptions, Options, TlsOptions};
pub use validation::{validate_options, ValidationError};
pub use watcher::{ConfigWatcher, ReloadOutcome, WatchError, WatcherHandle};
