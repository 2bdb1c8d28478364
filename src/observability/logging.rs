//! Structured logging.
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format by default, plain text for development
//! - `RUST_LOG` overrides the level derived from the options

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::{LogFormat, LoggingOptions};

/// Filter used when `RUST_LOG` is not set.
pub fn default_directives(options: &LoggingOptions) -> &'static str {
    match (options.enabled, options.verbose) {
        (false, _) => "off",
        (true, true) => "authz_webhook=debug,tower_http=debug",
        (true, false) => "authz_webhook=info,tower_http=info",
    }
}

/// Install the global subscriber.
pub fn init(options: &LoggingOptions) -> Result<(), TryInitError> {
    let filter = if options.enabled {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directives(options).into())
    } else {
        EnvFilter::new("off")
    };

    let registry = tracing_subscriber::registry().with(filter);
    match options.format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Text => registry.with(fmt::layer()).try_init(),
    }
}
