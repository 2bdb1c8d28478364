//! Configuration schema definitions.
//!
//! All types derive Serde traits so the options can come from a TOML file;
//! command-line flags are layered on top by the binary.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root options for the webhook service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Options {
    /// Interface and port to bind (e.g., "127.0.0.1:8443").
    pub listen: String,

    /// CSV file holding the tokens. Required.
    pub token_file: Option<PathBuf>,

    /// ABAC policy file. Authorization is disabled when unset.
    pub auth_policy: Option<PathBuf>,

    /// TLS settings for the listener.
    pub tls: TlsOptions,

    /// Logging settings.
    pub logging: LoggingOptions,

    /// Prometheus exporter bind address; metrics are off when unset.
    pub metrics_address: Option<String>,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Maximum accepted review body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8443".to_string(),
            token_file: None,
            auth_policy: None,
            tls: TlsOptions::default(),
            logging: LoggingOptions::default(),
            metrics_address: None,
            request_timeout_secs: 10,
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// TLS material for the listener.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsOptions {
    /// Path to certificate file (PEM).
    pub cert: Option<PathBuf>,

    /// Path to private key file (PEM).
    pub key: Option<PathBuf>,

    /// CA bundle (PEM) used to verify client certificates.
    pub ca: Option<PathBuf>,
}

impl TlsOptions {
    pub fn is_enabled(&self) -> bool {
        self.cert.is_some() && self.key.is_some()
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingOptions {
    /// Emit log messages at all.
    pub enabled: bool,

    /// Switch on debug logging.
    pub verbose: bool,

    pub format: LogFormat,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            verbose: false,
            format: LogFormat::Json,
        }
    }
}
