//! Token and access review webhook service.
//!
//! Serves `POST /authorize/token` and `POST /authorize/policy` from a token
//! file and an ABAC policy file, reloading both when they change on disk.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use authz_webhook::config::{read_options, validate_options, LogFormat, Options};
use authz_webhook::lifecycle::{self, wait_for_signal, Shutdown};
use authz_webhook::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "authz-webhook", version)]
#[command(about = "Token and access review webhooks backed by hot-reloaded files", long_about = None)]
struct Cli {
    /// TOML options file; flags override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Interface and port to bind.
    #[arg(long)]
    listen: Option<String>,

    /// CSV file with token, user name, uid and optional groups.
    #[arg(long)]
    token_file: Option<PathBuf>,

    /// ABAC policy file, one JSON policy per line.
    #[arg(long)]
    auth_policy: Option<PathBuf>,

    /// TLS certificate (PEM).
    #[arg(long)]
    tls_cert: Option<PathBuf>,

    /// TLS private key (PEM).
    #[arg(long)]
    tls_key: Option<PathBuf>,

    /// CA bundle (PEM) for verifying client certificates.
    #[arg(long)]
    tls_ca: Option<PathBuf>,

    /// Do not emit log messages.
    #[arg(long)]
    disable_logging: bool,

    /// Switch on debug logging.
    #[arg(short, long)]
    verbose: bool,

    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Prometheus exporter address (e.g., "127.0.0.1:9090").
    #[arg(long)]
    metrics_address: Option<String>,
}

impl Cli {
    fn into_options(self) -> Result<Options, Box<dyn std::error::Error>> {
        let mut options = match &self.config {
            Some(path) => read_options(path)?,
            None => Options::default(),
        };

        if let Some(listen) = self.listen {
            options.listen = listen;
        }
        if self.token_file.is_some() {
            options.token_file = self.token_file;
        }
        if self.auth_policy.is_some() {
            options.auth_policy = self.auth_policy;
        }
        if self.tls_cert.is_some() {
            options.tls.cert = self.tls_cert;
        }
        if self.tls_key.is_some() {
            options.tls.key = self.tls_key;
        }
        if self.tls_ca.is_some() {
            options.tls.ca = self.tls_ca;
        }
        if self.disable_logging {
            options.logging.enabled = false;
        }
        if self.verbose {
            options.logging.verbose = true;
        }
        if let Some(format) = self.log_format {
            options.logging.format = format;
        }
        if self.metrics_address.is_some() {
            options.metrics_address = self.metrics_address;
        }

        validate_options(&options)?;
        Ok(options)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let options = Cli::parse().into_options()?;

    logging::init(&options.logging)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "authz-webhook starting");

    if let Some(address) = &options.metrics_address {
        let addr: SocketAddr = address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let service = lifecycle::start(options).await?;

    // Latched, so a signal that lands before `run` starts waiting still counts.
    let shutdown = Shutdown::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(_) => on_signal.trigger(),
            Err(e) => tracing::error!(error = %e, "Unable to install signal handlers"),
        }
    });

    if let Err(e) = service.run(shutdown).await {
        tracing::error!(error = %e, "Service stopped abnormally");
        std::process::exit(1);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
