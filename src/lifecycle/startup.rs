//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate options and pin the watched files to absolute paths
//! - Load the initial decision state
//! - Subscribe to file changes before traffic starts
//! - Bind the listener and build the HTTP server
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)
//! - A dead file watcher stops the service; stale decisions are worse than none

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinError;

use crate::config::validation::{validate_options, ValidationError};
use crate::config::watcher::{ConfigWatcher, WatchError, WatcherHandle};
use crate::config::Options;
use crate::http::{HttpServer, ServerError};
use crate::lifecycle::Shutdown;
use crate::provider::{LoadError, ProviderKind};
use crate::state::{StateStore, WatchedFile};
use crate::webhook::WebhookDispatcher;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid options: {0}")]
    Validation(#[from] ValidationError),
    #[error("unable to resolve {}: {source}", path.display())]
    Resolve {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to load decision state: {0}")]
    Load(#[from] LoadError),
    #[error("unable to watch files: {0}")]
    Watch(#[from] WatchError),
    #[error("unable to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Reasons a running service stopped other than a clean shutdown.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error("file watcher stopped: {0}")]
    Watch(#[from] WatchError),
    #[error("server task failed: {0}")]
    Task(#[from] JoinError),
}

/// A started service: state loaded, watcher subscribed, listener bound.
pub struct Service {
    store: StateStore,
    server: HttpServer,
    listener: TcpListener,
    watcher: WatcherHandle,
    local_addr: SocketAddr,
}

impl Service {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Serve until `shutdown` fires or the file watcher dies.
    ///
    /// A dead watcher triggers shutdown itself and is returned as an error.
    pub async fn run(self, shutdown: Shutdown) -> Result<(), ServiceError> {
        let Service {
            server,
            listener,
            mut watcher,
            ..
        } = self;
        let mut server = tokio::spawn(server.run(listener, shutdown.clone()));

        tokio::select! {
            result = &mut server => {
                result??;
                Ok(())
            }
            err = watcher.stopped() => {
                tracing::error!(error = %err, "File watcher stopped, shutting down");
                shutdown.trigger();
                if let Err(e) = server.await? {
                    tracing::error!(error = %e, "Server failed while draining");
                }
                Err(ServiceError::Watch(err))
            }
        }
    }
}

/// Bring the service up from validated options.
pub async fn start(options: Options) -> Result<Service, StartupError> {
    validate_options(&options)?;

    let token_path = options
        .token_file
        .as_deref()
        .ok_or(ValidationError::NoTokenFile)?;
    let tokens = resolve(token_path, ProviderKind::Authentication)?;
    let policy = options
        .auth_policy
        .as_deref()
        .map(|path| resolve(path, ProviderKind::Authorization))
        .transpose()?;

    let store = StateStore::load(&tokens, policy.as_ref())?;

    let mut files = vec![tokens];
    files.extend(policy);
    let watcher = ConfigWatcher::new(store.clone(), files).spawn()?;

    let listener = TcpListener::bind(&options.listen)
        .await
        .map_err(|source| StartupError::Bind {
            address: options.listen.clone(),
            source,
        })?;
    let local_addr = listener.local_addr().map_err(|source| StartupError::Bind {
        address: options.listen.clone(),
        source,
    })?;

    tracing::info!(
        address = %local_addr,
        tls = options.tls.is_enabled(),
        authorization = options.auth_policy.is_some(),
        request_timeout_secs = options.request_timeout_secs,
        "Listening for connections"
    );

    let server = HttpServer::new(options, WebhookDispatcher::new(store.clone()));
    Ok(Service {
        store,
        server,
        listener,
        watcher,
        local_addr,
    })
}

fn resolve(path: &std::path::Path, kind: ProviderKind) -> Result<WatchedFile, StartupError> {
    WatchedFile::resolve(path, kind).map_err(|source| StartupError::Resolve {
        path: path.to_path_buf(),
        source,
    })
}
