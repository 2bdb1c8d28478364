//! Decision providers.
//!
//! # Data Flow
//! ```text
//! token file (CSV)
//!     → tokenfile.rs (parse into TokenFile)
//!     → AuthenticationProvider::authenticate_token
//!
//! policy file (JSON lines)
//!     → abac.rs (parse into AbacPolicy)
//!     → AuthorizationProvider::authorize
//! ```
//!
//! # Design Decisions
//! - Providers are immutable once built; a reload builds a new one
//! - Parsing works on the exact bytes that were digested
//! - The core only sees the two traits, never the concrete types

pub mod abac;
pub mod tokenfile;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

pub use abac::AbacPolicy;
pub use tokenfile::TokenFile;

/// Identity bound to a token.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Identity {
    pub uid: String,
    pub name: String,
    pub groups: Vec<String>,
}

/// Attributes of a resource request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResourceRequest {
    pub verb: String,
    pub namespace: String,
    pub api_group: String,
    pub api_version: String,
    pub resource: String,
    pub subresource: String,
    pub name: String,
}

/// What an access review asks about: a resource or a raw path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestAttributes {
    Resource(ResourceRequest),
    NonResource { path: String, verb: String },
}

/// Everything an authorizer needs to reach a decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessAttributes {
    pub subject_name: String,
    pub subject_groups: Vec<String>,
    pub request: RequestAttributes,
}

impl AccessAttributes {
    pub fn is_resource_request(&self) -> bool {
        matches!(self.request, RequestAttributes::Resource(_))
    }

    pub fn verb(&self) -> &str {
        match &self.request {
            RequestAttributes::Resource(r) => &r.verb,
            RequestAttributes::NonResource { verb, .. } => verb,
        }
    }

    /// Read-only verbs are the ones that never mutate state.
    pub fn is_read_only(&self) -> bool {
        matches!(self.verb(), "get" | "list" | "watch")
    }
}

/// Outcome of an authorization query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny { reason: String },
}

/// A provider failed to answer, independent of the answer itself.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider failure: {0}")]
    Internal(String),
}

/// Looks up opaque bearer tokens.
pub trait AuthenticationProvider: Send + Sync {
    /// Exact, case-sensitive lookup. `Ok(None)` means the token is unknown.
    fn authenticate_token(&self, token: &str) -> Result<Option<Identity>, ProviderError>;
}

/// Decides whether a subject may perform an action.
pub trait AuthorizationProvider: Send + Sync {
    fn authorize(&self, attributes: &AccessAttributes) -> Result<Decision, ProviderError>;
}

/// Failure to build a provider from its backing file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unable to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: line {line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

impl LoadError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        LoadError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn parse(path: &Path, line: usize, message: impl Into<String>) -> Self {
        LoadError::Parse {
            path: path.to_path_buf(),
            line,
            message: message.into(),
        }
    }
}

/// A provider that can be built from a file on disk.
pub trait FileProvider: Sized {
    /// Build from content already read from `path`.
    fn from_bytes(path: &Path, content: &[u8]) -> Result<Self, LoadError>;

    /// Read `path` and build from its content.
    fn load_from(path: &Path) -> Result<Self, LoadError> {
        let content = std::fs::read(path).map_err(|e| LoadError::io(path, e))?;
        Self::from_bytes(path, &content)
    }
}

/// Which slot of the service state a file feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Authentication,
    Authorization,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Authentication => "tokens",
            ProviderKind::Authorization => "policy",
        }
    }

    /// Build the provider this kind of file describes.
    pub fn build(&self, path: &Path, content: &[u8]) -> Result<Provider, LoadError> {
        Ok(match self {
            ProviderKind::Authentication => {
                Provider::Authentication(Arc::new(TokenFile::from_bytes(path, content)?))
            }
            ProviderKind::Authorization => {
                Provider::Authorization(Arc::new(AbacPolicy::from_bytes(path, content)?))
            }
        })
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A freshly built provider, tagged with the slot it replaces.
#[derive(Clone)]
pub enum Provider {
    Authentication(Arc<dyn AuthenticationProvider>),
    Authorization(Arc<dyn AuthorizationProvider>),
}

impl Provider {
    pub fn kind(&self) -> ProviderKind {
        match self {
            Provider::Authentication(_) => ProviderKind::Authentication,
            Provider::Authorization(_) => ProviderKind::Authorization,
        }
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Provider").field(&self.kind()).finish()
    }
}
