//! Live decision state.
//!
//! # Data Flow
//! ```text
//! Request path:
//!     StateStore::get()
//!     → Arc<ServiceState> snapshot (authn + authz taken together)
//!     → provider call outside of any lock
//!
//! Reload path:
//!     watcher builds new provider from file bytes
//!     → StateStore::swap(provider, path, digest)
//!     → clone current state, replace one slot + its digest
//!     → publish the new Arc atomically
//! ```
//!
//! # Design Decisions
//! - State is published through `ArcSwap`: readers never block and a
//!   writer never waits on readers
//! - A published `ServiceState` is never mutated; swap builds a new one
//! - Only the watcher task swaps, so reloads are serialized

pub mod digest;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::provider::{
    AuthenticationProvider, AuthorizationProvider, LoadError, Provider, ProviderKind,
};

pub use digest::Digest;

/// A configuration file the service keeps in sync with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedFile {
    pub path: PathBuf,
    pub kind: ProviderKind,
}

impl WatchedFile {
    /// Pin `path` to an absolute location.
    ///
    /// Only the parent directory is canonicalized: the file name is kept
    /// as given so replacing a symlink is still seen as a change to it.
    pub fn resolve(path: &Path, kind: ProviderKind) -> std::io::Result<Self> {
        let file_name = path.file_name().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} does not name a file", path.display()),
            )
        })?;
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let dir = std::fs::canonicalize(parent)?;

        Ok(Self {
            path: dir.join(file_name),
            kind,
        })
    }

    /// Directory that has to be watched to see changes to this file.
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("/"))
    }

    /// Read the file and build its provider, returning the digest of the
    /// exact bytes that were parsed.
    pub fn load(&self) -> Result<(Provider, Digest), LoadError> {
        let content = std::fs::read(&self.path).map_err(|e| LoadError::io(&self.path, e))?;
        let provider = self.kind.build(&self.path, &content)?;
        Ok((provider, Digest::of(&content)))
    }
}

/// One consistent view of the decision providers.
#[derive(Clone)]
pub struct ServiceState {
    authn: Arc<dyn AuthenticationProvider>,
    authz: Option<Arc<dyn AuthorizationProvider>>,
    digests: HashMap<PathBuf, Digest>,
    generation: u64,
}

impl ServiceState {
    pub fn new(
        authn: Arc<dyn AuthenticationProvider>,
        authz: Option<Arc<dyn AuthorizationProvider>>,
    ) -> Self {
        Self {
            authn,
            authz,
            digests: HashMap::new(),
            generation: 0,
        }
    }

    /// Record the digest of the content a provider was built from.
    pub fn with_digest(mut self, path: impl Into<PathBuf>, digest: Digest) -> Self {
        self.digests.insert(path.into(), digest);
        self
    }

    pub fn authn(&self) -> &Arc<dyn AuthenticationProvider> {
        &self.authn
    }

    /// `None` when authorization is not configured.
    pub fn authz(&self) -> Option<&Arc<dyn AuthorizationProvider>> {
        self.authz.as_ref()
    }

    pub fn digest(&self, path: &Path) -> Option<Digest> {
        self.digests.get(path).copied()
    }

    /// Number of successful swaps since startup.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn replace(&mut self, provider: Provider, path: &Path, digest: Digest) {
        match provider {
            Provider::Authentication(p) => self.authn = p,
            Provider::Authorization(p) => self.authz = Some(p),
        }
        self.digests.insert(path.to_path_buf(), digest);
        self.generation += 1;
    }
}

/// Sole owner of the current [`ServiceState`].
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<ArcSwap<ServiceState>>,
}

impl StateStore {
    pub fn new(state: ServiceState) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(state)),
        }
    }

    /// Build the initial state from disk. Any failure here is fatal to startup.
    pub fn load(tokens: &WatchedFile, policy: Option<&WatchedFile>) -> Result<Self, LoadError> {
        let (authn, authn_digest) = tokens.load()?;
        let Provider::Authentication(authn) = authn else {
            return Err(LoadError::parse(&tokens.path, 0, "not a token file"));
        };
        let mut state = ServiceState::new(authn, None).with_digest(&tokens.path, authn_digest);

        if let Some(policy) = policy {
            let (authz, authz_digest) = policy.load()?;
            let Provider::Authorization(authz) = authz else {
                return Err(LoadError::parse(&policy.path, 0, "not a policy file"));
            };
            state.authz = Some(authz);
            state = state.with_digest(&policy.path, authz_digest);
        }

        tracing::info!(
            token_file = %tokens.path.display(),
            policy_file = ?policy.map(|p| p.path.display().to_string()),
            "Decision state loaded"
        );
        Ok(Self::new(state))
    }

    /// Current snapshot. Both providers come from the same published state.
    pub fn get(&self) -> Arc<ServiceState> {
        self.inner.load_full()
    }

    /// Last-good digest for a watched path.
    pub fn digest(&self, path: &Path) -> Option<Digest> {
        self.inner.load().digest(path)
    }

    /// Replace one provider slot and its digest, leaving the other untouched.
    ///
    /// Returns the generation of the published state.
    pub fn swap(&self, provider: Provider, path: &Path, digest: Digest) -> u64 {
        let previous = self.inner.rcu(|current| {
            let mut next = ServiceState::clone(current);
            next.replace(provider.clone(), path, digest);
            next
        });
        previous.generation + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{AbacPolicy, FileProvider, TokenFile};
    use std::sync::Barrier;

    fn tokens(content: &str) -> Arc<dyn AuthenticationProvider> {
        Arc::new(TokenFile::from_bytes(Path::new("t"), content.as_bytes()).unwrap())
    }

    fn policy_for(user: &str) -> String {
        format!(
            "{{\"apiVersion\":\"abac.authorization.kubernetes.io/v1beta1\",\"kind\":\"Policy\",\"spec\":{{\"user\":\"{}\",\"namespace\":\"*\",\"resource\":\"*\"}}}}\n",
            user
        )
    }

    fn policy(user: &str) -> Arc<dyn AuthorizationProvider> {
        Arc::new(AbacPolicy::from_bytes(Path::new("p"), policy_for(user).as_bytes()).unwrap())
    }

    #[test]
    fn swap_replaces_one_slot_and_its_digest() {
        let store = StateStore::new(
            ServiceState::new(tokens("a,alice,1\n"), Some(policy("alice")))
                .with_digest("/etc/tokens.csv", Digest::of(b"v1"))
                .with_digest("/etc/policy.jsonl", Digest::of(b"p1")),
        );
        let before = store.get();

        let generation = store.swap(
            Provider::Authentication(tokens("b,bob,2\n")),
            Path::new("/etc/tokens.csv"),
            Digest::of(b"v2"),
        );
        assert_eq!(generation, 1);

        let after = store.get();
        assert_eq!(after.generation(), 1);
        assert!(after.authn().authenticate_token("b").unwrap().is_some());
        assert!(after.authn().authenticate_token("a").unwrap().is_none());
        assert!(Arc::ptr_eq(after.authz().unwrap(), before.authz().unwrap()));
        assert_eq!(after.digest(Path::new("/etc/tokens.csv")), Some(Digest::of(b"v2")));
        assert_eq!(after.digest(Path::new("/etc/policy.jsonl")), Some(Digest::of(b"p1")));

        // the old snapshot is untouched
        assert!(before.authn().authenticate_token("a").unwrap().is_some());
        assert_eq!(before.generation(), 0);
    }

    #[test]
    fn unknown_paths_have_no_digest() {
        let store = StateStore::new(ServiceState::new(tokens("a,alice,1\n"), None));
        assert_eq!(store.digest(Path::new("/tmp/other")), None);
        assert!(store.get().authz().is_none());
    }

    #[test]
    fn load_reads_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let tokens_path = dir.path().join("tokens.csv");
        let policy_path = dir.path().join("policy.jsonl");
        std::fs::write(&tokens_path, "a,alice,1\n").unwrap();
        std::fs::write(&policy_path, policy_for("alice")).unwrap();

        let tokens = WatchedFile::resolve(&tokens_path, ProviderKind::Authentication).unwrap();
        let policy = WatchedFile::resolve(&policy_path, ProviderKind::Authorization).unwrap();
        let store = StateStore::load(&tokens, Some(&policy)).unwrap();

        let state = store.get();
        assert_eq!(state.digest(&tokens.path), Some(Digest::of(b"a,alice,1\n")));
        assert!(state.authz().is_some());
        assert_eq!(state.generation(), 0);
    }

    #[test]
    fn load_fails_on_missing_or_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = WatchedFile::resolve(&dir.path().join("nope.csv"), ProviderKind::Authentication).unwrap();
        assert!(matches!(StateStore::load(&missing, None), Err(LoadError::Io { .. })));

        let broken_path = dir.path().join("broken.csv");
        std::fs::write(&broken_path, "only,two\n").unwrap();
        let broken = WatchedFile::resolve(&broken_path, ProviderKind::Authentication).unwrap();
        assert!(matches!(StateStore::load(&broken, None), Err(LoadError::Parse { .. })));
    }

    #[test]
    fn resolve_pins_relative_paths() {
        let file = WatchedFile::resolve(Path::new("Cargo.toml"), ProviderKind::Authentication).unwrap();
        assert!(file.path.is_absolute());
        assert!(file.path.ends_with("Cargo.toml"));
        assert!(WatchedFile::resolve(Path::new("/"), ProviderKind::Authentication).is_err());
    }

    fn subject(user: &str) -> crate::provider::AccessAttributes {
        crate::provider::AccessAttributes {
            subject_name: user.into(),
            subject_groups: vec![],
            request: crate::provider::RequestAttributes::Resource(Default::default()),
        }
    }

    /// Readers racing a writer always see a rule set together with the
    /// digest it was published with.
    #[test]
    fn concurrent_readers_never_see_a_torn_state() {
        use crate::provider::Decision;

        let policy_path = Path::new("/etc/policy.jsonl");
        let users = ["alice", "bob"];

        let store = StateStore::new(
            ServiceState::new(tokens("t,alice,1\n"), Some(policy(users[0])))
                .with_digest(policy_path, Digest::of(users[0].as_bytes())),
        );
        let barrier = Arc::new(Barrier::new(5));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..2_000 {
                        let state = store.get();
                        let digest = state.digest(policy_path).unwrap();
                        let (current, other) = if digest == Digest::of(users[0].as_bytes()) {
                            (users[0], users[1])
                        } else {
                            assert_eq!(digest, Digest::of(users[1].as_bytes()));
                            (users[1], users[0])
                        };
                        let authz = state.authz().unwrap();
                        assert_eq!(authz.authorize(&subject(current)).unwrap(), Decision::Allow);
                        assert!(matches!(
                            authz.authorize(&subject(other)).unwrap(),
                            Decision::Deny { .. }
                        ));
                    }
                })
            })
            .collect();

        barrier.wait();
        for round in 1..=200 {
            let user = users[round % 2];
            let generation = store.swap(
                Provider::Authorization(policy(user)),
                policy_path,
                Digest::of(user.as_bytes()),
            );
            assert_eq!(generation, round as u64);
        }

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.get().generation(), 200);
    }
}
