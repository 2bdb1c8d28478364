//! Configuration file watcher for hot reload.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use notify::event::{AccessKind, AccessMode, ModifyKind};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::observability::metrics;
use crate::provider::LoadError;
use crate::state::{Digest, StateStore, WatchedFile};

/// Error type for the watcher.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("unable to create file watcher: {0}")]
    Notify(#[from] notify::Error),
    #[error("unable to watch {}: {source}", path.display())]
    Subscribe {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
    #[error("file notification feed closed, configuration changes can no longer be detected")]
    FeedClosed,
    #[error("watcher task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// What a reload attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// New content was parsed and published.
    Reloaded { generation: u64 },
    /// Content matches the last-good digest.
    Unchanged,
    /// The path is not a watched file.
    Ignored,
}

/// Watches the token and policy files and swaps in new providers.
pub struct ConfigWatcher {
    store: StateStore,
    files: Vec<WatchedFile>,
}

impl ConfigWatcher {
    pub fn new(store: StateStore, files: Vec<WatchedFile>) -> Self {
        Self { store, files }
    }

    pub fn files(&self) -> &[WatchedFile] {
        &self.files
    }

    /// Subscribe to the parent directory of every watched file and start
    /// the reload task.
    pub fn spawn(self) -> Result<WatcherHandle, WatchError> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;

        let directories: BTreeSet<&Path> = self.files.iter().map(|f| f.directory()).collect();
        for dir in directories {
            watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .map_err(|source| WatchError::Subscribe {
                    path: dir.to_path_buf(),
                    source,
                })?;
            tracing::info!(directory = %dir.display(), "Watching directory for changes");
        }

        let task = tokio::spawn(self.run(rx));
        Ok(WatcherHandle {
            task,
            _watcher: Some(watcher),
        })
    }

    /// Consume notification events until the feed closes.
    ///
    /// Only returns when no further changes can be observed.
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<notify::Result<Event>>) -> WatchError {
        while let Some(res) = events.recv().await {
            match res {
                Ok(event) => self.handle_event(event).await,
                Err(e) => tracing::error!(error = %e, "Watch error"),
            }
        }

        tracing::error!("File notification feed closed");
        WatchError::FeedClosed
    }

    async fn handle_event(&self, event: Event) {
        tracing::debug!(kind = ?event.kind, paths = ?event.paths, "Received a file notification event");

        for path in &event.paths {
            let Some(file) = self.files.iter().find(|f| f.path == *path) else {
                continue;
            };
            if !is_write_event(&event.kind) {
                continue;
            }

            match self.reload(file).await {
                Ok(ReloadOutcome::Reloaded { generation }) => tracing::info!(
                    path = %file.path.display(),
                    kind = %file.kind,
                    generation,
                    "Reloaded the contents of the file"
                ),
                Ok(_) => tracing::debug!(path = %file.path.display(), "File content unchanged"),
                Err(e) => tracing::error!(
                    path = %file.path.display(),
                    error = %e,
                    "Unable to process file change, keeping previous contents"
                ),
            }
        }
    }

    /// Reload the watched file at `path`, if there is one.
    pub async fn process_path(&self, path: &Path) -> Result<ReloadOutcome, LoadError> {
        match self.files.iter().find(|f| f.path == path) {
            Some(file) => self.reload(file).await,
            None => Ok(ReloadOutcome::Ignored),
        }
    }

    /// Re-read `file` and publish a new provider if its content changed.
    ///
    /// On any failure the previous provider and digest stay in place.
    pub async fn reload(&self, file: &WatchedFile) -> Result<ReloadOutcome, LoadError> {
        let result = self.try_reload(file).await;
        let label = match &result {
            Ok(ReloadOutcome::Reloaded { .. }) => "reloaded",
            Ok(_) => "unchanged",
            Err(_) => "failed",
        };
        metrics::record_reload(file.kind, label);
        result
    }

    async fn try_reload(&self, file: &WatchedFile) -> Result<ReloadOutcome, LoadError> {
        let content = tokio::fs::read(&file.path)
            .await
            .map_err(|e| LoadError::io(&file.path, e))?;

        let digest = Digest::of(&content);
        if self.store.digest(&file.path) == Some(digest) {
            return Ok(ReloadOutcome::Unchanged);
        }

        let provider = file.kind.build(&file.path, &content)?;
        let generation = self.store.swap(provider, &file.path, digest);
        tracing::debug!(path = %file.path.display(), %digest, "Published new provider");

        Ok(ReloadOutcome::Reloaded { generation })
    }
}

/// Only writes and creations can change what a file holds.
pub fn is_write_event(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => true,
        _ => false,
    }
}

/// Keeps the OS subscription alive and owns the reload task.
pub struct WatcherHandle {
    task: JoinHandle<WatchError>,
    _watcher: Option<RecommendedWatcher>,
}

impl WatcherHandle {
    /// Wrap a reload task fed from a channel instead of the OS.
    #[cfg(test)]
    pub(crate) fn from_task(task: JoinHandle<WatchError>) -> Self {
        Self {
            task,
            _watcher: None,
        }
    }

    /// Resolves only if the watcher stops, which is always fatal.
    pub async fn stopped(&mut self) -> WatchError {
        match (&mut self.task).await {
            Ok(err) => err,
            Err(join) => WatchError::Task(join),
        }
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderKind;
    use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind};

    struct Fixture {
        _dir: tempfile::TempDir,
        tokens: WatchedFile,
        store: StateStore,
    }

    fn fixture(content: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.csv");
        std::fs::write(&path, content).unwrap();
        let tokens = WatchedFile::resolve(&path, ProviderKind::Authentication).unwrap();
        let store = StateStore::load(&tokens, None).unwrap();
        Fixture {
            _dir: dir,
            tokens,
            store,
        }
    }

    fn knows(store: &StateStore, token: &str) -> bool {
        store.get().authn().authenticate_token(token).unwrap().is_some()
    }

    #[tokio::test]
    async fn identical_content_is_not_reloaded() {
        let f = fixture("token1,user1,uuid1\n");
        let watcher = ConfigWatcher::new(f.store.clone(), vec![f.tokens.clone()]);

        std::fs::write(&f.tokens.path, "token1,user1,uuid1\n").unwrap();
        assert_eq!(watcher.process_path(&f.tokens.path).await.unwrap(), ReloadOutcome::Unchanged);
        assert_eq!(watcher.process_path(&f.tokens.path).await.unwrap(), ReloadOutcome::Unchanged);
        assert_eq!(f.store.get().generation(), 0);
    }

    #[tokio::test]
    async fn changed_content_is_swapped_in() {
        let f = fixture("token1,user1,uuid1\n");
        let watcher = ConfigWatcher::new(f.store.clone(), vec![f.tokens.clone()]);

        std::fs::write(&f.tokens.path, "token1,user1,uuid1\ntoken5,user5,uuid5\n").unwrap();
        assert_eq!(
            watcher.process_path(&f.tokens.path).await.unwrap(),
            ReloadOutcome::Reloaded { generation: 1 }
        );
        assert!(knows(&f.store, "token5"));
        assert_eq!(
            f.store.digest(&f.tokens.path),
            Some(Digest::of(b"token1,user1,uuid1\ntoken5,user5,uuid5\n"))
        );
    }

    #[tokio::test]
    async fn removed_tokens_disappear() {
        let f = fixture("token1,user1,uuid1\ntoken2,user2,uuid2\n");
        let watcher = ConfigWatcher::new(f.store.clone(), vec![f.tokens.clone()]);

        std::fs::write(&f.tokens.path, "token2,user2,uuid2\n").unwrap();
        watcher.process_path(&f.tokens.path).await.unwrap();
        assert!(!knows(&f.store, "token1"));
        assert!(knows(&f.store, "token2"));
    }

    #[tokio::test]
    async fn broken_edit_keeps_last_good_state() {
        let f = fixture("token1,user1,uuid1\n");
        let watcher = ConfigWatcher::new(f.store.clone(), vec![f.tokens.clone()]);
        let before = f.store.digest(&f.tokens.path);

        std::fs::write(&f.tokens.path, "token1,user1\n").unwrap();
        assert!(watcher.process_path(&f.tokens.path).await.is_err());
        assert!(knows(&f.store, "token1"));
        assert_eq!(f.store.digest(&f.tokens.path), before);
        assert_eq!(f.store.get().generation(), 0);

        std::fs::remove_file(&f.tokens.path).unwrap();
        assert!(matches!(
            watcher.process_path(&f.tokens.path).await,
            Err(LoadError::Io { .. })
        ));
        assert!(knows(&f.store, "token1"));

        std::fs::write(&f.tokens.path, "token9,user9,uuid9\n").unwrap();
        assert_eq!(
            watcher.process_path(&f.tokens.path).await.unwrap(),
            ReloadOutcome::Reloaded { generation: 1 }
        );
        assert!(knows(&f.store, "token9"));
    }

    #[tokio::test]
    async fn unrelated_paths_are_ignored() {
        let f = fixture("token1,user1,uuid1\n");
        let watcher = ConfigWatcher::new(f.store.clone(), vec![f.tokens.clone()]);
        let other = f.tokens.directory().join("other.csv");
        std::fs::write(&other, "x,y,z\n").unwrap();

        assert_eq!(watcher.process_path(&other).await.unwrap(), ReloadOutcome::Ignored);
        assert_eq!(f.store.digest(&other), None);
    }

    #[tokio::test]
    async fn run_applies_events_then_reports_closed_feed() {
        let f = fixture("token1,user1,uuid1\n");
        let watcher = ConfigWatcher::new(f.store.clone(), vec![f.tokens.clone()]);
        let (tx, rx) = mpsc::unbounded_channel();

        std::fs::write(&f.tokens.path, "token7,user7,uuid7\n").unwrap();
        // removals never trigger a read
        tx.send(Ok(Event::new(EventKind::Remove(RemoveKind::File)).add_path(f.tokens.path.clone())))
            .unwrap();
        assert!(knows(&f.store, "token1"));
        tx.send(Ok(Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(f.tokens.path.clone())))
            .unwrap();
        tx.send(Err(notify::Error::generic("spurious"))).unwrap();
        drop(tx);

        assert!(matches!(watcher.run(rx).await, WatchError::FeedClosed));
        assert!(knows(&f.store, "token7"));
        assert!(!knows(&f.store, "token1"));
        assert_eq!(f.store.get().generation(), 1);
    }

    #[test]
    fn write_class_events() {
        assert!(is_write_event(&EventKind::Create(CreateKind::File)));
        assert!(is_write_event(&EventKind::Modify(ModifyKind::Data(DataChange::Any))));
        assert!(is_write_event(&EventKind::Modify(ModifyKind::Any)));
        assert!(is_write_event(&EventKind::Access(AccessKind::Close(AccessMode::Write))));
        assert!(!is_write_event(&EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions))));
        assert!(!is_write_event(&EventKind::Remove(RemoveKind::File)));
        assert!(!is_write_event(&EventKind::Access(AccessKind::Read)));
    }
}
