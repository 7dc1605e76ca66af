use crate::server::GraphAuthority;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::task::JoinHandle;

#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("Failed to create watcher: {0}")]
    CreateError(#[from] notify::Error),

    #[error("Watch error: {0}")]
    WatchError(String),
}

pub type WatcherResult<T> = Result<T, WatcherError>;

pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    receiver: UnboundedReceiver<notify::Result<Event>>,
}

impl FileWatcher {
    /// Watch a directory (non-recursively). Atomic writes replace files by
    /// rename, so the directory is watched rather than the file itself.
    pub fn new(dir: &Path) -> WatcherResult<Self> {
        if !dir.is_dir() {
            return Err(WatcherError::WatchError(format!(
                "{} is not a directory",
                dir.display()
            )));
        }

        let (tx, rx) = unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;

        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
        })
    }

    /// Next event, skipping watcher errors. `None` once the watcher is gone.
    pub async fn next_event(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await? {
                Ok(event) => return Some(event),
                Err(e) => tracing::warn!(error = %e, "file watcher error"),
            }
        }
    }
}

fn touches(event: &Event, path: &Path) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event.paths.iter().any(|p| p.file_name() == path.file_name())
}

/// Feed outside edits of the current document back into `authority`.
///
/// Each create/modify event for the document triggers
/// `GraphAuthority::reload_external`; documents that fail to decode are
/// logged and skipped.
pub fn spawn_document_watcher(authority: GraphAuthority) -> WatcherResult<JoinHandle<()>> {
    let document: PathBuf = authority.config().current_path();
    let mut watcher = FileWatcher::new(authority.config().root())?;
    tracing::info!(path = ?document, "watching current document");

    Ok(tokio::spawn(async move {
        while let Some(event) = watcher.next_event().await {
            if !touches(&event, &document) {
                continue;
            }

            match authority.reload_external().await {
                Ok(Some(version)) => tracing::info!(version, "applied outside edit"),
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "ignoring unreadable outside edit"),
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_file_watcher() {
        let dir = tempfile::tempdir().unwrap();
        let mut watcher = FileWatcher::new(dir.path()).unwrap();

        let path = dir.path().join("blueprint.graph.xml");
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            tokio::fs::write(path, "<graph/>").await.unwrap();
        });

        let event = tokio::time::timeout(Duration::from_secs(5), watcher.next_event())
            .await
            .unwrap();
        assert!(event.is_some());
    }

    #[test]
    fn test_rejects_missing_directory() {
        let result = FileWatcher::new(Path::new("/definitely/not/here"));
        assert!(matches!(result, Err(WatcherError::WatchError(_))));
    }
}
