use super::ReloadSignal;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to watch '{}': {source}", path.display())]
    Establish {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
    #[error("file watch failed: {0}")]
    Runtime(#[source] notify::Error),
    #[error("file watch event stream closed unexpectedly")]
    EventStreamClosed,
}

/// Which changes count as "the credential file changed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchScope {
    /// Watch the file itself; only writes to its content trigger a reload.
    #[default]
    File,
    /// Watch the parent directory; writes plus create/rename onto the file
    /// name trigger a reload, so atomic replacement is picked up too.
    Replacements,
}

/// File-system events buffered between the OS watch thread and `run`. When
/// full, the OS watch thread blocks until `run` catches up.
const EVENT_BUFFER: usize = 16;

/// Write-class events: the file's content changed in place.
pub fn is_write(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any)
    )
}

/// The file appeared under its name, by creation or by a rename onto it.
pub fn is_replacement(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Name(
                RenameMode::To | RenameMode::Both | RenameMode::Any
            ))
    )
}

/// An established watch on the credential file.
///
/// The underlying OS watch is released when the watcher is dropped, which
/// `run` does on every exit path.
pub struct ReloadWatcher {
    file_name: Option<OsString>,
    scope: WatchScope,
    // dropped before the OS watch so a callback blocked on a full buffer returns
    events: mpsc::Receiver<notify::Result<Event>>,
    _watcher: RecommendedWatcher,
}

impl ReloadWatcher {
    /// Set up the OS watch. Failing here means live reload cannot work at all.
    pub fn establish(path: impl AsRef<Path>, scope: WatchScope) -> Result<Self, WatchError> {
        let path = path.as_ref().to_path_buf();
        let establish_err = |source| WatchError::Establish {
            path: path.clone(),
            source,
        };

        let (tx, events) = mpsc::channel(EVENT_BUFFER);
        // runs on notify's own thread, never inside the runtime
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // receiver gone means the watcher is shutting down
            let _ = tx.blocking_send(res);
        })
        .map_err(establish_err)?;

        let target = match scope {
            WatchScope::File => path.clone(),
            WatchScope::Replacements => match path.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
                _ => PathBuf::from("."),
            },
        };
        watcher
            .watch(&target, RecursiveMode::NonRecursive)
            .map_err(establish_err)?;
        tracing::info!(path = %path.display(), ?scope, "watching credential file");

        Ok(Self {
            file_name: path.file_name().map(OsString::from),
            scope,
            events,
            _watcher: watcher,
        })
    }

    fn triggers_reload(&self, event: &Event) -> bool {
        match self.scope {
            WatchScope::File => is_write(&event.kind),
            WatchScope::Replacements => {
                let names_file = event
                    .paths
                    .iter()
                    .any(|p| p.file_name() == self.file_name.as_deref());
                names_file && (is_write(&event.kind) || is_replacement(&event.kind))
            }
        }
    }

    /// Forward reload signals until cancelled or until the watch itself fails.
    ///
    /// A full signal queue blocks this loop, but cancellation still wins.
    pub async fn run(
        mut self,
        signals: mpsc::Sender<ReloadSignal>,
        cancel: CancellationToken,
    ) -> Result<(), WatchError> {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                event = self.events.recv() => event,
            };
            let event = match event {
                Some(Ok(event)) => event,
                Some(Err(e)) => return Err(WatchError::Runtime(e)),
                None => return Err(WatchError::EventStreamClosed),
            };
            if !self.triggers_reload(&event) {
                tracing::trace!(kind = ?event.kind, "ignoring credential file event");
                continue;
            }

            tracing::info!("auth file changed, read again...");
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                sent = signals.send(ReloadSignal) => {
                    if sent.is_err() {
                        // the coordinator only stops on cancellation
                        cancel.cancelled().await;
                        return Ok(());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, AccessMode, CreateKind, DataChange, MetadataKind, RemoveKind};

    #[test]
    fn test_write_events() {
        assert!(is_write(&EventKind::Modify(ModifyKind::Data(DataChange::Any))));
        assert!(is_write(&EventKind::Modify(ModifyKind::Data(DataChange::Content))));
        assert!(is_write(&EventKind::Modify(ModifyKind::Any)));
    }

    #[test]
    fn test_non_write_events() {
        assert!(!is_write(&EventKind::Create(CreateKind::File)));
        assert!(!is_write(&EventKind::Remove(RemoveKind::File)));
        assert!(!is_write(&EventKind::Modify(ModifyKind::Metadata(
            MetadataKind::Permissions
        ))));
        assert!(!is_write(&EventKind::Modify(ModifyKind::Name(RenameMode::To))));
        assert!(!is_write(&EventKind::Access(AccessKind::Close(AccessMode::Write))));
    }

    #[test]
    fn test_replacement_events() {
        assert!(is_replacement(&EventKind::Create(CreateKind::File)));
        assert!(is_replacement(&EventKind::Modify(ModifyKind::Name(RenameMode::To))));
        assert!(is_replacement(&EventKind::Modify(ModifyKind::Name(RenameMode::Both))));
        assert!(!is_replacement(&EventKind::Modify(ModifyKind::Name(RenameMode::From))));
        assert!(!is_replacement(&EventKind::Remove(RemoveKind::File)));
    }

    #[test]
    fn test_unconsumed_events_stay_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens");
        std::fs::write(&path, "a = 0\n").unwrap();
        let watcher = ReloadWatcher::establish(&path, WatchScope::File).unwrap();

        // nothing drains the buffer, so the OS watch thread has to wait
        for i in 0..200 {
            std::fs::write(&path, format!("a = {i}\n")).unwrap();
        }
        std::thread::sleep(std::time::Duration::from_millis(300));

        assert!(!watcher.events.is_empty());
        assert!(watcher.events.len() <= EVENT_BUFFER);
        drop(watcher);
    }

    #[test]
    fn test_establish_on_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = ReloadWatcher::establish(dir.path().join("missing"), WatchScope::File);
        assert!(matches!(result, Err(WatchError::Establish { .. })));
    }
}
