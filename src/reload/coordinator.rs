use super::ReloadSignal;
use authd_shared::{CredentialError, CredentialStore, load_credentials};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Re-reads the credential file on every reload signal and installs the
/// result into the store. A failed read keeps the previous mapping.
pub struct ReloadCoordinator {
    path: PathBuf,
    store: Arc<CredentialStore>,
    reloads: AtomicU64,
}

impl ReloadCoordinator {
    pub fn new(path: impl AsRef<Path>, store: Arc<CredentialStore>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            store,
            reloads: AtomicU64::new(0),
        }
    }

    /// Successful reload cycles so far.
    pub fn reload_count(&self) -> u64 {
        self.reloads.load(Ordering::Relaxed)
    }

    /// One reload cycle. Returns the number of entries now in effect.
    pub async fn reload_once(&self) -> Result<usize, CredentialError> {
        let mapping = load_credentials(&self.path).await?;
        let entries = mapping.len();
        self.store.replace(mapping);
        self.reloads.fetch_add(1, Ordering::Relaxed);
        Ok(entries)
    }

    /// Drain reload signals until cancelled.
    pub async fn run(
        self: Arc<Self>,
        mut signals: mpsc::Receiver<ReloadSignal>,
        cancel: CancellationToken,
    ) {
        loop {
            let signal = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                signal = signals.recv() => signal,
            };
            if signal.is_none() {
                // watcher is gone; nothing more will arrive
                cancel.cancelled().await;
                return;
            }
            match self.reload_once().await {
                Ok(entries) => tracing::info!(entries, "credential file reloaded"),
                Err(e) => tracing::warn!("read auth file error: {}", e),
            }
        }
    }
}
