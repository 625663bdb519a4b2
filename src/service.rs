//! Wires the credential store, the reload pipeline and the HTTP listener
//! together under one cancellation token.

use crate::config::{Config, ConfigError};
use crate::reload::{ReloadCoordinator, ReloadSignal, ReloadWatcher, WatchError, WatchScope};
use crate::web::api::create_router;
use authd_shared::{CredentialError, CredentialSource, CredentialStore, load_credentials};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("read auth file error: {0}")]
    Credentials(#[from] CredentialError),
    #[error("inotify auth file error: {0}")]
    Watch(#[from] WatchError),
    #[error("listener error: {0}")]
    Io(#[from] std::io::Error),
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Handles for the reload tasks; empty when live reload is off.
#[derive(Default)]
struct BackgroundTasks {
    watcher: Option<JoinHandle<Result<(), WatchError>>>,
    coordinator: Option<JoinHandle<()>>,
}

impl BackgroundTasks {
    /// Wait for both tasks to acknowledge cancellation.
    async fn join(self) -> Result<(), ServiceError> {
        if let Some(coordinator) = self.coordinator {
            coordinator.await?;
        }
        if let Some(watcher) = self.watcher {
            watcher.await??;
        }
        Ok(())
    }
}

pub struct Service {
    config: Config,
    store: Arc<CredentialStore>,
    coordinator: Arc<ReloadCoordinator>,
    cancel: CancellationToken,
}

impl Service {
    /// Validate the configuration and load the initial credentials.
    /// Either failing means the service must not start.
    pub async fn new(config: Config) -> Result<Self, ServiceError> {
        config.validate()?;
        let initial = load_credentials(&config.credentials_file).await?;
        tracing::info!(
            path = %config.credentials_file.display(),
            entries = initial.len(),
            "loaded credential file"
        );
        let store = Arc::new(CredentialStore::new(initial));
        let coordinator = Arc::new(ReloadCoordinator::new(
            &config.credentials_file,
            Arc::clone(&store),
        ));
        Ok(Self {
            config,
            store,
            coordinator,
            cancel: CancellationToken::new(),
        })
    }

    pub fn store(&self) -> Arc<CredentialStore> {
        Arc::clone(&self.store)
    }

    pub fn coordinator(&self) -> Arc<ReloadCoordinator> {
        Arc::clone(&self.coordinator)
    }

    /// Cancelling this token shuts the whole service down.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn router(&self) -> axum::Router {
        let credentials: Arc<dyn CredentialSource> = self.store();
        create_router(credentials, self.config.max_body_bytes)
    }

    /// Bind the configured address and serve until cancelled.
    pub async fn run(self) -> Result<(), ServiceError> {
        let target = self.config.listen_target()?;
        // the watch is established before any traffic is accepted
        let background = self.start_background()?;
        let listener = match TcpListener::bind(&target).await {
            Ok(listener) => listener,
            Err(e) => {
                self.cancel.cancel();
                background.join().await?;
                return Err(e.into());
            }
        };
        self.serve_with(listener, background).await
    }

    /// Serve on an already bound listener until cancelled.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServiceError> {
        let background = self.start_background()?;
        self.serve_with(listener, background).await
    }

    async fn serve_with(
        self,
        listener: TcpListener,
        background: BackgroundTasks,
    ) -> Result<(), ServiceError> {
        tracing::info!("listen on {}", listener.local_addr()?);
        let shutdown = {
            let cancel = self.cancel.clone();
            async move {
                cancel.cancelled().await;
                tracing::info!("HTTP server shutting down gracefully (cancellation)");
            }
        };
        let served = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await;

        // the listener is gone either way; stop background work before reporting
        self.cancel.cancel();
        let background = background.join().await;
        served?;
        background
    }

    fn start_background(&self) -> Result<BackgroundTasks, ServiceError> {
        if !self.config.live_reload {
            return Ok(BackgroundTasks::default());
        }

        let scope = if self.config.watch_replacements {
            WatchScope::Replacements
        } else {
            WatchScope::File
        };
        let watcher = ReloadWatcher::establish(&self.config.credentials_file, scope)?;
        let (signal_tx, signal_rx) =
            mpsc::channel::<ReloadSignal>(self.config.reload_queue_capacity);

        let cancel = self.cancel.clone();
        let watcher = tokio::spawn(async move {
            let result = watcher.run(signal_tx, cancel.clone()).await;
            if let Err(e) = &result {
                tracing::error!("inotify auth file error: {}", e);
                cancel.cancel();
            }
            result
        });
        let coordinator = Arc::clone(&self.coordinator);
        let coordinator = tokio::spawn(coordinator.run(signal_rx, self.cancel.clone()));

        Ok(BackgroundTasks {
            watcher: Some(watcher),
            coordinator: Some(coordinator),
        })
    }
}
