// src/main.rs - flag parsing, logging setup and process exit handling
use clap::Parser;
use multiuser_authd::config::Cli;
use multiuser_authd::service::Service;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = Cli::parse().into_config();

    // Initialize logging
    let level = config
        .as_ref()
        .ok()
        .and_then(|c| c.tracing_level().ok())
        .unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .init();

    let config = config.map_err(|e| {
        tracing::error!("parse configuration error: {}", e);
        Box::new(e) as BoxError
    })?;

    tracing::info!("Starting multiuser-authd {}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Credential file: {}", config.credentials_file.display());
    tracing::info!("Live reload: {}", if config.live_reload { "enabled" } else { "disabled" });

    let service = Service::new(config).await.map_err(|e| {
        tracing::error!("{}", e);
        Box::new(e) as BoxError
    })?;

    let cancel = service.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            cancel.cancel();
        }
    });

    service.run().await.map_err(|e| {
        tracing::error!("{}", e);
        Box::new(e) as BoxError
    })?;

    tracing::info!("shutdown complete");
    Ok(())
}
