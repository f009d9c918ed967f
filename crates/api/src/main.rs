use anyhow::Context;

use licensedesk_api::app;
use licensedesk_api::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    licensedesk_observability::init();

    let config = AppConfig::from_env()?;
    let (router, services) = app::build_app(&config).await?;

    let scanner = config
        .notification_email
        .is_some()
        .then(|| services.scanner.spawn());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(handle) = scanner {
        handle.shutdown().await;
    }

    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
