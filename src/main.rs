use std::sync::Arc;

use discord_connector::{
    build_router,
    config::AppConfig,
    connector::{Connector, SyncOptions},
    discord::RestClient,
    errors::{AppError, AppResult},
    sync, AppState,
};

// ─── Main ──────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "discord_connector=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    let mode = std::env::args().nth(1).unwrap_or_else(|| "serve".into());

    if let Err(e) = run(&mode).await {
        tracing::error!("{} failed: {}", mode, e);
        std::process::exit(1);
    }
}

async fn run(mode: &str) -> AppResult<()> {
    // Load configuration; a missing token is fatal
    let config = AppConfig::from_env()?;

    let client = RestClient::new(&config)?;
    let mut connector = Connector::new(Arc::new(client), SyncOptions::from(&config));

    match mode {
        "serve" => serve(config, connector).await,
        "validate" => connector.validate().await,
        "sync" => {
            connector.validate().await?;
            let snapshot = sync::run_sync(&mut connector).await?;
            sync::write_snapshot(&snapshot, &config.sync_output).await?;
            tracing::info!("Wrote sync snapshot to {}", config.sync_output);
            Ok(())
        }
        other => Err(AppError::BadRequest(format!(
            "unknown mode {other:?}, expected serve, sync or validate"
        ))),
    }
}

async fn serve(config: AppConfig, connector: Connector) -> AppResult<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let app = build_router(AppState::new(config, connector));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Discord connector listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Discord connector shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
