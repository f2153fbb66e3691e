use bootcamp_directory::app::{build_router, AppState};
use bootcamp_directory::config::AppConfig;
use bootcamp_directory::db::indexes::ensure_indexes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bootcamp_directory=info,tower_http=info".into()),
        )
        .init();

    let config = AppConfig::load()?;
    tracing::info!(environment = ?config.environment, "Starting bootcamp directory server...");

    let mongo_client = mongodb::Client::with_uri_str(&config.mongodb_uri).await?;
    let mongo_db = mongo_client.database(&config.mongodb_database);
    ensure_indexes(&mongo_db).await?;
    tracing::info!(database = %config.mongodb_database, "Connected to MongoDB");

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = AppState::build(config, &mongo_db).await?;
    let app = build_router(state);

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}
