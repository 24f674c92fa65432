use clap::Parser;
use hms_server::{app, config::AppConfig, db, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::parse();

    let pool = config.db_config().connect().await?;
    let applied = db::run_migrations(&pool).await?;
    tracing::info!(applied, url = %config.database_url, "database ready");

    let app = app(AppState::new(pool));

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    tracing::info!("HMS API running on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
