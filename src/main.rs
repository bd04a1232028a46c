use crosspost::bootstrap;
use crosspost::config::Config;
use crosspost::infrastructure::http::router::build_router;
use crosspost::infrastructure::persistence::Database;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crosspost=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Initialize database connection
    let db = Database::connect(&config.database_url).await?;
    tracing::info!("Database connection established");

    // Create queue tables
    db.init_schema().await?;
    tracing::info!("Database schema ready");

    // Build application state and the worker
    let context = bootstrap::build_app_state(db, &config).await?;

    // Start the queue worker
    let worker = context.worker.clone();
    tokio::spawn(async move {
        worker.run().await;
    });
    tracing::info!("Queue worker started");

    // Build router
    let app = build_router(context.state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
