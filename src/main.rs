// src/main.rs

use forum_backend::config::Config;
use forum_backend::db;
use forum_backend::forum::Forum;
use forum_backend::routes;
use forum_backend::state::AppState;
use sqlx::SqlitePool;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from environment (.env included, if present)
    let config = Config::from_env()?;

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let pool = connect_with_retry(&config).await?;
    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Migrations applied successfully.");

    let forum = Forum::new(pool, config.thread_settings());

    // Seed Forum Admin
    if let Some(address) = &config.admin_address {
        match forum.ensure_forum_admin(address).await {
            Ok(admin) => tracing::info!("Forum admin ready: {} (id {})", admin.address, admin.id),
            Err(e) => tracing::error!("Failed to seed forum admin: {}", e),
        }
    }

    let state = AppState {
        forum,
        config: config.clone(),
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    // Start the server
    axum::serve(listener, app).await?;

    Ok(())
}

async fn connect_with_retry(config: &Config) -> Result<SqlitePool, sqlx::Error> {
    let mut retry_count = 0;
    loop {
        match db::connect(&config.database_url, 5).await {
            Ok(pool) => return Ok(pool),
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    tracing::error!("Failed to connect to database after 5 retries: {}", e);
                    return Err(e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}
