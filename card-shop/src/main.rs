//! card-shop server binary

use std::time::Duration;

use card_shop::config::{BoxError, Config};
use card_shop::services::sweeper;
use card_shop::state::AppState;
use card_shop::tasks::BackgroundTasks;
use card_shop::{api, logger};

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;
    logger::init_logger(&config.log_level, config.log_dir.as_deref());

    tracing::info!("Starting card-shop (env: {})", config.environment);

    // Migrations run here; nothing is served before they succeed
    let state = AppState::new(&config).await?;

    let mut tasks = BackgroundTasks::new();
    let token = tasks.shutdown_token();
    let pool = state.pool.clone();
    let rules = state.rules();
    let interval = Duration::from_secs(config.sweep_interval_secs);
    tasks.spawn("expiry_sweeper", async move {
        sweeper::run_periodic(pool, rules, interval, token).await;
    });

    let app = api::create_router(state);
    let http_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("card-shop HTTP listening on {http_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tasks.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
