// /party-tickets/services/ticket-service/src/main.rs

mod models;
mod api;
mod core;
mod repository;
mod middleware;
mod utils;

use sqlx::postgres::PgPoolOptions;
use std::{env, sync::Arc, time::Duration};
use tracing::info;
use crate::{
    api::routes,
    core::services::*,
    repository::Repository,
    middleware::rate_limit::RateLimiter,
    utils::scheduler::{start_background_jobs, SchedulerMetrics},
};

#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<Repository>,
    pub payment_service: Arc<PaymentService>,
    pub rate_limiter: Arc<RateLimiter>,
    pub scheduler_metrics: Arc<SchedulerMetrics>,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging
    utils::logger::init_logger();

    // Setup database connection pool
    let database_url = env::var("DATABASE_URL")
        .map_err(|_| "DATABASE_URL harus di-set di environment")?;

    let pool = PgPoolOptions::new()
        .max_connections(env_or("DATABASE_MAX_CONNECTIONS", 10))
        .acquire_timeout(Duration::from_secs(env_or("DATABASE_ACQUIRE_TIMEOUT_SECONDS", 3)))
        .connect(&database_url)
        .await?;

    sqlx::query("SELECT 1").fetch_one(&pool).await?;
    info!("✅ Database berhasil terkoneksi");

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("✅ Migrations applied");

    // Initialize repository layer
    let repository = Arc::new(Repository::new(pool));

    // Daraja client, gagal startup kalau credentials tidak lengkap
    let daraja_config = DarajaConfig::from_env()?;
    let daraja_environment = if daraja_config.is_production { "production" } else { "sandbox" };
    let daraja = Arc::new(DarajaClient::new(daraja_config)?);
    info!("✅ Daraja client ready, callback URL {}", daraja.callback_url());

    let payment_service = Arc::new(PaymentService::new(repository.clone(), daraja));

    // Initialize rate limiter
    let rate_limiter = Arc::new(RateLimiter::new(
        env_or("RATE_LIMIT_MAX_REQUESTS", 20),
        env_or("RATE_LIMIT_WINDOW_SECONDS", 60),
    ));

    // Start background jobs, scheduler harus tetap hidup selama server jalan
    let scheduler_metrics = SchedulerMetrics::new();
    let mut scheduler = start_background_jobs(
        payment_service.clone(),
        repository.clone(),
        scheduler_metrics.clone(),
        env_or("PAYMENT_EXPIRY_MINUTES", 15),
    ).await?;

    let app_state = AppState {
        repository,
        payment_service,
        rate_limiter,
        scheduler_metrics,
    };

    let app = routes::build_app(app_state);

    // Server configuration
    let port = env::var("TICKET_SERVICE_PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .unwrap_or_else(|_| "3004".to_string());
    let bind_address = format!("0.0.0.0:{}", port);

    utils::banner::print_startup_banner(&bind_address, daraja_environment);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("🚀 Ticket Service berjalan di {}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!("Scheduler shutdown error: {}", e);
    }
    info!("👋 Ticket Service stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
