// /party-tickets/services/ticket-service/src/utils/logger.rs

use tracing_subscriber::EnvFilter;

/// Logger initialization, RUST_LOG override default filter
pub fn init_logger() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ticket_service=debug,tower_http=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();
}
