// /party-tickets/services/ticket-service/src/utils/banner.rs

/// Print startup banner
pub fn print_startup_banner(bind_address: &str, daraja_environment: &str) {
    println!(r#"
╔══════════════════════════════════════════════════════════╗
║                  TICKET SERVICE v1.0.0                    ║
║                 M-Pesa STK Push Payments                  ║
╚══════════════════════════════════════════════════════════╝
    "#);

    tracing::info!("🚀 Ticket Service starting at {} (Daraja {})", bind_address, daraja_environment);
    tracing::info!("📋 Available endpoints:");
    tracing::info!("  Public:");
    tracing::info!("    POST /api/stk-push                    - Initiate M-Pesa payment");
    tracing::info!("    GET  /api/payments/:checkout_id       - Payment status (?refresh=true)");
    tracing::info!("    POST /api/quotes/tickets              - Ticket price quote");
    tracing::info!("    POST /api/quotes/space                - Space booking quote");
    tracing::info!("  Daraja:");
    tracing::info!("    POST /api/callback                    - STK push callback");
    tracing::info!("  Monitoring:");
    tracing::info!("    GET  /health                          - Liveness");
    tracing::info!("    GET  /health/detailed                 - Component health");
}
