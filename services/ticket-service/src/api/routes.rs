// /party-tickets/services/ticket-service/src/api/routes.rs

use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
    middleware as axum_middleware,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use crate::{
    AppState,
    core::daraja::STK_PUSH_WORST_CASE_SECS,
    middleware::{rate_limit::rate_limit_middleware, security::security_headers_middleware},
    utils::cors::create_cors_layer,
};
use super::handlers;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Create semua routes untuk ticket service, kecuali STK push
pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/api/payments/{checkout_request_id}", get(handlers::get_payment))

        // Callback dari Daraja (public, tanpa rate limit)
        .route("/api/callback", post(handlers::mpesa_callback))

        // Price quotes
        .route("/api/quotes/tickets", post(handlers::ticket_quote))
        .route("/api/quotes/space", post(handlers::space_quote))

        // Monitoring
        .route("/health", get(handlers::health_check))
        .route("/health/detailed", get(handlers::comprehensive_health_check_handler))
}

/// Route STK push, timeout-nya di atas worst case chain Daraja
pub fn stk_push_routes() -> Router<AppState> {
    Router::new()
        .route("/api/stk-push", post(handlers::stk_push))
}

fn timeout_layer(secs: u64) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(secs))
}

/// Router lengkap dengan middleware stack
pub fn build_app(app_state: AppState) -> Router {
    Router::new()
        .merge(create_routes().layer(timeout_layer(REQUEST_TIMEOUT_SECS)))
        .merge(stk_push_routes().layer(timeout_layer(STK_PUSH_WORST_CASE_SECS + 5)))
        .with_state(app_state.clone())
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                // CORS di luar rate limiter, 429 tetap bisa dibaca browser
                .layer(create_cors_layer())
                .layer(axum_middleware::from_fn(security_headers_middleware))
                .layer(axum_middleware::from_fn_with_state(
                    app_state,
                    rate_limit_middleware,
                ))
        )
}
