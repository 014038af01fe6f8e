// /party-tickets/services/ticket-service/src/api/handlers.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use validator::Validate;

use crate::{
    core::pricing,
    models::*,
    AppState,
    utils::{
        error::{AppError, AppResult},
        validator as utils_validator,
    },
};

// ========================= PAYMENT HANDLERS =========================

/// Handler untuk initiate M-Pesa STK push
/// POST /api/stk-push
///
/// `initiate` jalan di task sendiri: kalau request di-cancel (timeout,
/// client disconnect), record tetap selesai sampai checkout id tersimpan.
pub async fn stk_push(
    State(state): State<AppState>,
    Json(payload): Json<StkPushRequest>,
) -> AppResult<Json<StkPushResponseBody>> {
    let payment_service = state.payment_service.clone();
    let data = tokio::spawn(async move { payment_service.initiate(&payload).await })
        .await
        .map_err(|e| AppError::Internal(format!("STK push task failed: {}", e)))??;

    Ok(Json(StkPushResponseBody {
        success: true,
        message: "Payment request sent".to_string(),
        data,
    }))
}

/// Handler untuk payment status
/// GET /api/payments/{checkout_request_id}
pub async fn get_payment(
    State(state): State<AppState>,
    Path(checkout_request_id): Path<String>,
    Query(params): Query<PaymentQueryParams>,
) -> AppResult<Json<PaymentResponse>> {
    utils_validator::validate_checkout_request_id(&checkout_request_id)?;

    let payment = if params.refresh {
        state.payment_service.refresh_payment(&checkout_request_id).await?
    } else {
        state.payment_service.get_payment(&checkout_request_id).await?
    };

    Ok(Json(PaymentResponse {
        success: true,
        message: format!("Payment is {}", payment.status),
        data: Some(payment),
    }))
}

// ========================= CALLBACK HANDLERS =========================

#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    pub token: Option<String>,
}

/// Handler untuk callback dari Daraja
/// POST /api/callback
pub async fn mpesa_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    Json(payload): Json<serde_json::Value>,
) -> AppResult<Json<CallbackAck>> {
    tracing::info!("Callback received: {}", payload);

    state.payment_service
        .process_callback(payload, query.token.as_deref())
        .await?;

    Ok(Json(CallbackAck::accepted()))
}

// ========================= QUOTE HANDLERS =========================

/// Handler untuk quote harga tiket
/// POST /api/quotes/tickets
pub async fn ticket_quote(
    Json(payload): Json<TicketQuoteRequest>,
) -> AppResult<Json<serde_json::Value>> {
    payload.validate()?;

    let quote = pricing::ticket_quote(payload.price, payload.qty);

    Ok(Json(serde_json::json!({
        "success": true,
        "data": quote,
    })))
}

/// Handler untuk quote space booking
/// POST /api/quotes/space
pub async fn space_quote(
    Json(payload): Json<SpaceQuoteRequest>,
) -> AppResult<Json<serde_json::Value>> {
    payload.validate()?;

    let quote = pricing::space_quote(
        payload.full_day_price,
        payload.half_day_price,
        payload.duration,
        payload.catering,
        payload.decoration,
        payload.tech_support,
    );

    Ok(Json(serde_json::json!({
        "success": true,
        "data": quote,
    })))
}

// ========================= HEALTH HANDLERS =========================

/// Liveness check
/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let daraja = state.payment_service.daraja().config();

    Json(serde_json::json!({
        "service": "ticket-service",
        "status": "healthy",
        "timestamp": chrono::Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
        "daraja_environment": if daraja.is_production { "production" } else { "sandbox" },
        "environment": crate::utils::cors::get_environment(),
    }))
}

/// Handler untuk comprehensive health check
/// GET /health/detailed
pub async fn comprehensive_health_check_handler(
    State(state): State<AppState>,
) -> (StatusCode, Json<serde_json::Value>) {
    let health_result = crate::utils::health::comprehensive_health_check(
        &state.repository,
        &state.scheduler_metrics,
        state.payment_service.daraja(),
    ).await;

    let status = match health_result.status {
        crate::utils::health::HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };

    let scheduler = state.scheduler_metrics.get_status().await;
    let mut body = serde_json::to_value(&health_result)
        .unwrap_or_else(|_| serde_json::json!({ "status": "Unhealthy" }));
    body["scheduler"] = scheduler;

    (status, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{io::Write as _, sync::Arc, time::Duration};
    use mockito::Matcher;
    use sqlx::PgPool;
    use crate::{
        core::{daraja::test_config, services::*},
        middleware::rate_limit::RateLimiter,
        repository::Repository,
        utils::scheduler::SchedulerMetrics,
    };

    fn state(pool: PgPool, base_url: &str) -> AppState {
        let repository = Arc::new(Repository::new(pool));
        let daraja = Arc::new(DarajaClient::new(test_config(base_url)).unwrap());

        AppState {
            repository: repository.clone(),
            payment_service: Arc::new(PaymentService::new(repository, daraja)),
            rate_limiter: Arc::new(RateLimiter::new(20, 60)),
            scheduler_metrics: SchedulerMetrics::new(),
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_cancelled_request_still_records_checkout(pool: PgPool) {
        let mut server = mockito::Server::new_async().await;
        let _token = server
            .mock("GET", "/oauth/v1/generate")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"access_token": "tok123", "expires_in": "3599"}"#)
            .create_async()
            .await;
        // Daraja lambat menjawab, request HTTP sudah keburu di-cancel
        let push = server
            .mock("POST", "/mpesa/stkpush/v1/processrequest")
            .with_status(200)
            .with_chunked_body(|w| {
                std::thread::sleep(Duration::from_millis(800));
                w.write_all(br#"{
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": "ws_CO_slow",
                    "ResponseCode": "0",
                    "ResponseDescription": "Success. Request accepted for processing",
                    "CustomerMessage": "Success. Request accepted for processing"
                }"#)
            })
            .expect(1)
            .create_async()
            .await;

        let state = state(pool, &server.url());
        let request: StkPushRequest = serde_json::from_value(serde_json::json!({
            "name": "Wanjiru Kamau",
            "email": "wanjiru@example.com",
            "phone": "0712345678",
            "amount": 1500
        }))
        .unwrap();

        let cancelled = tokio::time::timeout(
            Duration::from_millis(100),
            stk_push(State(state.clone()), Json(request)),
        )
        .await;
        assert!(cancelled.is_err());

        let mut recorded = None;
        for _ in 0..50 {
            recorded = state.repository.payment()
                .find_by_checkout_request_id("ws_CO_slow")
                .await
                .unwrap();
            if recorded.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        let recorded = recorded.expect("checkout id stored after cancellation");
        assert_eq!(recorded.status(), PaymentStatus::Pending);
        push.assert_async().await;

        // Callback berikutnya tetap cocok dengan record
        let paid = state.payment_service
            .process_callback(
                serde_json::json!({
                    "Body": { "stkCallback": {
                        "MerchantRequestID": "29115-34620561-1",
                        "CheckoutRequestID": "ws_CO_slow",
                        "ResultCode": 0,
                        "ResultDesc": "The service request is processed successfully.",
                        "CallbackMetadata": { "Item": [
                            { "Name": "Amount", "Value": 1500 },
                            { "Name": "MpesaReceiptNumber", "Value": "SJK4SLOWRC" }
                        ]}
                    }}
                }),
                None,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(paid.status(), PaymentStatus::Paid);
    }
}
