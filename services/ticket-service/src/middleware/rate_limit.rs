// /party-tickets/services/ticket-service/src/middleware/rate_limit.rs
use axum::{
    extract::{Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::{Json, Response},
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use chrono::{Utc, Duration};
use crate::{AppState, models::ErrorResponse};

/// Rate limiter per client dengan token bucket algorithm.
///
/// Membatasi spam STK prompt ke nomor orang lain.
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<RwLock<HashMap<String, TokenBucket>>>,
    max_requests: u32,
    window_seconds: i64,
}

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: u32,
    last_refill: chrono::DateTime<Utc>,
}

impl RateLimiter {
    /// Create rate limiter baru, plus cleanup task untuk bucket lama
    pub fn new(max_requests: u32, window_seconds: i64) -> Self {
        let window_seconds = window_seconds.max(1);
        let limiter = Self {
            buckets: Arc::new(RwLock::new(HashMap::new())),
            max_requests: max_requests.max(1),
            window_seconds,
        };

        let buckets_clone = limiter.buckets.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(
                std::time::Duration::from_secs(window_seconds as u64 * 2)
            );

            loop {
                interval.tick().await;
                let mut buckets = buckets_clone.write().await;
                let cutoff = Utc::now() - Duration::seconds(window_seconds * 2);
                buckets.retain(|_, bucket| bucket.last_refill > cutoff);
            }
        });

        limiter
    }

    pub fn window_seconds(&self) -> i64 {
        self.window_seconds
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Ambil satu token, false kalau bucket kosong
    pub async fn check_rate_limit(&self, identifier: &str) -> bool {
        let mut buckets = self.buckets.write().await;
        let now = Utc::now();

        let bucket = buckets.entry(identifier.to_string()).or_insert_with(|| {
            TokenBucket {
                tokens: self.max_requests,
                last_refill: now,
            }
        });

        let elapsed = (now - bucket.last_refill).num_seconds();
        if elapsed >= self.window_seconds {
            bucket.tokens = self.max_requests;
            bucket.last_refill = now;
        } else if elapsed > 0 {
            // Gradual refill, last_refill hanya maju kalau ada token baru
            let refill_rate = self.max_requests as f64 / self.window_seconds as f64;
            let tokens_to_add = (elapsed as f64 * refill_rate) as u32;
            if tokens_to_add > 0 {
                bucket.tokens = (bucket.tokens + tokens_to_add).min(self.max_requests);
                bucket.last_refill = now;
            }
        }

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            true
        } else {
            false
        }
    }
}

/// Identifier client dari proxy headers
fn client_identifier(req: &Request) -> String {
    req.headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| {
            req.headers()
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(str::trim)
        })
        .unwrap_or("unknown")
        .to_string()
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let path = req.uri().path();

    // Skip untuk preflight, health dan callback dari Daraja
    if req.method() == Method::OPTIONS || path.starts_with("/health") || path == "/api/callback" {
        return Ok(next.run(req).await);
    }

    let identifier = client_identifier(&req);

    if !state.rate_limiter.check_rate_limit(&identifier).await {
        tracing::warn!("Rate limit exceeded for: {}", identifier);

        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorResponse {
                success: false,
                message: "Too many requests. Please try again later.".to_string(),
                error_code: Some("RATE_LIMIT_EXCEEDED".to_string()),
                details: Some(serde_json::json!({
                    "retry_after_seconds": state.rate_limiter.window_seconds(),
                    "limit": format!(
                        "{} requests per {} seconds",
                        state.rate_limiter.max_requests(),
                        state.rate_limiter.window_seconds()
                    )
                })),
            })
        ));
    }

    Ok(next.run(req).await)
}
