// /party-tickets/services/ticket-service/src/core/daraja.rs

use reqwest::{Client, Response, StatusCode};
use std::env;
use std::time::{Duration, Instant};
use base64::Engine;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use crate::{
    models::*,
    utils::error::{AppError, AppResult},
};

const SANDBOX_BASE_URL: &str = "https://sandbox.safaricom.co.ke";
const PRODUCTION_BASE_URL: &str = "https://api.safaricom.co.ke";

/// Token di-refresh sebelum benar-benar expired
const TOKEN_EXPIRY_MARGIN_SECS: u64 = 60;
const DEFAULT_TOKEN_TTL_SECS: u64 = 3599;
const TOKEN_FETCH_ATTEMPTS: u32 = 3;

/// Timeout per request ke Daraja
pub const HTTP_TIMEOUT_SECS: u64 = 10;

/// Worst case satu `stk_push`: token (3 attempts + backoff), push 401,
/// token lagi, push lagi. Route timeout harus di atas nilai ini.
pub const STK_PUSH_WORST_CASE_SECS: u64 =
    2 * (TOKEN_FETCH_ATTEMPTS as u64 * HTTP_TIMEOUT_SECS + 2) + 2 * HTTP_TIMEOUT_SECS;

/// East Africa Time, UTC+03:00 tanpa DST
const EAT_OFFSET_HOURS: i64 = 3;

/// Konfigurasi Daraja dari environment
#[derive(Debug, Clone)]
pub struct DarajaConfig {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub business_shortcode: String,
    pub passkey: String,
    pub party_b: String,
    pub transaction_type: String,
    pub account_reference: String,
    pub transaction_desc: String,
    pub callback_base_url: String,
    pub callback_secret: Option<String>,
    pub base_url: String,
    pub is_production: bool,
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Configuration(format!("{} not set", name)))
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl DarajaConfig {
    /// Load config dari environment variables
    pub fn from_env() -> AppResult<Self> {
        let consumer_key = required_env("DAR_CONSUMER_KEY")?;
        let consumer_secret = required_env("DAR_CONSUMER_SECRET")?;
        let business_shortcode = required_env("DAR_BUSINESS_SHORTCODE")?;
        let passkey = required_env("DAR_PASSKEY")?;
        let callback_base_url = required_env("CALLBACK_BASE_URL")?;

        let is_production = env_or("DARAJA_ENVIRONMENT", "sandbox").eq_ignore_ascii_case("production");

        let base_url = env::var("DARAJA_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| {
                if is_production { PRODUCTION_BASE_URL } else { SANDBOX_BASE_URL }.to_string()
            });

        Ok(Self {
            party_b: env_or("DAR_PARTY_B", &business_shortcode),
            transaction_type: env_or("DAR_TRANSACTION_TYPE", "CustomerPayBillOnline"),
            account_reference: env_or("DAR_ACCOUNT_REFERENCE", "PartyPayment"),
            transaction_desc: env_or("DAR_TRANSACTION_DESC", "Party ticket payment"),
            callback_secret: env::var("CALLBACK_SECRET").ok().filter(|v| !v.trim().is_empty()),
            consumer_key,
            consumer_secret,
            business_shortcode,
            passkey,
            callback_base_url,
            base_url: base_url.trim_end_matches('/').to_string(),
            is_production,
        })
    }
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Client untuk integrasi dengan Safaricom Daraja (M-Pesa Express)
pub struct DarajaClient {
    client: Client,
    config: DarajaConfig,
    token_cache: RwLock<Option<CachedToken>>,
}

impl DarajaClient {
    /// Initialize Daraja client
    pub fn new(config: DarajaConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            token_cache: RwLock::new(None),
        })
    }

    pub fn config(&self) -> &DarajaConfig {
        &self.config
    }

    /// Timestamp `YYYYMMDDHHmmss` dalam waktu Nairobi
    pub fn timestamp(now: DateTime<Utc>) -> String {
        (now + chrono::Duration::hours(EAT_OFFSET_HOURS))
            .format("%Y%m%d%H%M%S")
            .to_string()
    }

    /// Password STK = base64(shortcode + passkey + timestamp)
    pub fn password(&self, timestamp: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(format!(
            "{}{}{}",
            self.config.business_shortcode, self.config.passkey, timestamp
        ))
    }

    /// URL callback yang dikirim ke Daraja
    pub fn callback_url(&self) -> String {
        let base = format!(
            "{}/api/callback",
            self.config.callback_base_url.trim_end_matches('/')
        );
        match &self.config.callback_secret {
            Some(secret) => format!("{}?token={}", base, secret),
            None => base,
        }
    }

    /// Verify token callback. Tanpa secret semua callback diterima.
    pub fn verify_callback_token(&self, provided: Option<&str>) -> bool {
        match &self.config.callback_secret {
            None => true,
            Some(secret) => provided
                .map(|p| Sha256::digest(p.as_bytes()) == Sha256::digest(secret.as_bytes()))
                .unwrap_or(false),
        }
    }

    /// Access token, dari cache kalau masih valid
    pub async fn access_token(&self) -> AppResult<String> {
        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.expires_at > Instant::now() {
                    return Ok(cached.token.clone());
                }
            }
        }

        let fresh = self.fetch_token_with_retry(TOKEN_FETCH_ATTEMPTS).await?;
        let ttl = fresh.expires_in
            .as_u64()
            .unwrap_or(DEFAULT_TOKEN_TTL_SECS)
            .saturating_sub(TOKEN_EXPIRY_MARGIN_SECS);

        *self.token_cache.write().await = Some(CachedToken {
            token: fresh.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(ttl),
        });

        tracing::debug!("Daraja access token refreshed, valid for {}s", ttl);
        Ok(fresh.access_token)
    }

    async fn invalidate_token(&self) {
        *self.token_cache.write().await = None;
    }

    async fn fetch_token_with_retry(&self, max_attempts: u32) -> AppResult<AccessTokenResponse> {
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match self.fetch_token().await {
                Ok(token) => {
                    if attempt > 1 {
                        tracing::info!("Daraja token fetched on attempt {}", attempt);
                    }
                    return Ok(token);
                }
                Err(e) => {
                    tracing::warn!("Daraja token attempt {} failed: {}", attempt, e);
                    last_error = Some(e);

                    if attempt < max_attempts {
                        tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(||
            AppError::ExternalService("All Daraja token attempts failed".to_string())
        ))
    }

    async fn fetch_token(&self) -> AppResult<AccessTokenResponse> {
        let auth_header = format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(format!(
                "{}:{}",
                self.config.consumer_key, self.config.consumer_secret
            ))
        );

        let response = self.client
            .get(format!(
                "{}/oauth/v1/generate?grant_type=client_credentials",
                self.config.base_url
            ))
            .header("Authorization", auth_header)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = error_message(response).await;
            return Err(AppError::ExternalService(format!(
                "Daraja token error ({}): {}", status, message
            )));
        }

        response.json::<AccessTokenResponse>().await
            .map_err(|e| AppError::ExternalService(format!("Failed to parse Daraja token: {}", e)))
    }

    /// Kirim STK push ke nomor customer.
    ///
    /// Tidak di-retry kecuali token ditolak (401), supaya customer tidak
    /// menerima dua prompt.
    pub async fn stk_push(&self, phone: &str, amount: i64) -> AppResult<StkPushResponse> {
        let response = self.send_stk_push(phone, amount).await?;

        let response = if response.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!("Daraja rejected access token, refreshing and retrying once");
            self.invalidate_token().await;
            self.send_stk_push(phone, amount).await?
        } else {
            response
        };

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            // Token baru juga ditolak: masalah credentials, bukan request customer
            let message = error_message(response).await;
            return Err(AppError::ExternalService(format!(
                "Daraja rejected refreshed access token: {}", message
            )));
        }

        if !status.is_success() {
            let message = error_message(response).await;
            return Err(if status.is_client_error() {
                AppError::PaymentRejected(message)
            } else {
                AppError::ExternalService(format!("Daraja STK push error ({}): {}", status, message))
            });
        }

        response.json::<StkPushResponse>().await
            .map_err(|e| AppError::ExternalService(format!("Failed to parse STK push response: {}", e)))
    }

    async fn send_stk_push(&self, phone: &str, amount: i64) -> AppResult<Response> {
        let token = self.access_token().await?;
        let timestamp = Self::timestamp(Utc::now());

        let payload = StkPushPayload {
            business_short_code: self.config.business_shortcode.clone(),
            password: self.password(&timestamp),
            timestamp,
            transaction_type: self.config.transaction_type.clone(),
            amount,
            party_a: phone.to_string(),
            party_b: self.config.party_b.clone(),
            phone_number: phone.to_string(),
            call_back_url: self.callback_url(),
            account_reference: self.config.account_reference.clone(),
            transaction_desc: self.config.transaction_desc.clone(),
        };

        let response = self.client
            .post(format!("{}/mpesa/stkpush/v1/processrequest", self.config.base_url))
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await?;

        Ok(response)
    }

    /// Query status STK push yang sudah dikirim
    pub async fn stk_query(&self, checkout_request_id: &str) -> AppResult<StkQueryResponse> {
        let token = self.access_token().await?;
        let timestamp = Self::timestamp(Utc::now());

        let payload = StkQueryPayload {
            business_short_code: self.config.business_shortcode.clone(),
            password: self.password(&timestamp),
            timestamp,
            checkout_request_id: checkout_request_id.to_string(),
        };

        let response = self.client
            .post(format!("{}/mpesa/stkpushquery/v1/query", self.config.base_url))
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = error_message(response).await;
            return Err(AppError::ExternalService(format!(
                "Daraja STK query error ({}): {}", status, message
            )));
        }

        response.json::<StkQueryResponse>().await
            .map_err(|e| AppError::ExternalService(format!("Failed to parse STK query response: {}", e)))
    }
}

/// Ambil `errorMessage` dari body Daraja, fallback ke raw text
async fn error_message(response: Response) -> String {
    let text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());

    match serde_json::from_str::<DarajaErrorBody>(&text) {
        Ok(DarajaErrorBody { error_message: Some(message), error_code, request_id }) => {
            tracing::debug!(?error_code, ?request_id, "Daraja error body");
            message
        }
        _ if text.trim().is_empty() => "Unknown error".to_string(),
        _ => text,
    }
}

#[cfg(test)]
pub fn test_config(base_url: &str) -> DarajaConfig {
    DarajaConfig {
        consumer_key: "key".to_string(),
        consumer_secret: "secret".to_string(),
        business_shortcode: "174379".to_string(),
        passkey: "passkey".to_string(),
        party_b: "174379".to_string(),
        transaction_type: "CustomerPayBillOnline".to_string(),
        account_reference: "PartyPayment".to_string(),
        transaction_desc: "Party ticket payment".to_string(),
        callback_base_url: "https://tickets.example.com/".to_string(),
        callback_secret: None,
        base_url: base_url.to_string(),
        is_production: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mockito::Matcher;
    use serial_test::serial;

    async fn token_mock(server: &mut mockito::ServerGuard, hits: usize) -> mockito::Mock {
        server
            .mock("GET", "/oauth/v1/generate")
            .match_query(Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()))
            .match_header("authorization", "Basic a2V5OnNlY3JldA==")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "tok123", "expires_in": "3599"}"#)
            .expect(hits)
            .create_async()
            .await
    }

    #[test]
    fn test_timestamp_uses_nairobi_time() {
        let now = Utc.with_ymd_and_hms(2025, 10, 19, 12, 30, 0).unwrap();
        assert_eq!(DarajaClient::timestamp(now), "20251019153000");

        // Lewat tengah malam di Nairobi
        let late = Utc.with_ymd_and_hms(2025, 12, 31, 22, 15, 9).unwrap();
        assert_eq!(DarajaClient::timestamp(late), "20260101011509");
    }

    #[test]
    fn test_password() {
        let client = DarajaClient::new(test_config("http://localhost")).unwrap();
        assert_eq!(
            client.password("20251019153000"),
            "MTc0Mzc5cGFzc2tleTIwMjUxMDE5MTUzMDAw"
        );
    }

    #[test]
    fn test_callback_url_and_token() {
        let client = DarajaClient::new(test_config("http://localhost")).unwrap();
        assert_eq!(client.callback_url(), "https://tickets.example.com/api/callback");
        assert!(client.verify_callback_token(None));

        let mut config = test_config("http://localhost");
        config.callback_secret = Some("s3cret".to_string());
        let client = DarajaClient::new(config).unwrap();
        assert_eq!(client.callback_url(), "https://tickets.example.com/api/callback?token=s3cret");
        assert!(client.verify_callback_token(Some("s3cret")));
        assert!(!client.verify_callback_token(Some("guess")));
        assert!(!client.verify_callback_token(None));
    }

    #[tokio::test]
    async fn test_access_token_is_cached() {
        let mut server = mockito::Server::new_async().await;
        let mock = token_mock(&mut server, 1).await;
        let client = DarajaClient::new(test_config(&server.url())).unwrap();

        assert_eq!(client.access_token().await.unwrap(), "tok123");
        assert_eq!(client.access_token().await.unwrap(), "tok123");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_access_token_failure_is_external_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/oauth/v1/generate")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"requestId": "", "errorCode": "400.008.01", "errorMessage": "Invalid Authentication passed"}"#)
            .expect(TOKEN_FETCH_ATTEMPTS as usize)
            .create_async()
            .await;
        let client = DarajaClient::new(test_config(&server.url())).unwrap();

        let err = client.access_token().await.unwrap_err();
        assert!(matches!(err, AppError::ExternalService(ref msg) if msg.contains("Invalid Authentication passed")));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_stk_push_sends_expected_body() {
        let mut server = mockito::Server::new_async().await;
        let _token = token_mock(&mut server, 1).await;
        let push = server
            .mock("POST", "/mpesa/stkpush/v1/processrequest")
            .match_header("authorization", "Bearer tok123")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "BusinessShortCode": "174379",
                "TransactionType": "CustomerPayBillOnline",
                "Amount": 1500,
                "PartyA": "254712345678",
                "PartyB": "174379",
                "PhoneNumber": "254712345678",
                "CallBackURL": "https://tickets.example.com/api/callback",
                "AccountReference": "PartyPayment",
                "TransactionDesc": "Party ticket payment"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": "ws_CO_191220191020363925",
                "ResponseCode": "0",
                "ResponseDescription": "Success. Request accepted for processing",
                "CustomerMessage": "Success. Request accepted for processing"
            }"#)
            .create_async()
            .await;

        let client = DarajaClient::new(test_config(&server.url())).unwrap();
        let response = client.stk_push("254712345678", 1500).await.unwrap();

        assert!(response.is_accepted());
        assert_eq!(response.checkout_request_id, "ws_CO_191220191020363925");
        push.assert_async().await;
    }

    #[tokio::test]
    async fn test_stk_push_client_error_is_rejection() {
        let mut server = mockito::Server::new_async().await;
        let _token = token_mock(&mut server, 1).await;
        let _push = server
            .mock("POST", "/mpesa/stkpush/v1/processrequest")
            .with_status(400)
            .with_body(r#"{"requestId": "1-2", "errorCode": "400.002.02", "errorMessage": "Bad Request - Invalid PhoneNumber"}"#)
            .create_async()
            .await;

        let client = DarajaClient::new(test_config(&server.url())).unwrap();
        let err = client.stk_push("254712345678", 10).await.unwrap_err();

        assert!(matches!(err, AppError::PaymentRejected(ref msg) if msg == "Bad Request - Invalid PhoneNumber"));
    }

    #[tokio::test]
    async fn test_stk_push_refreshes_rejected_token_once() {
        let mut server = mockito::Server::new_async().await;
        let token = token_mock(&mut server, 2).await;
        let _rejected = server
            .mock("POST", "/mpesa/stkpush/v1/processrequest")
            .with_status(401)
            .with_body(r#"{"errorCode": "404.001.03", "errorMessage": "Invalid Access Token"}"#)
            .expect(2)
            .create_async()
            .await;

        let client = DarajaClient::new(test_config(&server.url())).unwrap();
        let err = client.stk_push("254712345678", 10).await.unwrap_err();

        assert!(matches!(err, AppError::ExternalService(ref msg) if msg.contains("Invalid Access Token")));
        token.assert_async().await;
    }

    #[tokio::test]
    async fn test_stk_push_succeeds_after_token_refresh() {
        let mut server = mockito::Server::new_async().await;
        let token = token_mock(&mut server, 2).await;
        let _rejected = server
            .mock("POST", "/mpesa/stkpush/v1/processrequest")
            .with_status(401)
            .with_body(r#"{"errorCode": "404.001.03", "errorMessage": "Invalid Access Token"}"#)
            .expect(1)
            .create_async()
            .await;
        let _accepted = server
            .mock("POST", "/mpesa/stkpush/v1/processrequest")
            .with_status(200)
            .with_body(r#"{
                "MerchantRequestID": "1-1",
                "CheckoutRequestID": "ws_CO_retry",
                "ResponseCode": "0",
                "ResponseDescription": "Success. Request accepted for processing",
                "CustomerMessage": "Success. Request accepted for processing"
            }"#)
            .create_async()
            .await;

        let client = DarajaClient::new(test_config(&server.url())).unwrap();
        let response = client.stk_push("254712345678", 10).await.unwrap();

        assert_eq!(response.checkout_request_id, "ws_CO_retry");
        token.assert_async().await;
    }

    #[tokio::test]
    async fn test_stk_query() {
        let mut server = mockito::Server::new_async().await;
        let _token = token_mock(&mut server, 1).await;
        let _query = server
            .mock("POST", "/mpesa/stkpushquery/v1/query")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "BusinessShortCode": "174379",
                "CheckoutRequestID": "ws_CO_1"
            })))
            .with_status(200)
            .with_body(r#"{
                "ResponseCode": "0",
                "ResponseDescription": "The service request has been accepted successsfully",
                "MerchantRequestID": "22205-34066-1",
                "CheckoutRequestID": "ws_CO_1",
                "ResultCode": "1032",
                "ResultDesc": "Request cancelled by user"
            }"#)
            .create_async()
            .await;

        let client = DarajaClient::new(test_config(&server.url())).unwrap();
        let response = client.stk_query("ws_CO_1").await.unwrap();

        assert_eq!(response.result_code.and_then(|c| c.as_u64()), Some(1032));
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        for (key, value) in [
            ("DAR_CONSUMER_KEY", "key"),
            ("DAR_CONSUMER_SECRET", "secret"),
            ("DAR_BUSINESS_SHORTCODE", "174379"),
            ("DAR_PASSKEY", "passkey"),
            ("CALLBACK_BASE_URL", "https://tickets.example.com"),
            ("DARAJA_ENVIRONMENT", "production"),
        ] {
            env::set_var(key, value);
        }
        env::remove_var("DARAJA_BASE_URL");
        env::remove_var("DAR_PARTY_B");

        let config = DarajaConfig::from_env().unwrap();
        assert!(config.is_production);
        assert_eq!(config.base_url, PRODUCTION_BASE_URL);
        assert_eq!(config.party_b, "174379");
        assert_eq!(config.account_reference, "PartyPayment");

        env::remove_var("DAR_PASSKEY");
        assert!(matches!(DarajaConfig::from_env(), Err(AppError::Configuration(_))));

        for key in ["DAR_CONSUMER_KEY", "DAR_CONSUMER_SECRET", "DAR_BUSINESS_SHORTCODE", "CALLBACK_BASE_URL", "DARAJA_ENVIRONMENT"] {
            env::remove_var(key);
        }
    }
}
