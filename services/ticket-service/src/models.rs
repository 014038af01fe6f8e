// /party-tickets/services/ticket-service/src/models.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use chrono::{DateTime, Utc};
use validator::Validate;

// ========================= DOMAIN MODELS =========================

/// Model Payment dari database
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub amount: i64,
    pub quantity: i32,
    pub event_name: Option<String>,
    pub currency: String,
    pub status: String,
    pub merchant_request_id: Option<String>,
    pub checkout_request_id: Option<String>,
    pub mpesa_receipt_number: Option<String>,
    pub result_code: Option<i32>,
    pub result_desc: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn status(&self) -> PaymentStatus {
        PaymentStatus::from_db(&self.status)
    }
}

/// Data yang dibutuhkan untuk insert payment pending
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub amount: i64,
    pub quantity: i32,
    pub event_name: Option<String>,
    pub currency: String,
}

/// Counter per status untuk health dan daily stats
#[derive(Debug, Default, Clone, Serialize)]
pub struct PaymentStats {
    pub total: i64,
    pub pending: i64,
    pub paid: i64,
    pub failed: i64,
    pub cancelled: i64,
    pub expired: i64,
    pub paid_amount: i64,
}

// ========================= REQUEST DTOs =========================

fn default_quantity() -> i32 {
    1
}

/// Request dari payment form di browser
///
/// Field string default ke kosong supaya field yang hilang dilaporkan
/// sebagai "Missing fields", bukan JSON rejection.
#[derive(Debug, Deserialize, Validate)]
pub struct StkPushRequest {
    #[serde(default)]
    #[validate(length(max = 100, message = "Name is too long"))]
    pub name: String,

    /// Divalidasi setelah di-trim di `PaymentService::prepare`
    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub phone: String,

    #[serde(default)]
    #[validate(range(max = 250000, message = "Amount exceeds the M-Pesa transaction limit"))]
    pub amount: i64,

    #[serde(default = "default_quantity")]
    #[validate(range(min = 1, max = 10, message = "Quantity must be between 1 and 10"))]
    pub qty: i32,

    #[serde(default, rename = "eventName")]
    #[validate(length(max = 200))]
    pub event_name: Option<String>,

    #[serde(default)]
    pub currency: Option<String>,
}

impl StkPushRequest {
    /// Semua field wajib terisi dan amount positif
    pub fn has_required_fields(&self) -> bool {
        !self.name.trim().is_empty()
            && !self.email.trim().is_empty()
            && !self.phone.trim().is_empty()
            && self.amount > 0
    }
}

/// Query parameters untuk payment status lookup
#[derive(Debug, Default, Deserialize)]
pub struct PaymentQueryParams {
    #[serde(default)]
    pub refresh: bool,
}

/// Request quote harga tiket
#[derive(Debug, Deserialize, Validate)]
pub struct TicketQuoteRequest {
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: f64,
    #[serde(default = "default_quantity")]
    pub qty: i32,
}

/// Durasi booking space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpaceDuration {
    Full,
    Half,
}

/// Request quote harga space booking
#[derive(Debug, Deserialize, Validate)]
pub struct SpaceQuoteRequest {
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub full_day_price: f64,
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub half_day_price: f64,
    pub duration: SpaceDuration,
    #[serde(default)]
    pub catering: bool,
    #[serde(default)]
    pub decoration: bool,
    #[serde(default)]
    pub tech_support: bool,
}

// ========================= RESPONSE DTOs =========================

/// Data yang dikembalikan setelah STK push terkirim
#[derive(Debug, Serialize)]
pub struct StkPushData {
    pub payment_id: Uuid,
    pub status: PaymentStatus,
    pub merchant_request_id: String,
    pub checkout_request_id: String,
    pub customer_message: String,
}

/// Response wrapper untuk STK push
#[derive(Debug, Serialize)]
pub struct StkPushResponseBody {
    pub success: bool,
    pub message: String,
    pub data: StkPushData,
}

/// Response wrapper untuk single payment
#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub success: bool,
    pub message: String,
    pub data: Option<Payment>,
}

/// Acknowledgement untuk Daraja callback
#[derive(Debug, Serialize)]
pub struct CallbackAck {
    #[serde(rename = "ResultCode")]
    pub result_code: i32,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
    pub message: String,
}

impl CallbackAck {
    pub fn accepted() -> Self {
        Self {
            result_code: 0,
            result_desc: "Accepted".to_string(),
            message: "Callback processed".to_string(),
        }
    }
}

/// Quote tiket
#[derive(Debug, Serialize, PartialEq)]
pub struct TicketQuote {
    pub unit_price: f64,
    pub qty: i32,
    pub total: i64,
}

/// Quote space booking
#[derive(Debug, Serialize, PartialEq)]
pub struct SpaceQuote {
    pub duration: SpaceDuration,
    pub base_price: i64,
    pub additional_services: i64,
    pub total: i64,
}

/// Standard error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub error_code: Option<String>,
    pub details: Option<serde_json::Value>,
}

// ========================= DARAJA DTOs =========================

/// OAuth token response. Daraja mengirim `expires_in` sebagai string.
#[derive(Debug, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub expires_in: NumberOrString,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NumberOrString {
    Number(u64),
    String(String),
}

impl NumberOrString {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            NumberOrString::Number(n) => Some(*n),
            NumberOrString::String(s) => s.trim().parse().ok(),
        }
    }
}

/// STK push request body (Lipa na M-Pesa Online)
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StkPushPayload {
    pub business_short_code: String,
    pub password: String,
    pub timestamp: String,
    pub transaction_type: String,
    pub amount: i64,
    pub party_a: String,
    pub party_b: String,
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub call_back_url: String,
    pub account_reference: String,
    pub transaction_desc: String,
}

/// STK push response. ResponseCode "0" berarti request diterima.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResponseCode")]
    pub response_code: String,
    #[serde(rename = "ResponseDescription")]
    pub response_description: String,
    #[serde(rename = "CustomerMessage", default)]
    pub customer_message: String,
}

impl StkPushResponse {
    pub fn is_accepted(&self) -> bool {
        self.response_code.trim() == "0"
    }
}

/// STK push query request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StkQueryPayload {
    pub business_short_code: String,
    pub password: String,
    pub timestamp: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
}

/// STK push query response
#[derive(Debug, Clone, Deserialize)]
pub struct StkQueryResponse {
    #[serde(rename = "ResponseCode")]
    pub response_code: String,
    #[serde(rename = "ResponseDescription", default)]
    pub response_description: String,
    #[serde(rename = "CheckoutRequestID", default)]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    pub result_code: Option<NumberOrString>,
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: Option<String>,
}

/// Error body dari Daraja untuk non-2xx response
#[derive(Debug, Deserialize)]
pub struct DarajaErrorBody {
    #[serde(rename = "requestId", default)]
    pub request_id: Option<String>,
    #[serde(rename = "errorCode", default)]
    pub error_code: Option<String>,
    #[serde(rename = "errorMessage", default)]
    pub error_message: Option<String>,
}

// ========================= CALLBACK PAYLOAD =========================

/// Result code Daraja ketika user membatalkan prompt
pub const RESULT_CODE_CANCELLED_BY_USER: i32 = 1032;

/// Envelope callback dari Daraja: `{"Body": {"stkCallback": {...}}}`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StkCallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: StkCallbackBody,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StkCallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    pub result_code: i32,
    #[serde(rename = "ResultDesc", default)]
    pub result_desc: String,
    #[serde(rename = "CallbackMetadata", default)]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub items: Vec<CallbackItem>,
}

/// Item metadata, `Value` bisa tidak ada (misalnya `Balance`)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: Option<serde_json::Value>,
}

/// Hasil akhir dari satu callback
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutcome {
    Paid {
        receipt: Option<String>,
        amount: Option<i64>,
        phone: Option<String>,
        transaction_date: Option<String>,
    },
    Cancelled { result_code: i32, description: String },
    Failed { result_code: i32, description: String },
}

impl CallbackOutcome {
    pub fn status(&self) -> PaymentStatus {
        match self {
            CallbackOutcome::Paid { .. } => PaymentStatus::Paid,
            CallbackOutcome::Cancelled { .. } => PaymentStatus::Cancelled,
            CallbackOutcome::Failed { .. } => PaymentStatus::Failed,
        }
    }

    /// Outcome dari result code + description (callback maupun STK query)
    pub fn from_result(result_code: i32, description: &str) -> Self {
        match result_code {
            0 => CallbackOutcome::Paid {
                receipt: None,
                amount: None,
                phone: None,
                transaction_date: None,
            },
            RESULT_CODE_CANCELLED_BY_USER => CallbackOutcome::Cancelled {
                result_code,
                description: description.to_string(),
            },
            _ => CallbackOutcome::Failed {
                result_code,
                description: description.to_string(),
            },
        }
    }
}

impl StkCallback {
    /// Lookup satu item metadata berdasarkan nama
    pub fn item(&self, name: &str) -> Option<&serde_json::Value> {
        self.callback_metadata
            .as_ref()?
            .items
            .iter()
            .find(|item| item.name == name)?
            .value
            .as_ref()
    }

    /// Item sebagai string; angka di-render tanpa desimal kalau bulat
    pub fn item_string(&self, name: &str) -> Option<String> {
        match self.item(name)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(
                n.as_i64()
                    .map(|v| v.to_string())
                    .or_else(|| n.as_u64().map(|v| v.to_string()))
                    .unwrap_or_else(|| n.to_string()),
            ),
            _ => None,
        }
    }

    /// Item sebagai whole KSh amount
    pub fn item_amount(&self, name: &str) -> Option<i64> {
        match self.item(name)? {
            serde_json::Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.round() as i64)),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.round() as i64),
            _ => None,
        }
    }

    pub fn outcome(&self) -> CallbackOutcome {
        match CallbackOutcome::from_result(self.result_code, &self.result_desc) {
            CallbackOutcome::Paid { .. } => CallbackOutcome::Paid {
                receipt: self.item_string("MpesaReceiptNumber"),
                amount: self.item_amount("Amount"),
                phone: self.item_string("PhoneNumber"),
                transaction_date: self.item_string("TransactionDate"),
            },
            other => other,
        }
    }
}

// ========================= ENUMS =========================

/// Payment status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Cancelled,
    Expired,
}

impl PaymentStatus {
    /// Convert dari string database
    pub fn from_db(status: &str) -> Self {
        match status.to_lowercase().as_str() {
            "pending" => PaymentStatus::Pending,
            "paid" => PaymentStatus::Paid,
            "cancelled" => PaymentStatus::Cancelled,
            "expired" => PaymentStatus::Expired,
            _ => PaymentStatus::Failed,
        }
    }

    /// Convert ke string untuk database
    pub fn to_db_string(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Expired => "expired",
        }
    }

    pub fn is_final(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}
