// /party-tickets/services/ticket-service/src/core/payment.rs

use std::sync::Arc;
use validator::{Validate, ValidateEmail};
use crate::{
    models::*,
    repository::Repository,
    utils::error::{AppError, AppResult},
    utils::validator::{normalize_currency, normalize_phone, validate_string_length},
};

use super::daraja::DarajaClient;

// Service untuk payment flow: STK push, callback, reconciliation
pub struct PaymentService {
    repository: Arc<Repository>,
    daraja: Arc<DarajaClient>,
}

impl PaymentService {
    pub fn new(repository: Arc<Repository>, daraja: Arc<DarajaClient>) -> Self {
        Self { repository, daraja }
    }

    pub fn daraja(&self) -> &DarajaClient {
        &self.daraja
    }

    /// Validasi request form dan bentuk record pending
    pub fn prepare(request: &StkPushRequest) -> AppResult<NewPayment> {
        if !request.has_required_fields() {
            return Err(AppError::BadRequest("Missing fields".to_string()));
        }

        request.validate()?;
        validate_string_length(&request.name, "Name", 1, 100)?;

        let email = request.email.trim().to_lowercase();
        if !email.validate_email() {
            return Err(AppError::ValidationError("Invalid email address".to_string()));
        }

        let phone = normalize_phone(&request.phone)?;
        let currency = normalize_currency(request.currency.as_deref())?;

        let event_name = request.event_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        Ok(NewPayment {
            name: request.name.trim().to_string(),
            email,
            phone,
            amount: request.amount,
            quantity: request.qty,
            event_name,
            currency,
        })
    }

    /// Initiate STK push: insert pending, kirim push, simpan checkout id
    pub async fn initiate(&self, request: &StkPushRequest) -> AppResult<StkPushData> {
        let new_payment = Self::prepare(request)?;

        let payment = self.repository.payment()
            .insert_pending(&new_payment)
            .await?;

        let response = match self.daraja.stk_push(&payment.phone, payment.amount).await {
            Ok(response) => response,
            Err(e) => {
                self.mark_push_failed(&payment, &e.to_string()).await;
                return Err(e);
            }
        };

        if !response.is_accepted() {
            self.mark_push_failed(&payment, &response.response_description).await;
            return Err(AppError::PaymentRejected(response.response_description));
        }

        let payment = self.repository.payment()
            .attach_checkout(
                payment.id,
                &response.merchant_request_id,
                &response.checkout_request_id,
            )
            .await?;

        tracing::info!(
            "STK push sent: payment={}, checkout={}, amount={}",
            payment.id,
            response.checkout_request_id,
            payment.amount
        );

        Ok(StkPushData {
            payment_id: payment.id,
            status: payment.status(),
            merchant_request_id: response.merchant_request_id,
            checkout_request_id: response.checkout_request_id,
            customer_message: response.customer_message,
        })
    }

    async fn mark_push_failed(&self, payment: &Payment, reason: &str) {
        if let Err(e) = self.repository.payment().mark_push_failed(payment.id, reason).await {
            tracing::warn!("Failed to mark payment {} as failed: {}", payment.id, e);
        }
    }

    /// Process callback dari Daraja.
    ///
    /// Raw body selalu disimpan. Callback yang tidak dikenal atau duplikat
    /// tetap di-acknowledge supaya Daraja tidak mengirim ulang.
    pub async fn process_callback(
        &self,
        raw: serde_json::Value,
        token: Option<&str>,
    ) -> AppResult<Option<Payment>> {
        if !self.daraja.verify_callback_token(token) {
            tracing::warn!("Callback rejected: invalid token");
            return Err(AppError::Unauthorized("Invalid callback token".to_string()));
        }

        let callback = match serde_json::from_value::<StkCallbackEnvelope>(raw.clone()) {
            Ok(envelope) => Some(envelope.body.stk_callback),
            Err(e) => {
                tracing::warn!("Unrecognised callback payload: {}", e);
                None
            }
        };

        let mut tx = self.repository.begin_transaction().await?;

        self.repository.callback()
            .log_callback(
                &mut tx,
                callback.as_ref().map(|c| c.checkout_request_id.as_str()),
                callback.as_ref().map(|c| c.result_code),
                &raw,
            )
            .await?;

        let Some(callback) = callback else {
            tx.commit().await?;
            return Ok(None);
        };

        let outcome = callback.outcome();
        let updated = self.repository.payment()
            .apply_outcome(
                &mut tx,
                &callback.checkout_request_id,
                callback.result_code,
                &callback.result_desc,
                &outcome,
            )
            .await?;

        tx.commit().await?;

        match &updated {
            Some(payment) => {
                if let CallbackOutcome::Paid { amount: Some(amount), .. } = &outcome {
                    if *amount != payment.amount {
                        tracing::warn!(
                            "Amount mismatch for checkout {}: expected {}, received {}",
                            callback.checkout_request_id, payment.amount, amount
                        );
                    }
                }
                tracing::info!(
                    "Payment {} updated to {:?} (result {}: {})",
                    payment.id, outcome.status(), callback.result_code, callback.result_desc
                );
            }
            None => self.log_unmatched(&callback.checkout_request_id).await,
        }

        Ok(updated)
    }

    async fn log_unmatched(&self, checkout_request_id: &str) {
        match self.repository.payment().find_by_checkout_request_id(checkout_request_id).await {
            Ok(Some(payment)) => tracing::info!(
                "Callback for checkout {} already processed (status {})",
                checkout_request_id, payment.status
            ),
            Ok(None) => tracing::warn!("Callback for unknown checkout {}", checkout_request_id),
            Err(e) => tracing::warn!("Lookup for checkout {} failed: {}", checkout_request_id, e),
        }
    }

    /// Status payment berdasarkan CheckoutRequestID
    pub async fn get_payment(&self, checkout_request_id: &str) -> AppResult<Payment> {
        self.repository.payment()
            .find_by_checkout_request_id(checkout_request_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))
    }

    /// Reconcile payment pending lewat STK query ke Daraja
    pub async fn refresh_payment(&self, checkout_request_id: &str) -> AppResult<Payment> {
        let payment = self.get_payment(checkout_request_id).await?;
        if payment.status().is_final() {
            return Ok(payment);
        }

        let query = match self.daraja.stk_query(checkout_request_id).await {
            Ok(query) => query,
            Err(e) => {
                // Daraja menjawab error selama transaksi masih diproses
                tracing::debug!("STK query for {} not final yet: {}", checkout_request_id, e);
                return Ok(payment);
            }
        };

        let Some(result_code) = query.result_code.as_ref().and_then(|c| c.as_u64()) else {
            return Ok(payment);
        };
        let result_code = i32::try_from(result_code)
            .map_err(|_| AppError::ExternalService(format!("Unexpected result code {}", result_code)))?;
        let result_desc = query.result_desc.unwrap_or_default();
        let outcome = CallbackOutcome::from_result(result_code, &result_desc);

        let mut tx = self.repository.begin_transaction().await?;
        let updated = self.repository.payment()
            .apply_outcome(&mut tx, checkout_request_id, result_code, &result_desc, &outcome)
            .await?;
        tx.commit().await?;

        match updated {
            Some(updated) => {
                tracing::info!(
                    "Payment {} reconciled via STK query: {:?}",
                    updated.id, outcome.status()
                );
                Ok(updated)
            }
            None => self.get_payment(checkout_request_id).await,
        }
    }

    /// Expire payment yang tidak pernah menerima callback
    pub async fn expire_stale(&self, older_than_minutes: i64) -> AppResult<u64> {
        let expired = self.repository.payment().expire_stale(older_than_minutes).await?;
        if expired > 0 {
            tracing::info!("Expired {} stale pending payments", expired);
        }
        Ok(expired)
    }
}
