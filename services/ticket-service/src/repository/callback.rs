// /party-tickets/services/ticket-service/src/repository/callback.rs

use sqlx::{Transaction, Postgres};
use crate::utils::error::AppResult;

/// Repository untuk raw callback log (audit trail)
#[derive(Default)]
pub struct CallbackRepository;

impl CallbackRepository {
    pub fn new() -> Self {
        Self
    }

    /// Simpan raw callback body
    pub async fn log_callback(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        checkout_request_id: Option<&str>,
        result_code: Option<i32>,
        payload: &serde_json::Value,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payment_callbacks (checkout_request_id, result_code, payload)
            VALUES ($1, $2, $3)
            "#
        )
        .bind(checkout_request_id)
        .bind(result_code)
        .bind(payload)
        .execute(&mut **tx)
        .await?;

        tracing::debug!("Callback logged for checkout {:?}", checkout_request_id);
        Ok(())
    }
}
