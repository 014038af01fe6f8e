// /party-tickets/services/ticket-service/src/repository/payment.rs

use sqlx::{PgPool, Transaction, Postgres, Row};
use uuid::Uuid;
use chrono::Utc;
use crate::{
    models::{CallbackOutcome, NewPayment, Payment, PaymentStats, PaymentStatus},
    utils::error::AppResult,
};

/// Repository untuk payment operations
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    /// Create new payment repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert payment baru dengan status pending
    pub async fn insert_pending(&self, new: &NewPayment) -> AppResult<Payment> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (id, name, email, phone, amount, quantity, event_name, currency, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending')
            RETURNING *
            "#
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.phone)
        .bind(new.amount)
        .bind(new.quantity)
        .bind(&new.event_name)
        .bind(&new.currency)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!("Pending payment {} inserted for {}", payment.id, payment.phone);
        Ok(payment)
    }

    /// Simpan ID dari Daraja setelah STK push diterima
    pub async fn attach_checkout(
        &self,
        payment_id: Uuid,
        merchant_request_id: &str,
        checkout_request_id: &str,
    ) -> AppResult<Payment> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET merchant_request_id = $2, checkout_request_id = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#
        )
        .bind(payment_id)
        .bind(merchant_request_id)
        .bind(checkout_request_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(payment)
    }

    /// Tandai payment gagal karena STK push ditolak
    pub async fn mark_push_failed(&self, payment_id: Uuid, reason: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE payments
            SET status = 'failed', result_desc = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#
        )
        .bind(payment_id)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_checkout_request_id(&self, checkout_request_id: &str) -> AppResult<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE checkout_request_id = $1"
        )
        .bind(checkout_request_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(payment)
    }

    /// Apply hasil callback ke payment yang masih pending.
    ///
    /// Return `None` kalau tidak ada payment pending dengan checkout id tersebut
    /// (tidak dikenal atau sudah final).
    pub async fn apply_outcome(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        checkout_request_id: &str,
        result_code: i32,
        result_desc: &str,
        outcome: &CallbackOutcome,
    ) -> AppResult<Option<Payment>> {
        let (receipt, paid_at) = match outcome {
            CallbackOutcome::Paid { receipt, .. } => (receipt.clone(), Some(Utc::now())),
            _ => (None, None),
        };

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET status = $2,
                result_code = $3,
                result_desc = $4,
                mpesa_receipt_number = COALESCE($5, mpesa_receipt_number),
                paid_at = COALESCE($6, paid_at),
                updated_at = NOW()
            WHERE checkout_request_id = $1 AND status = 'pending'
            RETURNING *
            "#
        )
        .bind(checkout_request_id)
        .bind(outcome.status().to_db_string())
        .bind(result_code)
        .bind(result_desc)
        .bind(receipt)
        .bind(paid_at)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(payment)
    }

    /// Expire payment pending yang lebih tua dari window
    pub async fn expire_stale(&self, older_than_minutes: i64) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = 'expired',
                result_desc = COALESCE(result_desc, 'No callback received before expiry'),
                updated_at = NOW()
            WHERE status = 'pending'
              AND created_at < NOW() - make_interval(mins => $1::int)
            "#
        )
        .bind(older_than_minutes as i32)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Counter per status
    pub async fn stats(&self) -> AppResult<PaymentStats> {
        let rows = sqlx::query(
            r#"
            SELECT status, COUNT(*) AS count, COALESCE(SUM(amount), 0)::BIGINT AS total_amount
            FROM payments
            GROUP BY status
            "#
        )
        .fetch_all(&self.pool)
        .await?;

        let mut stats = PaymentStats::default();
        for row in rows {
            let status: String = row.try_get("status")?;
            let count: i64 = row.try_get("count")?;
            let total_amount: i64 = row.try_get("total_amount")?;

            stats.total += count;
            match PaymentStatus::from_db(&status) {
                PaymentStatus::Pending => stats.pending += count,
                PaymentStatus::Paid => {
                    stats.paid += count;
                    stats.paid_amount += total_amount;
                }
                PaymentStatus::Failed => stats.failed += count,
                PaymentStatus::Cancelled => stats.cancelled += count,
                PaymentStatus::Expired => stats.expired += count,
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_payment(phone: &str) -> NewPayment {
        NewPayment {
            name: "Wanjiru Kamau".to_string(),
            email: "wanjiru@example.com".to_string(),
            phone: phone.to_string(),
            amount: 1500,
            quantity: 1,
            event_name: None,
            currency: "KES".to_string(),
        }
    }

    async fn backdate(pool: &PgPool, id: Uuid, minutes: i32) {
        sqlx::query("UPDATE payments SET created_at = NOW() - make_interval(mins => $2) WHERE id = $1")
            .bind(id)
            .bind(minutes)
            .execute(pool)
            .await
            .unwrap();
    }

    async fn status_of(pool: &PgPool, id: Uuid) -> String {
        sqlx::query_scalar("SELECT status FROM payments WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_expire_stale_only_touches_old_pending(pool: PgPool) {
        let repo = PaymentRepository::new(pool.clone());

        let stale = repo.insert_pending(&new_payment("254712345678")).await.unwrap();
        let fresh = repo.insert_pending(&new_payment("254712345679")).await.unwrap();
        let old_paid = repo.insert_pending(&new_payment("254712345670")).await.unwrap();

        backdate(&pool, stale.id, 30).await;
        backdate(&pool, old_paid.id, 30).await;
        sqlx::query("UPDATE payments SET status = 'paid' WHERE id = $1")
            .bind(old_paid.id)
            .execute(&pool)
            .await
            .unwrap();

        assert_eq!(repo.expire_stale(15).await.unwrap(), 1);
        assert_eq!(status_of(&pool, stale.id).await, "expired");
        assert_eq!(status_of(&pool, fresh.id).await, "pending");
        assert_eq!(status_of(&pool, old_paid.id).await, "paid");

        // Run kedua tidak menemukan apa-apa lagi
        assert_eq!(repo.expire_stale(15).await.unwrap(), 0);

        let stats = repo.stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.paid_amount, 1500);
    }
}
