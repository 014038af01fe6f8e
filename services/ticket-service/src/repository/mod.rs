// /party-tickets/services/ticket-service/src/repository/mod.rs

pub mod payment;
pub mod callback;

use sqlx::{PgPool, Transaction, Postgres};
use std::sync::Arc;

/// Main repository struct yang menggabungkan semua repositories
pub struct Repository {
    pub pool: PgPool,
    payment_repo: Arc<payment::PaymentRepository>,
    callback_repo: Arc<callback::CallbackRepository>,
}

impl Repository {
    /// Create new repository instance
    pub fn new(pool: PgPool) -> Self {
        let payment_repo = Arc::new(payment::PaymentRepository::new(pool.clone()));
        let callback_repo = Arc::new(callback::CallbackRepository::new());

        Self {
            pool,
            payment_repo,
            callback_repo,
        }
    }

    /// Get payment repository
    pub fn payment(&self) -> &payment::PaymentRepository {
        &self.payment_repo
    }

    /// Get callback log repository
    pub fn callback(&self) -> &callback::CallbackRepository {
        &self.callback_repo
    }

    /// Begin database transaction
    pub async fn begin_transaction(&self) -> Result<Transaction<'_, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }

    /// Expose pool untuk health check
    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }
}
