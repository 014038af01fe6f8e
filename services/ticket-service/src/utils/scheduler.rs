// /party-tickets/services/ticket-service/src/utils/scheduler.rs

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio_cron_scheduler::{JobScheduler, Job};
use crate::{
    core::services::PaymentService,
    repository::Repository,
    utils::error::{AppError, AppResult},
};

// Scheduler metrics for monitoring
#[derive(Default)]
pub struct SchedulerMetrics {
    pub expiry_runs: AtomicU64,
    pub expiry_errors: AtomicU64,
    pub expired_payments: AtomicU64,
    pub stats_runs: AtomicU64,
    pub last_expiry: RwLock<Option<DateTime<Utc>>>,
}

impl SchedulerMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn get_status(&self) -> serde_json::Value {
        let last_expiry = self.last_expiry.read().await;
        serde_json::json!({
            "expiry_runs": self.expiry_runs.load(Ordering::Relaxed),
            "expiry_errors": self.expiry_errors.load(Ordering::Relaxed),
            "expired_payments": self.expired_payments.load(Ordering::Relaxed),
            "stats_runs": self.stats_runs.load(Ordering::Relaxed),
            "last_expiry": *last_expiry,
        })
    }
}

fn scheduler_error(context: &str, e: impl std::fmt::Display) -> AppError {
    AppError::Configuration(format!("{}: {}", context, e))
}

/// Start background jobs: expiry pending payments dan daily stats
pub async fn start_background_jobs(
    payment_service: Arc<PaymentService>,
    repository: Arc<Repository>,
    metrics: Arc<SchedulerMetrics>,
    expiry_minutes: i64,
) -> AppResult<JobScheduler> {
    let scheduler = JobScheduler::new().await
        .map_err(|e| scheduler_error("Failed to create scheduler", e))?;

    // Job 1: Expire pending payments setiap 5 menit
    let service_clone = payment_service.clone();
    let metrics_clone = metrics.clone();
    let expiry_job = Job::new_async("0 */5 * * * *", move |_uuid, _l| {
        let service = service_clone.clone();
        let metrics = metrics_clone.clone();
        Box::pin(async move {
            if let Err(e) = expire_stale_payments_job(service, metrics, expiry_minutes).await {
                tracing::error!("Failed to expire stale payments: {}", e);
            }
        })
    })
    .map_err(|e| scheduler_error("Failed to create expiry job", e))?;

    scheduler.add(expiry_job).await
        .map_err(|e| scheduler_error("Failed to add expiry job", e))?;

    // Job 2: Log statistics setiap hari jam 00:00
    let repo_clone = repository.clone();
    let metrics_clone = metrics.clone();
    let stats_job = Job::new_async("0 0 0 * * *", move |_uuid, _l| {
        let repo = repo_clone.clone();
        let metrics = metrics_clone.clone();
        Box::pin(async move {
            if let Err(e) = daily_stats_job(repo, metrics).await {
                tracing::error!("Failed to log daily stats: {}", e);
            }
        })
    })
    .map_err(|e| scheduler_error("Failed to create stats job", e))?;

    scheduler.add(stats_job).await
        .map_err(|e| scheduler_error("Failed to add stats job", e))?;

    scheduler.start().await
        .map_err(|e| scheduler_error("Failed to start scheduler", e))?;

    tracing::info!("✅ Background jobs scheduler started (expiry after {} minutes)", expiry_minutes);

    Ok(scheduler)
}

/// Background job: expire stale pending payments
async fn expire_stale_payments_job(
    payment_service: Arc<PaymentService>,
    metrics: Arc<SchedulerMetrics>,
    expiry_minutes: i64,
) -> AppResult<()> {
    tracing::debug!("Starting expire stale payments job");

    match payment_service.expire_stale(expiry_minutes).await {
        Ok(expired) => {
            metrics.expiry_runs.fetch_add(1, Ordering::Relaxed);
            metrics.expired_payments.fetch_add(expired, Ordering::Relaxed);
            *metrics.last_expiry.write().await = Some(Utc::now());
            Ok(())
        }
        Err(e) => {
            metrics.expiry_errors.fetch_add(1, Ordering::Relaxed);
            Err(e)
        }
    }
}

async fn daily_stats_job(repository: Arc<Repository>, metrics: Arc<SchedulerMetrics>) -> AppResult<()> {
    let stats = repository.payment().stats().await?;
    metrics.stats_runs.fetch_add(1, Ordering::Relaxed);

    tracing::info!(
        "Daily Stats: {} payments ({} paid, {} pending, {} failed, {} cancelled, {} expired), KES {} collected",
        stats.total, stats.paid, stats.pending, stats.failed, stats.cancelled, stats.expired, stats.paid_amount
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_metrics_status() {
        let metrics = SchedulerMetrics::new();
        metrics.expiry_runs.fetch_add(2, Ordering::Relaxed);
        metrics.expired_payments.fetch_add(5, Ordering::Relaxed);

        let status = metrics.get_status().await;
        assert_eq!(status["expiry_runs"], 2);
        assert_eq!(status["expired_payments"], 5);
        assert!(status["last_expiry"].is_null());
    }
}
