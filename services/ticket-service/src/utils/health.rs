// /party-tickets/services/ticket-service/src/utils/health.rs

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::collections::HashMap;
use crate::{
    core::services::DarajaClient,
    repository::Repository,
    utils::scheduler::SchedulerMetrics,
};

#[derive(Debug, serde::Serialize)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    pub checks: HashMap<String, ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, serde::Serialize, Clone, Copy, PartialEq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, serde::Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
    pub response_time_ms: Option<u64>,
}

/// Health check untuk database, scheduler dan konfigurasi Daraja
pub async fn comprehensive_health_check(
    repository: &Arc<Repository>,
    metrics: &Arc<SchedulerMetrics>,
    daraja: &DarajaClient,
) -> HealthCheckResult {
    let mut checks = HashMap::new();

    checks.insert("database".to_string(), check_database_health(repository).await);
    checks.insert("scheduler".to_string(), check_scheduler_health(metrics));
    checks.insert("daraja".to_string(), check_daraja_config(daraja));

    HealthCheckResult {
        status: determine_overall_status(&checks),
        checks,
        timestamp: chrono::Utc::now(),
    }
}

async fn check_database_health(repository: &Arc<Repository>) -> ComponentHealth {
    let start = std::time::Instant::now();

    match sqlx::query("SELECT 1").fetch_one(repository.get_pool()).await {
        Ok(_) => ComponentHealth {
            name: "PostgreSQL".to_string(),
            status: HealthStatus::Healthy,
            message: None,
            response_time_ms: Some(start.elapsed().as_millis() as u64),
        },
        Err(e) => ComponentHealth {
            name: "PostgreSQL".to_string(),
            status: HealthStatus::Unhealthy,
            message: Some(format!("Database error: {}", e)),
            response_time_ms: None,
        },
    }
}

fn check_scheduler_health(metrics: &SchedulerMetrics) -> ComponentHealth {
    let runs = metrics.expiry_runs.load(Ordering::Relaxed);
    let errors = metrics.expiry_errors.load(Ordering::Relaxed);

    ComponentHealth {
        name: "Background Jobs".to_string(),
        // Semua run gagal berarti expiry tidak jalan
        status: if errors > 0 && runs == 0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        },
        message: Some(format!("{} expiry runs, {} errors", runs, errors)),
        response_time_ms: None,
    }
}

fn check_daraja_config(daraja: &DarajaClient) -> ComponentHealth {
    let config = daraja.config();

    ComponentHealth {
        name: "Daraja".to_string(),
        // Callback tanpa token di production bisa dipalsukan
        status: if config.is_production && config.callback_secret.is_none() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        },
        message: Some(format!(
            "{} ({}), callback token {}",
            if config.is_production { "production" } else { "sandbox" },
            config.base_url,
            if config.callback_secret.is_some() { "enabled" } else { "disabled" }
        )),
        response_time_ms: None,
    }
}

fn determine_overall_status(checks: &HashMap<String, ComponentHealth>) -> HealthStatus {
    if checks.values().any(|h| h.status == HealthStatus::Unhealthy) {
        return HealthStatus::Unhealthy;
    }

    if checks.values().any(|h| h.status == HealthStatus::Degraded) {
        return HealthStatus::Degraded;
    }

    HealthStatus::Healthy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::daraja::test_config;

    fn component(status: HealthStatus) -> ComponentHealth {
        ComponentHealth {
            name: "test".to_string(),
            status,
            message: None,
            response_time_ms: None,
        }
    }

    #[test]
    fn test_overall_status() {
        let mut checks = HashMap::new();
        checks.insert("a".to_string(), component(HealthStatus::Healthy));
        assert_eq!(determine_overall_status(&checks), HealthStatus::Healthy);

        checks.insert("b".to_string(), component(HealthStatus::Degraded));
        assert_eq!(determine_overall_status(&checks), HealthStatus::Degraded);

        checks.insert("c".to_string(), component(HealthStatus::Unhealthy));
        assert_eq!(determine_overall_status(&checks), HealthStatus::Unhealthy);
    }

    #[test]
    fn test_production_without_callback_token_is_degraded() {
        let mut config = test_config("https://api.safaricom.co.ke");
        config.is_production = true;
        let daraja = DarajaClient::new(config).unwrap();
        assert_eq!(check_daraja_config(&daraja).status, HealthStatus::Degraded);
    }

    #[test]
    fn test_scheduler_degraded_when_only_errors() {
        let metrics = SchedulerMetrics::new();
        metrics.expiry_errors.fetch_add(1, Ordering::Relaxed);
        assert_eq!(check_scheduler_health(&metrics).status, HealthStatus::Degraded);
    }
}
