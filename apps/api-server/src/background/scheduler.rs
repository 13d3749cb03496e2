//! Cron-style job scheduler using tokio-cron-scheduler.

use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use nichofy_infra::QueryCache;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Enable scheduler.
    pub enabled: bool,
    /// Six-field cron expression for the cache sweep.
    pub cache_sweep_cron: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_sweep_cron: "0 * * * * *".to_string(),
        }
    }
}

impl SchedulerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: std::env::var("SCHEDULER_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(defaults.enabled),
            cache_sweep_cron: std::env::var("POST_CACHE_SWEEP_CRON")
                .unwrap_or(defaults.cache_sweep_cron),
        }
    }
}

/// Cron job scheduler wrapper.
pub struct Scheduler {
    inner: JobScheduler,
    config: SchedulerConfig,
}

impl Scheduler {
    pub async fn new(config: SchedulerConfig) -> Result<Self, JobSchedulerError> {
        let inner = JobScheduler::new().await?;
        Ok(Self { inner, config })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Add a cron job.
    pub async fn add_cron<F, Fut>(&self, schedule: &str, task: F) -> Result<(), JobSchedulerError>
    where
        F: Fn() -> Fut + Send + Sync + Clone + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let job = Job::new_async(schedule, move |_uuid, _lock| {
            let task = task.clone();
            Box::pin(async move {
                task().await;
            })
        })?;

        let id = self.inner.add(job).await?;
        tracing::info!(schedule = %schedule, job_id = %id, "Cron job registered");
        Ok(())
    }

    pub async fn start(&self) -> Result<(), JobSchedulerError> {
        if !self.config.enabled {
            tracing::info!("Scheduler disabled");
            return Ok(());
        }

        self.inner.start().await?;
        tracing::info!("Scheduler started");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), JobSchedulerError> {
        if !self.config.enabled {
            return Ok(());
        }

        self.inner.shutdown().await?;
        tracing::info!("Scheduler stopped");
        Ok(())
    }
}

/// Periodically drop expired query-cache pages. Reads already skip expired
/// entries; the sweep only reclaims memory.
pub async fn register_cache_sweep(
    scheduler: &Scheduler,
    cache: Arc<QueryCache>,
) -> Result<(), JobSchedulerError> {
    let schedule = scheduler.config().cache_sweep_cron.clone();
    scheduler
        .add_cron(&schedule, move || {
            let cache = cache.clone();
            async move {
                let evicted = cache.sweep_expired();
                if evicted > 0 {
                    tracing::debug!(evicted, remaining = cache.len(), "Query cache swept");
                }
            }
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sweep_runs_every_minute() {
        let config = SchedulerConfig::default();
        assert!(config.enabled);
        assert_eq!(config.cache_sweep_cron, "0 * * * * *");
    }
}
