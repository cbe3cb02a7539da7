//! Background job scheduler.
//!
//! Registers the price-log retention job on `PRICEHIST_PURGE_CRON`.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use pricehist_core::AppConfig;
use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive for
/// the lifetime of the process. Dropping it shuts down all scheduled jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised, the
/// cron expression is invalid, or the scheduler fails to start.
pub async fn build_scheduler(
    pool: PgPool,
    config: Arc<AppConfig>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_purge_job(&scheduler, pool, config).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_purge_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    config: Arc<AppConfig>,
) -> Result<(), JobSchedulerError> {
    let cron = config.purge_cron.clone();
    let pool = Arc::new(pool);

    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let config = Arc::clone(&config);

        Box::pin(async move {
            run_purge_job(&pool, &config, Utc::now()).await;
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = %cron, "scheduler: registered price log purge job");
    Ok(())
}

/// Entries logged before this instant are purged.
pub(crate) fn retention_cutoff(now: DateTime<Utc>, retention_days: u32) -> DateTime<Utc> {
    now.checked_sub_signed(Duration::days(i64::from(retention_days)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

async fn run_purge_job(pool: &PgPool, config: &AppConfig, now: DateTime<Utc>) {
    let cutoff = retention_cutoff(now, config.log_retention_days);
    tracing::info!(cutoff = %cutoff, "scheduler: starting price log purge");

    match pricehist_db::delete_older_than(pool, cutoff, config.purge_batch_size).await {
        Ok(deleted) => {
            tracing::info!(deleted, "scheduler: price log purge complete");
        }
        Err(e) => {
            tracing::error!(error = %e, "scheduler: price log purge failed");
        }
    }
}
