//! Background job scheduler.
//!
//! Registers the nightly refresh of the configured owner. Refreshes go
//! through the same [`SyncEngine`] as page requests, so a scheduled run that
//! overlaps a request joins its in-flight fetch.

use std::sync::Arc;

use folio_core::sanitize_for_log;
use folio_sync::SyncEngine;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Every day at 03:00 UTC.
const NIGHTLY_REFRESH: &str = "0 0 3 * * *";

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive for
/// the lifetime of the process. Dropping it shuts down all scheduled jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised, the
/// job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(
    engine: Arc<SyncEngine>,
    owner: Option<String>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    match owner {
        Some(owner) => register_refresh_job(&scheduler, engine, owner).await?,
        None => tracing::info!("scheduler: FOLIO_OWNER not set; nightly refresh disabled"),
    }

    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_refresh_job(
    scheduler: &JobScheduler,
    engine: Arc<SyncEngine>,
    owner: String,
) -> Result<(), JobSchedulerError> {
    let owner = Arc::new(owner);

    let job = Job::new_async(NIGHTLY_REFRESH, move |_uuid, _lock| {
        let engine = Arc::clone(&engine);
        let owner = Arc::clone(&owner);

        Box::pin(async move {
            tracing::info!(owner = %sanitize_for_log(&owner), "scheduler: starting nightly refresh");
            refresh_owner(&engine, &owner).await;
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Force-refreshes the profile and repositories of `owner`.
///
/// Failures are logged; stale data stays in place until the next run.
pub async fn refresh_owner(engine: &SyncEngine, owner: &str) {
    let owner_field = sanitize_for_log(owner);

    match engine.sync_profile(owner, true).await {
        Ok(synced) if synced.is_stale() => {
            tracing::warn!(owner = %owner_field, "scheduler: profile refresh failed; cached copy kept");
        }
        Ok(_) => tracing::info!(owner = %owner_field, "scheduler: profile refreshed"),
        Err(e) => tracing::error!(owner = %owner_field, error = %e, "scheduler: profile refresh failed"),
    }

    match engine.sync_repositories(owner, true).await {
        Ok(synced) if synced.is_stale() => {
            tracing::warn!(owner = %owner_field, "scheduler: repository refresh failed; cached copy kept");
        }
        Ok(synced) => tracing::info!(
            owner = %owner_field,
            count = synced.value.len(),
            "scheduler: repositories refreshed"
        ),
        Err(e) => tracing::error!(
            owner = %owner_field,
            error = %e,
            "scheduler: repository refresh failed"
        ),
    }
}
