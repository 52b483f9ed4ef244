//! Cron-driven fan-out of scans: three recurring jobs (daily, weekly,
//! monthly) that list projects matching a frequency and queue a scan for
//! each. Per-project queuing errors are logged and isolated — one project's
//! failure never stops the rest of the tick from running.

use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::config::Config;
use crate::domain::ScanFrequency;
use crate::lifecycle::LifecycleController;
use crate::repository::Repository;

pub async fn start<R>(
    config: Arc<Config>,
    lifecycle: Arc<LifecycleController<R>>,
) -> Result<JobScheduler, JobSchedulerError>
where
    R: Repository + Send + Sync + 'static,
{
    let scheduler = JobScheduler::new().await?;

    scheduler
        .add(build_job(
            &config.scan_frequency_daily_cron,
            ScanFrequency::Daily,
            lifecycle.clone(),
        )?)
        .await?;
    scheduler
        .add(build_job(
            &config.scan_frequency_weekly_cron,
            ScanFrequency::Weekly,
            lifecycle.clone(),
        )?)
        .await?;
    scheduler
        .add(build_job(
            &config.scan_frequency_monthly_cron,
            ScanFrequency::Monthly,
            lifecycle,
        )?)
        .await?;

    scheduler.start().await?;
    Ok(scheduler)
}

fn build_job<R>(
    cron_expr: &str,
    frequency: ScanFrequency,
    lifecycle: Arc<LifecycleController<R>>,
) -> Result<Job, JobSchedulerError>
where
    R: Repository + Send + Sync + 'static,
{
    Job::new_async(cron_expr, move |_uuid, _l| {
        let lifecycle = lifecycle.clone();
        Box::pin(async move {
            fan_out(lifecycle, frequency).await;
        })
    })
}

async fn fan_out<R>(lifecycle: Arc<LifecycleController<R>>, frequency: ScanFrequency)
where
    R: Repository + Send + Sync + 'static,
{
    let projects = match lifecycle.list_projects_by_frequency(frequency).await {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(?frequency, error = %e, "failed to list projects for scheduled scan");
            return;
        }
    };

    tracing::info!(?frequency, count = projects.len(), "fanning out scheduled scans");

    for project in projects {
        if let Err(e) = lifecycle.queue_scan(project.id).await {
            tracing::error!(project_id = %project.id, error = %e, "failed to queue scheduled scan");
        }
    }
}
