use std::time::Duration;

use chrono::Utc;
use log::info;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler, JobSchedulerError};

use crate::errors::{CustomResult, Error};
use crate::modules::models::race::{Race, RaceStatus};
use crate::modules::pipeline::{AppContext, Job};

/// Queues a start job for every pending race whose scheduled start time has
/// passed.
pub fn promote_due_races(ctx: &AppContext) {
    let now = Utc::now().naive_utc();

    let due: Vec<i32> = {
        let conn = &ctx.lock_store();
        Race::get_all(conn)
            .into_iter()
            .filter(|race| race.status == RaceStatus::Pending && race.start_timestamp <= now)
            .map(|race| race.id)
            .collect()
    };

    for race_id in due {
        info!(target: "cron_jobs", "race {} is due to start", race_id);
        ctx.jobs.dispatch(Job::SetRaceInProgress { race_id });
    }
}

/// # register the scheduled jobs
/// starts the repeated check that flips pending races to in progress around
/// their scheduled start time
pub async fn register_cron_jobs(
    ctx: AppContext,
    poll_interval: Duration,
) -> CustomResult<JobScheduler> {
    let scheduler = JobScheduler::new().await.map_err(scheduler_error)?;

    let job = CronJob::new_repeated_async(poll_interval, move |_uuid, _lock| {
        let ctx = ctx.clone();
        Box::pin(async move {
            promote_due_races(&ctx);
        })
    })
    .map_err(scheduler_error)?;
    scheduler.add(job).await.map_err(scheduler_error)?;
    scheduler.start().await.map_err(scheduler_error)?;

    Ok(scheduler)
}

fn scheduler_error(error: JobSchedulerError) -> Error {
    Error::Scheduler {
        message: error.to_string(),
    }
}
