use log::{error, info};

use velo_league::config::Config;
use velo_league::cron_jobs::register_cron_jobs;
use velo_league::modules::helpers::logging::setup_logging;
use velo_league::modules::pipeline::{run_worker, AppContext};

#[tokio::main]
async fn main() {
    if let Err(error) = setup_logging() {
        eprintln!("failed to initialise logging: {error}");
    }

    let config = Config::from_env();
    let (ctx, jobs) = AppContext::new();

    let worker = tokio::spawn(run_worker(ctx.clone(), jobs));

    let scheduler = match register_cron_jobs(ctx, config.race_start_poll_interval).await {
        Ok(scheduler) => {
            info!(target: "main", "race start scheduler running");
            Some(scheduler)
        }
        Err(error) => {
            error!(target: "main", "could not start the race scheduler: {error}");
            None
        }
    };

    tokio::signal::ctrl_c().await.ok();
    info!(target: "main", "shutting down");

    drop(scheduler);
    worker.abort();
}
