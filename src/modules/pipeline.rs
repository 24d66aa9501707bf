use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use log::{error, info, warn};
use tokio::sync::mpsc;

use crate::modules::models::general::Store;
use crate::modules::tasks::close_race::{all_approved_finished, end_race_and_generate_places};
use crate::modules::tasks::process_submission::process_result_submission;
use crate::modules::tasks::recalculate_scores::recalculate_classification_scores;
use crate::modules::tasks::set_race_in_progress::set_race_in_progress;

/// The pipeline's typed background jobs, chained by race and season ids.
/// Classification fan-out is not queued: the coordinator's confirmation runs
/// it synchronously because it has to hand the placements back.
#[derive(Clone, PartialEq, Debug)]
pub enum Job {
    SetRaceInProgress {
        race_id: i32,
    },
    ProcessSubmission {
        race_id: i32,
        rider_id: i32,
        recording_path: PathBuf,
    },
    CloseRace {
        race_id: i32,
    },
    RecalculateScores {
        season_id: Option<i32>,
    },
}

/// Fire-and-forget handle onto the job channel.
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::UnboundedSender<Job>,
}

impl JobQueue {
    pub fn dispatch(&self, job: Job) {
        if self.sender.send(job).is_err() {
            error!(target: "pipeline", "job queue is closed, dropping job");
        }
    }
}

/// Explicitly constructed process context: the store and the job queue,
/// created once at startup and cloned into every holder.
#[derive(Clone)]
pub struct AppContext {
    store: Arc<Mutex<Store>>,
    pub jobs: JobQueue,
}

impl AppContext {
    pub fn new() -> (AppContext, mpsc::UnboundedReceiver<Job>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let ctx = AppContext {
            store: Arc::new(Mutex::new(Store::new())),
            jobs: JobQueue { sender },
        };

        (ctx, receiver)
    }

    pub fn lock_store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// # run the pipeline worker
/// consumes jobs one at a time, so jobs touching the same race or season
/// never interleave; place assignment and score recalculation rely on that
/// serialization.
pub async fn run_worker(ctx: AppContext, mut jobs: mpsc::UnboundedReceiver<Job>) {
    info!(target: "pipeline", "pipeline worker started");
    while let Some(job) = jobs.recv().await {
        handle_job(&ctx, job);
    }
    info!(target: "pipeline", "job queue closed, pipeline worker stopping");
}

fn handle_job(ctx: &AppContext, job: Job) {
    let now = Utc::now().naive_utc();

    match job {
        Job::SetRaceInProgress { race_id } => {
            let conn = &mut ctx.lock_store();
            if let Err(error) = set_race_in_progress(conn, race_id) {
                warn!(target: "pipeline", "could not start race {}: {}", race_id, error);
            }
        }
        Job::ProcessSubmission {
            race_id,
            rider_id,
            recording_path,
        } => {
            let conn = &mut ctx.lock_store();
            match process_result_submission(conn, race_id, rider_id, &recording_path, now) {
                Ok(_) => {
                    // every approved rider finished, the race can close
                    if all_approved_finished(conn, race_id) {
                        ctx.jobs.dispatch(Job::CloseRace { race_id });
                    }
                }
                Err(error) => {
                    warn!(
                        target: "pipeline",
                        "submission of rider {} in race {} failed: {}", rider_id, race_id, error
                    );
                }
            }
        }
        Job::CloseRace { race_id } => {
            let conn = &mut ctx.lock_store();
            if let Err(error) = end_race_and_generate_places(conn, race_id, now) {
                warn!(target: "pipeline", "could not close race {}: {}", race_id, error);
            }
        }
        Job::RecalculateScores { season_id } => {
            let conn = &mut ctx.lock_store();
            if let Err(error) = recalculate_classification_scores(conn, season_id, now) {
                warn!(
                    target: "pipeline",
                    "could not recalculate scores of season {:?}: {}", season_id, error
                );
            }
        }
    }
}
