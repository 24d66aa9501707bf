//! Boundary operations the surrounding HTTP layer calls into. Every
//! precondition is checked synchronously before any state is touched or any
//! job is queued; the heavy lifting happens in the pipeline tasks.

use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;
use log::info;
use snafu::prelude::*;

use crate::errors::{
    AlreadyExistsSnafu, BikeRetiredSnafu, CustomResult, DuplicateSubmissionSnafu,
    InvalidPlaceSetSnafu, InvalidRaceStatusSnafu, MalformedInputSnafu, NotApprovedSnafu,
    PlaceAlreadyAssignedSnafu, PlacementsAlreadyAssignedSnafu,
};
use crate::modules::models::bike::Bike;
use crate::modules::models::classification::ClassificationPlacement;
use crate::modules::models::general::Store;
use crate::modules::models::participation::{RaceParticipation, RaceParticipationStatus};
use crate::modules::models::race::{Race, RaceStatus};
use crate::modules::models::rider::Rider;
use crate::modules::pipeline::{AppContext, Job};
use crate::modules::tasks::assign_classification_places::assign_places_in_classifications;
use crate::modules::tasks::close_race::end_race_and_generate_places;

/// # join a race
/// creates a pending participation of the rider on the given bike; a repeat
/// join with the same bike returns the existing participation
pub fn join_race(
    conn: &mut Store,
    race_id: i32,
    rider_id: i32,
    bike_id: i32,
) -> CustomResult<RaceParticipation> {
    let race = Race::get_by_id(conn, race_id)?;
    Rider::get_by_id(conn, rider_id)?;
    let bike = Bike::get_by_id(conn, bike_id)?;

    ensure!(!bike.is_retired, BikeRetiredSnafu { id: bike_id });
    ensure!(
        bike.rider_id == rider_id,
        MalformedInputSnafu {
            details: format!("bike {bike_id} does not belong to rider {rider_id}"),
        }
    );
    ensure!(
        race.status == RaceStatus::Pending,
        InvalidRaceStatusSnafu {
            details: format!("race {} is already {:?}", race_id, race.status),
        }
    );

    if let Ok(existing) = RaceParticipation::get_by_rider_and_race(conn, race_id, rider_id) {
        ensure!(
            existing.bike_id == bike_id,
            AlreadyExistsSnafu {
                details: format!(
                    "rider {rider_id} already joined race {race_id} on another bike"
                ),
            }
        );
        return Ok(existing);
    }

    RaceParticipation::new(conn, race_id, rider_id, bike_id)
}

/// # withdraw from a race
/// deletes the rider's participation; rejected once the race has ended or
/// was cancelled. Withdrawing without having joined is a no-op.
pub fn withdraw_race(conn: &mut Store, race_id: i32, rider_id: i32) -> CustomResult<()> {
    let race = Race::get_by_id(conn, race_id)?;
    Rider::get_by_id(conn, rider_id)?;

    ensure!(
        !race.status.is_terminal(),
        InvalidRaceStatusSnafu {
            details: format!("race {} is already {:?}", race_id, race.status),
        }
    );

    if let Ok(participation) = RaceParticipation::get_by_rider_and_race(conn, race_id, rider_id) {
        RaceParticipation::delete(conn, participation.id);
    }

    Ok(())
}

/// # approve or reject a participation
/// a coordinator decision; frozen once the race reaches a terminal state
pub fn set_participation_status(
    conn: &mut Store,
    participation_id: i32,
    status: RaceParticipationStatus,
) -> CustomResult<RaceParticipation> {
    let participation = RaceParticipation::get_by_id(conn, participation_id)?;
    let race = Race::get_by_id(conn, participation.race_id)?;

    ensure!(
        !race.status.is_terminal(),
        InvalidRaceStatusSnafu {
            details: format!("race {} is already {:?}", race.id, race.status),
        }
    );

    RaceParticipation::set_status(conn, participation_id, status)
}

/// # cancel a race
/// allowed while the race is pending or in progress; an ended race stays
/// ended
pub fn cancel_race(conn: &mut Store, race_id: i32) -> CustomResult<Race> {
    Race::set_status(conn, race_id, RaceStatus::Cancelled)
}

/// # submit a ride result
/// checks the boundary preconditions and queues the recording for
/// processing; the queued job interpolates the finish and, once the last
/// approved rider is in, closes the race
pub fn submit_result(
    ctx: &AppContext,
    race_id: i32,
    rider_id: i32,
    recording_path: &Path,
) -> CustomResult<()> {
    {
        let conn = &ctx.lock_store();

        let race = Race::get_by_id(conn, race_id)?;
        ensure!(
            race.status == RaceStatus::InProgress,
            InvalidRaceStatusSnafu {
                details: format!(
                    "race {} must be in progress to accept results, is {:?}",
                    race_id, race.status
                ),
            }
        );

        let participation = RaceParticipation::get_by_rider_and_race(conn, race_id, rider_id)?;
        ensure!(
            participation.status == RaceParticipationStatus::Approved,
            NotApprovedSnafu {
                id: participation.id,
            }
        );
        ensure!(
            participation.ride_gpx_file.is_none(),
            DuplicateSubmissionSnafu {
                id: participation.id,
            }
        );
    }

    info!(
        target: "race_api",
        "queueing result submission for race {} by rider {}", race_id, rider_id
    );
    ctx.jobs.dispatch(Job::ProcessSubmission {
        race_id,
        rider_id,
        recording_path: recording_path.to_path_buf(),
    });

    Ok(())
}

/// # force-close a race
/// a coordinator override that ends the race immediately and generates
/// places for whatever results are in
pub fn force_close_race(ctx: &AppContext, race_id: i32) -> CustomResult<Vec<RaceParticipation>> {
    let now = Utc::now().naive_utc();
    let conn = &mut ctx.lock_store();

    end_race_and_generate_places(conn, race_id, now)
}

/// # confirm the final places of a race
/// validates that the confirmed places cover exactly the approved
/// participations, each exactly once with a positive place, stores them,
/// fans them out into the classifications and queues the season's score
/// recalculation. Rejected atomically on any violation.
pub fn confirm_places(
    ctx: &AppContext,
    race_id: i32,
    place_by_participation: &HashMap<i32, i32>,
) -> CustomResult<Vec<ClassificationPlacement>> {
    let season_id;
    let placements;
    {
        let conn = &mut ctx.lock_store();

        let race = Race::get_by_id(conn, race_id)?;
        ensure!(
            race.status == RaceStatus::Ended,
            InvalidRaceStatusSnafu {
                details: format!(
                    "race {} must have ended to confirm places, is {:?}",
                    race_id, race.status
                ),
            }
        );
        ensure!(
            !ClassificationPlacement::exist_for_race(conn, race_id),
            PlacementsAlreadyAssignedSnafu { race_id }
        );

        let approved = RaceParticipation::approved_from_race(conn, race_id);
        ensure!(
            place_by_participation.len() == approved.len(),
            InvalidPlaceSetSnafu {
                details: format!(
                    "expected places for {} approved participations, got {}",
                    approved.len(),
                    place_by_participation.len()
                ),
            }
        );
        let mut seen_places = std::collections::HashSet::new();
        for participation in &approved {
            let place =
                place_by_participation
                    .get(&participation.id)
                    .context(InvalidPlaceSetSnafu {
                        details: format!("missing place for participation {}", participation.id),
                    })?;
            ensure!(
                *place >= 1,
                InvalidPlaceSetSnafu {
                    details: format!(
                        "place of participation {} must be positive, got {place}",
                        participation.id
                    ),
                }
            );
            ensure!(
                seen_places.insert(*place),
                InvalidPlaceSetSnafu {
                    details: format!("place {place} is assigned more than once"),
                }
            );
            ensure!(
                participation.place_assigned_overall.is_none(),
                PlaceAlreadyAssignedSnafu {
                    id: participation.id,
                }
            );
        }

        for participation in &approved {
            RaceParticipation::assign_place(
                conn,
                participation.id,
                place_by_participation[&participation.id],
            )?;
        }

        placements = assign_places_in_classifications(conn, race_id)?;
        season_id = race.season_id;
    }

    info!(
        target: "race_api",
        "places of race {} confirmed, queueing score recalculation", race_id
    );
    ctx.jobs.dispatch(Job::RecalculateScores {
        season_id: Some(season_id),
    });

    Ok(placements)
}
