use log::info;
use snafu::prelude::*;

use crate::errors::{CustomResult, InvalidRaceStatusSnafu};
use crate::modules::models::general::Store;
use crate::modules::models::race::{Race, RaceStatus};

/// Flips a race from pending to in progress once its scheduled start time has
/// arrived.
pub fn set_race_in_progress(conn: &mut Store, race_id: i32) -> CustomResult<Race> {
    let race = Race::get_by_id(conn, race_id)?;
    ensure!(
        race.status == RaceStatus::Pending,
        InvalidRaceStatusSnafu {
            details: format!(
                "race {} must be pending to start, is {:?}",
                race_id, race.status
            ),
        }
    );

    let race = Race::set_status(conn, race_id, RaceStatus::InProgress)?;
    info!(target: "tasks/set_race_in_progress", "race {} is now in progress", race_id);

    Ok(race)
}
