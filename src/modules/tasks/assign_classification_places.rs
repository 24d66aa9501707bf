use log::info;
use snafu::prelude::*;

use crate::errors::{
    CustomResult, InvalidPlaceSetSnafu, InvalidRaceStatusSnafu, PlacementsAlreadyAssignedSnafu,
};
use crate::modules::models::bike::{Bike, BikeType};
use crate::modules::models::classification::{Classification, ClassificationPlacement};
use crate::modules::models::general::Store;
use crate::modules::models::participation::RaceParticipation;
use crate::modules::models::race::{Race, RaceStatus};
use crate::modules::models::rider::{Gender, Rider};

/// One approved participation with the attributes the membership predicates
/// look at, in confirmed-place order.
struct RankedEntry {
    participation_id: i32,
    place: i32,
    bike_type: BikeType,
    gender: Option<Gender>,
}

/// # fan a race's confirmed places out into the classifications
/// emits one placement row per classification a participation qualifies for:
/// general, one of the bike-type classifications and possibly a gender
/// classification. Within each classification the global places are
/// compressed into a dense 1..K ranking.
///
/// ## Arguments
/// * `conn` - the store holding the race
/// * `race_id` - id of the ended race with confirmed places
///
/// ## Returns
/// * `Vec<ClassificationPlacement>` - the created placement rows
pub fn assign_places_in_classifications(
    conn: &mut Store,
    race_id: i32,
) -> CustomResult<Vec<ClassificationPlacement>> {
    info!(target: "tasks/assign_classification_places", "assigning classification places for race {}", race_id);

    let race = Race::get_by_id(conn, race_id)?;
    ensure!(
        race.status == RaceStatus::Ended,
        InvalidRaceStatusSnafu {
            details: format!(
                "race {} must have ended to assign classification places, is {:?}",
                race_id, race.status
            ),
        }
    );
    ensure!(
        !ClassificationPlacement::exist_for_race(conn, race_id),
        PlacementsAlreadyAssignedSnafu { race_id }
    );

    let standard = Classification::standard_set(conn, race.season_id)?;

    let mut ranked = Vec::new();
    for participation in RaceParticipation::approved_from_race(conn, race_id) {
        let place = participation
            .place_assigned_overall
            .context(InvalidPlaceSetSnafu {
                details: format!(
                    "participation {} has no confirmed place",
                    participation.id
                ),
            })?;
        let bike = Bike::get_by_id(conn, participation.bike_id)?;
        let rider = Rider::get_by_id(conn, participation.rider_id)?;

        ranked.push(RankedEntry {
            participation_id: participation.id,
            place,
            bike_type: bike.bike_type,
            gender: rider.gender,
        });
    }
    ranked.sort_by_key(|e| e.place);

    let mut placements = Vec::new();
    placements.extend(classification_entries(&ranked, standard.general.id, |_| true));
    placements.extend(classification_entries(&ranked, standard.road.id, |e| {
        e.bike_type == BikeType::Road
    }));
    placements.extend(classification_entries(&ranked, standard.fixie.id, |e| {
        e.bike_type == BikeType::Fixie
    }));
    placements.extend(classification_entries(&ranked, standard.men.id, |e| {
        e.gender == Some(Gender::Male)
    }));
    placements.extend(classification_entries(&ranked, standard.women.id, |e| {
        e.gender == Some(Gender::Female)
    }));

    ClassificationPlacement::insert_all(conn, placements.clone());

    info!(target: "tasks/assign_classification_places", "created {} placements for race {}", placements.len(), race_id);

    Ok(placements)
}

/// Walks the globally ranked entries and keeps a running offset of skipped
/// riders, so the classification places stay dense without a second sort.
/// Correct only because the entries arrive sorted by confirmed place.
fn classification_entries(
    ranked: &[RankedEntry],
    classification_id: i32,
    filter: impl Fn(&RankedEntry) -> bool,
) -> Vec<ClassificationPlacement> {
    let mut entries = Vec::new();
    let mut offset = 0;

    for entry in ranked {
        if !filter(entry) {
            offset += 1;
            continue;
        }

        entries.push(ClassificationPlacement {
            race_participation_id: entry.participation_id,
            classification_id,
            place: entry.place - offset,
        });
    }

    entries
}
