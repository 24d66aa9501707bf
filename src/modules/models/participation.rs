use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::errors::{
    CustomResult, DuplicateSubmissionSnafu, InvalidPlaceSetSnafu, MalformedInputSnafu,
    NotFoundSnafu, PlaceAlreadyAssignedSnafu,
};
use crate::modules::models::bike::Bike;
use crate::modules::models::general::Store;
use crate::modules::models::race::Race;
use crate::modules::models::rider::Rider;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaceParticipationStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct RaceParticipation {
    pub id: i32,
    pub race_id: i32,
    pub rider_id: i32,
    pub bike_id: i32,
    pub status: RaceParticipationStatus,
    pub ride_start_timestamp: Option<NaiveDateTime>,
    pub ride_end_timestamp: Option<NaiveDateTime>,
    pub ride_gpx_file: Option<String>,
    pub place_generated_overall: Option<i32>,
    pub place_assigned_overall: Option<i32>,
}

impl RaceParticipation {
    pub fn new(
        conn: &mut Store,
        race_id: i32,
        rider_id: i32,
        bike_id: i32,
    ) -> CustomResult<RaceParticipation> {
        Race::get_by_id(conn, race_id)?;
        Rider::get_by_id(conn, rider_id)?;
        Bike::get_by_id(conn, bike_id)?;

        let participation = RaceParticipation {
            id: conn.next_id(),
            race_id,
            rider_id,
            bike_id,
            status: RaceParticipationStatus::Pending,
            ride_start_timestamp: None,
            ride_end_timestamp: None,
            ride_gpx_file: None,
            place_generated_overall: None,
            place_assigned_overall: None,
        };
        conn.participations
            .insert(participation.id, participation.clone());

        Ok(participation)
    }

    pub fn get_by_id(conn: &Store, id: i32) -> CustomResult<RaceParticipation> {
        conn.participations.get(&id).cloned().context(NotFoundSnafu {
            what: "race participation",
            id,
        })
    }

    pub fn get_by_rider_and_race(
        conn: &Store,
        race_id: i32,
        rider_id: i32,
    ) -> CustomResult<RaceParticipation> {
        conn.participations
            .values()
            .find(|p| p.race_id == race_id && p.rider_id == rider_id)
            .cloned()
            .context(NotFoundSnafu {
                what: "race participation of rider",
                id: rider_id,
            })
    }

    pub fn from_race(conn: &Store, race_id: i32) -> Vec<RaceParticipation> {
        let mut participations: Vec<RaceParticipation> = conn
            .participations
            .values()
            .filter(|p| p.race_id == race_id)
            .cloned()
            .collect();
        participations.sort_by_key(|p| p.id);
        participations
    }

    pub fn approved_from_race(conn: &Store, race_id: i32) -> Vec<RaceParticipation> {
        RaceParticipation::from_race(conn, race_id)
            .into_iter()
            .filter(|p| p.status == RaceParticipationStatus::Approved)
            .collect()
    }

    pub fn set_status(
        conn: &mut Store,
        id: i32,
        status: RaceParticipationStatus,
    ) -> CustomResult<RaceParticipation> {
        let participation = conn.participations.get_mut(&id).context(NotFoundSnafu {
            what: "race participation",
            id,
        })?;
        participation.status = status;

        Ok(participation.clone())
    }

    pub fn delete(conn: &mut Store, id: i32) {
        conn.participations.remove(&id);
    }

    /// # record a submitted ride
    /// stores the recording path together with the estimated ride window;
    /// a participation accepts exactly one recording
    ///
    /// ## Arguments
    /// * `conn` - the store holding the participation
    /// * `id` - id of the participation to update
    /// * `start_timestamp` - when the ride started
    /// * `end_timestamp` - the (possibly interpolated) finish instant
    /// * `gpx_file` - path of the stored recording
    ///
    /// ## Returns
    /// * `RaceParticipation` - the updated participation
    pub fn record_ride(
        conn: &mut Store,
        id: i32,
        start_timestamp: NaiveDateTime,
        end_timestamp: NaiveDateTime,
        gpx_file: &str,
    ) -> CustomResult<RaceParticipation> {
        let participation = conn.participations.get_mut(&id).context(NotFoundSnafu {
            what: "race participation",
            id,
        })?;
        ensure!(
            participation.ride_gpx_file.is_none(),
            DuplicateSubmissionSnafu { id }
        );
        ensure!(
            end_timestamp > start_timestamp,
            MalformedInputSnafu {
                details: format!(
                    "ride of participation {id} ends ({end_timestamp}) before it starts ({start_timestamp})"
                ),
            }
        );

        participation.ride_start_timestamp = Some(start_timestamp);
        participation.ride_end_timestamp = Some(end_timestamp);
        participation.ride_gpx_file = Some(gpx_file.to_string());

        Ok(participation.clone())
    }

    /// Used at closure time to rank riders who never finished; an already
    /// recorded end timestamp is left alone.
    pub fn stamp_missing_end_timestamp(
        conn: &mut Store,
        id: i32,
        timestamp: NaiveDateTime,
    ) -> CustomResult<RaceParticipation> {
        let participation = conn.participations.get_mut(&id).context(NotFoundSnafu {
            what: "race participation",
            id,
        })?;
        if participation.ride_end_timestamp.is_none() {
            participation.ride_end_timestamp = Some(timestamp);
        }

        Ok(participation.clone())
    }

    pub fn set_generated_place(
        conn: &mut Store,
        id: i32,
        place: Option<i32>,
    ) -> CustomResult<RaceParticipation> {
        let participation = conn.participations.get_mut(&id).context(NotFoundSnafu {
            what: "race participation",
            id,
        })?;
        participation.place_generated_overall = place;

        Ok(participation.clone())
    }

    /// # confirm the overall place
    /// stores the coordinator-confirmed place; once set the place is
    /// immutable
    pub fn assign_place(conn: &mut Store, id: i32, place: i32) -> CustomResult<RaceParticipation> {
        let participation = conn.participations.get_mut(&id).context(NotFoundSnafu {
            what: "race participation",
            id,
        })?;
        ensure!(
            participation.place_assigned_overall.is_none(),
            PlaceAlreadyAssignedSnafu { id }
        );
        ensure!(
            place >= 1,
            InvalidPlaceSetSnafu {
                details: format!("place must be positive, got {place}"),
            }
        );

        participation.place_assigned_overall = Some(place);

        Ok(participation.clone())
    }
}
