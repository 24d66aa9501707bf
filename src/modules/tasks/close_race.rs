use chrono::NaiveDateTime;
use log::info;

use crate::errors::CustomResult;
use crate::modules::models::general::Store;
use crate::modules::models::participation::{RaceParticipation, RaceParticipationStatus};
use crate::modules::models::race::{Race, RaceStatus};

/// # end a race and derive the provisional finish order
/// marks the race ended, stamps riders who never finished with the closure
/// time and assigns 1-based `place_generated_overall` values from the end
/// timestamps. Identical timestamps share a place; the next distinct
/// timestamp gets its position in sort order, not the next free rank.
///
/// Recomputes everything from scratch, so re-running it on an already ended
/// race is harmless.
///
/// ## Arguments
/// * `conn` - the store holding the race
/// * `race_id` - id of the race to close
/// * `now` - closure wall-clock time, used for riders without a finish
///
/// ## Returns
/// * `Vec<RaceParticipation>` - the approved participations with their
///   generated places
pub fn end_race_and_generate_places(
    conn: &mut Store,
    race_id: i32,
    now: NaiveDateTime,
) -> CustomResult<Vec<RaceParticipation>> {
    info!(target: "tasks/close_race", "closing race {} and generating places", race_id);

    Race::set_status(conn, race_id, RaceStatus::Ended)?;

    let participations = RaceParticipation::from_race(conn, race_id);

    let mut approved = Vec::new();
    for participation in participations {
        if participation.status == RaceParticipationStatus::Approved {
            approved.push(RaceParticipation::stamp_missing_end_timestamp(
                conn,
                participation.id,
                now,
            )?);
        } else {
            // a participation rejected after an earlier closure run must not
            // keep its stale place
            RaceParticipation::set_generated_place(conn, participation.id, None)?;
        }
    }

    approved.sort_by_key(|p| p.ride_end_timestamp);

    let mut ranked = Vec::with_capacity(approved.len());
    let mut prev_timestamp: Option<NaiveDateTime> = None;
    let mut prev_place = 1;
    for (index, participation) in approved.iter().enumerate() {
        let place = if participation.ride_end_timestamp == prev_timestamp {
            prev_place
        } else {
            index as i32 + 1
        };

        ranked.push(RaceParticipation::set_generated_place(
            conn,
            participation.id,
            Some(place),
        )?);
        prev_timestamp = participation.ride_end_timestamp;
        prev_place = place;
    }

    info!(target: "tasks/close_race", "race {} ended with {} ranked riders", race_id, ranked.len());

    Ok(ranked)
}

/// Whether every approved participation of the race has recorded an end
/// timestamp; once true the race can close automatically.
pub fn all_approved_finished(conn: &Store, race_id: i32) -> bool {
    let approved = RaceParticipation::approved_from_race(conn, race_id);

    !approved.is_empty() && approved.iter().all(|p| p.ride_end_timestamp.is_some())
}
