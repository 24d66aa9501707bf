use std::collections::HashMap;

use chrono::NaiveDateTime;
use log::{info, warn};

use crate::errors::CustomResult;
use crate::modules::models::classification::{
    Classification, ClassificationPlacement, RiderClassificationLink,
};
use crate::modules::models::general::Store;
use crate::modules::models::participation::{RaceParticipation, RaceParticipationStatus};
use crate::modules::models::race::{PlaceToPointsMapping, Race, RaceStatus};
use crate::modules::models::rider::{Gender, Rider};
use crate::modules::models::season::Season;

/// # recalculate the season's classification scores
/// folds every classification placement of the season's ended races into
/// cumulative per-rider scores, weighting each race's points by its weather,
/// and replaces the stored scores wholesale. A full recompute: bike or rider
/// attributes may have changed retroactively, an incremental ledger would
/// drift.
///
/// ## Arguments
/// * `conn` - the store holding the season
/// * `season_id` - season to recalculate, or `None` for the currently active
///   one
/// * `now` - used to resolve the active season
pub fn recalculate_classification_scores(
    conn: &mut Store,
    season_id: Option<i32>,
    now: NaiveDateTime,
) -> CustomResult<()> {
    let season = match season_id {
        Some(id) => Season::get_by_id(conn, id)?,
        None => Season::current(conn, now)?,
    };
    info!(target: "tasks/recalculate_scores", "recalculating classification scores of season {}", season.id);

    let standard = Classification::standard_set(conn, season.id)?;

    // approved participations of the season's ended races, with their race
    let mut qualifying: Vec<(RaceParticipation, Race)> = Vec::new();
    for race in Race::from_season(conn, season.id) {
        if race.status != RaceStatus::Ended {
            continue;
        }
        for participation in RaceParticipation::from_race(conn, race.id) {
            if participation.status == RaceParticipationStatus::Approved {
                qualifying.push((participation, race.clone()));
            }
        }
    }

    // zero accumulators; the gender classifications only track riders of the
    // matching population
    let mut riders: Vec<Rider> = Vec::new();
    for (participation, _) in &qualifying {
        if riders.iter().all(|r| r.id != participation.rider_id) {
            riders.push(Rider::get_by_id(conn, participation.rider_id)?);
        }
    }

    let mut scores: HashMap<i32, HashMap<i32, f64>> = HashMap::new();
    for classification in [&standard.general, &standard.road, &standard.fixie] {
        scores.insert(
            classification.id,
            riders.iter().map(|r| (r.id, 0.0)).collect(),
        );
    }
    scores.insert(
        standard.men.id,
        riders
            .iter()
            .filter(|r| r.gender == Some(Gender::Male))
            .map(|r| (r.id, 0.0))
            .collect(),
    );
    scores.insert(
        standard.women.id,
        riders
            .iter()
            .filter(|r| r.gender == Some(Gender::Female))
            .map(|r| (r.id, 0.0))
            .collect(),
    );

    // every mapping is parsed before the old scores are touched, so a broken
    // race aborts the run with the standings intact
    let mut mappings: HashMap<i32, PlaceToPointsMapping> = HashMap::new();
    for (_, race) in &qualifying {
        if !mappings.contains_key(&race.id) {
            mappings.insert(race.id, race.points_mapping()?);
        }
    }

    for (participation, race) in &qualifying {
        let mapping = &mappings[&race.id];
        let multiplier = race.weather_multiplier();

        for placement in ClassificationPlacement::from_participation(conn, participation.id) {
            let accumulator = scores
                .get_mut(&placement.classification_id)
                .and_then(|by_rider| by_rider.get_mut(&participation.rider_id));

            match accumulator {
                Some(score) => {
                    *score += f64::from(mapping.points_for_place(placement.place)) * multiplier;
                }
                None => {
                    warn!(
                        target: "tasks/recalculate_scores",
                        "no accumulator for rider {} in classification {}, skipping placement",
                        participation.rider_id, placement.classification_id
                    );
                }
            }
        }
    }

    let season_classification_ids: Vec<i32> = Classification::from_season(conn, season.id)
        .iter()
        .map(|c| c.id)
        .collect();

    let links: Vec<RiderClassificationLink> = scores
        .into_iter()
        .flat_map(|(classification_id, by_rider)| {
            by_rider
                .into_iter()
                .map(move |(rider_id, score)| RiderClassificationLink {
                    rider_id,
                    classification_id,
                    score: score.round() as i32,
                })
        })
        .collect();

    RiderClassificationLink::replace_for_classifications(conn, &season_classification_ids, links);

    info!(target: "tasks/recalculate_scores", "classification scores of season {} replaced", season.id);

    Ok(())
}
