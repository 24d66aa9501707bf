use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::errors::{
    AlreadyExistsSnafu, CustomResult, MissingClassificationSnafu, NotFoundSnafu,
};
use crate::modules::models::general::Store;
use crate::modules::models::participation::RaceParticipation;
use crate::modules::models::season::Season;

pub const GENERAL_CLASSIFICATION: &str = "General";
pub const ROAD_CLASSIFICATION: &str = "Road";
pub const FIXIE_CLASSIFICATION: &str = "Fixie";
pub const MEN_CLASSIFICATION: &str = "Men";
pub const WOMEN_CLASSIFICATION: &str = "Women";

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Classification {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub season_id: i32,
}

/// The five classifications every season is scored in. Membership is derived
/// from participation, bike and rider attributes at placement-assignment
/// time, never stored.
#[derive(Clone, PartialEq, Debug)]
pub struct StandardClassifications {
    pub general: Classification,
    pub road: Classification,
    pub fixie: Classification,
    pub men: Classification,
    pub women: Classification,
}

impl Classification {
    pub fn new(
        conn: &mut Store,
        season_id: i32,
        name: &str,
        description: &str,
    ) -> CustomResult<Classification> {
        Season::get_by_id(conn, season_id)?;
        ensure!(
            !conn
                .classifications
                .values()
                .any(|c| c.season_id == season_id && c.name == name),
            AlreadyExistsSnafu {
                details: format!("classification '{name}' already exists in season {season_id}"),
            }
        );

        let classification = Classification {
            id: conn.next_id(),
            name: name.to_string(),
            description: description.to_string(),
            season_id,
        };
        conn.classifications
            .insert(classification.id, classification.clone());

        Ok(classification)
    }

    pub fn get_by_id(conn: &Store, id: i32) -> CustomResult<Classification> {
        conn.classifications.get(&id).cloned().context(NotFoundSnafu {
            what: "classification",
            id,
        })
    }

    pub fn from_season(conn: &Store, season_id: i32) -> Vec<Classification> {
        let mut classifications: Vec<Classification> = conn
            .classifications
            .values()
            .filter(|c| c.season_id == season_id)
            .cloned()
            .collect();
        classifications.sort_by_key(|c| c.id);
        classifications
    }

    pub fn get_by_name(conn: &Store, season_id: i32, name: &str) -> CustomResult<Classification> {
        conn.classifications
            .values()
            .find(|c| c.season_id == season_id && c.name == name)
            .cloned()
            .context(MissingClassificationSnafu { name, season_id })
    }

    /// Creates the five standard classifications for a freshly set up season.
    pub fn create_standard_set(conn: &mut Store, season_id: i32) -> CustomResult<Vec<Classification>> {
        let descriptions = [
            (GENERAL_CLASSIFICATION, "Everyone rides in this one"),
            (ROAD_CLASSIFICATION, "Road bikes only"),
            (FIXIE_CLASSIFICATION, "Fixed-gear bikes only"),
            (MEN_CLASSIFICATION, "Male riders"),
            (WOMEN_CLASSIFICATION, "Female riders"),
        ];

        let mut created = Vec::with_capacity(descriptions.len());
        for (name, description) in descriptions {
            created.push(Classification::new(conn, season_id, name, description)?);
        }

        Ok(created)
    }

    /// Resolves the five standard classifications by name; fails without
    /// touching anything when one of them is missing.
    pub fn standard_set(conn: &Store, season_id: i32) -> CustomResult<StandardClassifications> {
        Ok(StandardClassifications {
            general: Classification::get_by_name(conn, season_id, GENERAL_CLASSIFICATION)?,
            road: Classification::get_by_name(conn, season_id, ROAD_CLASSIFICATION)?,
            fixie: Classification::get_by_name(conn, season_id, FIXIE_CLASSIFICATION)?,
            men: Classification::get_by_name(conn, season_id, MEN_CLASSIFICATION)?,
            women: Classification::get_by_name(conn, season_id, WOMEN_CLASSIFICATION)?,
        })
    }
}

/// Place of one race participation within one classification; written once
/// when the coordinator confirms a race's places.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ClassificationPlacement {
    pub race_participation_id: i32,
    pub classification_id: i32,
    pub place: i32,
}

impl ClassificationPlacement {
    pub fn insert_all(conn: &mut Store, placements: Vec<ClassificationPlacement>) {
        conn.placements.extend(placements);
    }

    pub fn from_participation(conn: &Store, participation_id: i32) -> Vec<ClassificationPlacement> {
        conn.placements
            .iter()
            .filter(|p| p.race_participation_id == participation_id)
            .cloned()
            .collect()
    }

    pub fn from_race(conn: &Store, race_id: i32) -> Vec<ClassificationPlacement> {
        let participation_ids: HashSet<i32> = RaceParticipation::from_race(conn, race_id)
            .iter()
            .map(|p| p.id)
            .collect();

        conn.placements
            .iter()
            .filter(|p| participation_ids.contains(&p.race_participation_id))
            .cloned()
            .collect()
    }

    pub fn exist_for_race(conn: &Store, race_id: i32) -> bool {
        !ClassificationPlacement::from_race(conn, race_id).is_empty()
    }
}

/// Cumulative season score of one rider in one classification. A derived
/// cache: the recalculator deletes and reinserts these rows wholesale.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct RiderClassificationLink {
    pub rider_id: i32,
    pub classification_id: i32,
    pub score: i32,
}

impl RiderClassificationLink {
    /// Replaces every link of the given classifications in one step.
    pub fn replace_for_classifications(
        conn: &mut Store,
        classification_ids: &[i32],
        links: Vec<RiderClassificationLink>,
    ) {
        conn.classification_links
            .retain(|l| !classification_ids.contains(&l.classification_id));
        conn.classification_links.extend(links);
    }

    /// Current standings of a classification, best score first.
    pub fn from_classification(
        conn: &Store,
        classification_id: i32,
    ) -> Vec<RiderClassificationLink> {
        let mut links: Vec<RiderClassificationLink> = conn
            .classification_links
            .iter()
            .filter(|l| l.classification_id == classification_id)
            .cloned()
            .collect();
        links.sort_by_key(|l| (std::cmp::Reverse(l.score), l.rider_id));
        links
    }

    pub fn get(
        conn: &Store,
        rider_id: i32,
        classification_id: i32,
    ) -> Option<RiderClassificationLink> {
        conn.classification_links
            .iter()
            .find(|l| l.rider_id == rider_id && l.classification_id == classification_id)
            .cloned()
    }
}
