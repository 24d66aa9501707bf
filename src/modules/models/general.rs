use std::collections::HashMap;

use crate::modules::models::bike::Bike;
use crate::modules::models::classification::{
    Classification, ClassificationPlacement, RiderClassificationLink,
};
use crate::modules::models::participation::RaceParticipation;
use crate::modules::models::race::Race;
use crate::modules::models::rider::Rider;
use crate::modules::models::season::Season;

/// In-memory persistence handle for the pipeline. The surrounding service
/// owns the real database; the core only sees already-persisted entities
/// referencing each other by id. Constructed once at startup and passed into
/// every model operation.
#[derive(Debug, Default)]
pub struct Store {
    pub(crate) riders: HashMap<i32, Rider>,
    pub(crate) bikes: HashMap<i32, Bike>,
    pub(crate) seasons: HashMap<i32, Season>,
    pub(crate) races: HashMap<i32, Race>,
    pub(crate) participations: HashMap<i32, RaceParticipation>,
    pub(crate) classifications: HashMap<i32, Classification>,
    pub(crate) placements: Vec<ClassificationPlacement>,
    pub(crate) classification_links: Vec<RiderClassificationLink>,
    next_id: i32,
}

impl Store {
    pub fn new() -> Store {
        Store::default()
    }

    pub(crate) fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }
}
