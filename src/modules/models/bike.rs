use serde::{Deserialize, Serialize};
use snafu::OptionExt;

use crate::errors::{CustomResult, NotFoundSnafu};
use crate::modules::models::general::Store;
use crate::modules::models::rider::Rider;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BikeType {
    Road,
    Fixie,
    Other,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Bike {
    pub id: i32,
    pub name: String,
    pub bike_type: BikeType,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub rider_id: i32,
    pub is_retired: bool,
}

impl Bike {
    pub fn new(
        conn: &mut Store,
        rider_id: i32,
        name: &str,
        bike_type: BikeType,
        brand: Option<&str>,
        model: Option<&str>,
    ) -> CustomResult<Bike> {
        Rider::get_by_id(conn, rider_id)?;

        let bike = Bike {
            id: conn.next_id(),
            name: name.to_string(),
            bike_type,
            brand: brand.map(str::to_string),
            model: model.map(str::to_string),
            rider_id,
            is_retired: false,
        };
        conn.bikes.insert(bike.id, bike.clone());

        Ok(bike)
    }

    pub fn get_by_id(conn: &Store, id: i32) -> CustomResult<Bike> {
        conn.bikes
            .get(&id)
            .cloned()
            .context(NotFoundSnafu { what: "bike", id })
    }

    pub fn from_rider(conn: &Store, rider_id: i32) -> Vec<Bike> {
        let mut bikes: Vec<Bike> = conn
            .bikes
            .values()
            .filter(|b| b.rider_id == rider_id)
            .cloned()
            .collect();
        bikes.sort_by_key(|b| b.id);
        bikes
    }

    /// A retired bike stays attached to its past participations but can no
    /// longer join races.
    pub fn retire(conn: &mut Store, id: i32) -> CustomResult<Bike> {
        let bike = conn
            .bikes
            .get_mut(&id)
            .context(NotFoundSnafu { what: "bike", id })?;
        bike.is_retired = true;

        Ok(bike.clone())
    }

    pub fn set_type(conn: &mut Store, id: i32, bike_type: BikeType) -> CustomResult<Bike> {
        let bike = conn
            .bikes
            .get_mut(&id)
            .context(NotFoundSnafu { what: "bike", id })?;
        bike.bike_type = bike_type;

        Ok(bike.clone())
    }
}
