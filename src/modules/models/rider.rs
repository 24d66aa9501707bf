use serde::{Deserialize, Serialize};
use snafu::OptionExt;

use crate::errors::{CustomResult, NotFoundSnafu};
use crate::modules::models::general::Store;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Rider {
    pub id: i32,
    pub username: String,
    pub name: String,
    pub surname: String,
    pub gender: Option<Gender>,
}

impl Rider {
    pub fn new(
        conn: &mut Store,
        username: &str,
        name: &str,
        surname: &str,
        gender: Option<Gender>,
    ) -> Rider {
        let rider = Rider {
            id: conn.next_id(),
            username: username.to_string(),
            name: name.to_string(),
            surname: surname.to_string(),
            gender,
        };
        conn.riders.insert(rider.id, rider.clone());

        rider
    }

    pub fn get_by_id(conn: &Store, id: i32) -> CustomResult<Rider> {
        conn.riders
            .get(&id)
            .cloned()
            .context(NotFoundSnafu { what: "rider", id })
    }

    pub fn get_all(conn: &Store) -> Vec<Rider> {
        let mut riders: Vec<Rider> = conn.riders.values().cloned().collect();
        riders.sort_by_key(|r| r.id);
        riders
    }

    pub fn set_gender(conn: &mut Store, id: i32, gender: Option<Gender>) -> CustomResult<Rider> {
        let rider = conn
            .riders
            .get_mut(&id)
            .context(NotFoundSnafu { what: "rider", id })?;
        rider.gender = gender;

        Ok(rider.clone())
    }
}
