use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::errors::{
    AlreadyExistsSnafu, CustomResult, MalformedInputSnafu, NoCurrentSeasonSnafu, NotFoundSnafu,
};
use crate::modules::models::general::Store;

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Season {
    pub id: i32,
    pub name: String,
    pub start_timestamp: NaiveDateTime,
    pub end_timestamp: NaiveDateTime,
}

impl Season {
    pub fn new(
        conn: &mut Store,
        name: &str,
        start_timestamp: NaiveDateTime,
        end_timestamp: NaiveDateTime,
    ) -> CustomResult<Season> {
        ensure!(
            end_timestamp > start_timestamp,
            MalformedInputSnafu {
                details: format!("season '{name}' must end after it starts"),
            }
        );
        ensure!(
            !conn.seasons.values().any(|s| s.name == name),
            AlreadyExistsSnafu {
                details: format!("season '{name}' already exists"),
            }
        );

        let season = Season {
            id: conn.next_id(),
            name: name.to_string(),
            start_timestamp,
            end_timestamp,
        };
        conn.seasons.insert(season.id, season.clone());

        Ok(season)
    }

    pub fn get_by_id(conn: &Store, id: i32) -> CustomResult<Season> {
        conn.seasons
            .get(&id)
            .cloned()
            .context(NotFoundSnafu { what: "season", id })
    }

    /// The season whose date window contains `now`.
    pub fn current(conn: &Store, now: NaiveDateTime) -> CustomResult<Season> {
        conn.seasons
            .values()
            .find(|s| s.start_timestamp <= now && s.end_timestamp > now)
            .cloned()
            .context(NoCurrentSeasonSnafu)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::Season;
    use crate::errors::Error;
    use crate::modules::models::general::Store;

    fn date(y: i32, m: u32, d: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn current_season_is_found_by_date_window() {
        let conn = &mut Store::new();
        Season::new(conn, "Season 1", date(2023, 10, 2), date(2024, 2, 19)).unwrap();
        let summer = Season::new(conn, "Season 2", date(2024, 4, 1), date(2024, 9, 30)).unwrap();

        let current = Season::current(conn, date(2024, 6, 1)).unwrap();
        assert_eq!(current, summer);

        assert!(matches!(
            Season::current(conn, date(2024, 3, 1)),
            Err(Error::NoCurrentSeason)
        ));
    }

    #[test]
    fn invalid_window_and_duplicate_names_are_rejected() {
        let conn = &mut Store::new();

        assert!(matches!(
            Season::new(conn, "Season 1", date(2024, 2, 19), date(2023, 10, 2)),
            Err(Error::MalformedInput { .. })
        ));

        Season::new(conn, "Season 1", date(2023, 10, 2), date(2024, 2, 19)).unwrap();
        assert!(matches!(
            Season::new(conn, "Season 1", date(2024, 4, 1), date(2024, 9, 30)),
            Err(Error::AlreadyExists { .. })
        ));
    }
}
