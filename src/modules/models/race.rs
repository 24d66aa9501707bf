use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::errors::{
    CustomResult, InvalidPointsMappingSnafu, InvalidRaceStatusSnafu, MalformedInputSnafu,
    NotFoundSnafu,
};
use crate::modules::models::general::Store;
use crate::modules::models::season::Season;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceStatus {
    Pending,
    InProgress,
    Ended,
    Cancelled,
}

impl RaceStatus {
    /// `pending → in_progress → ended`, with `cancelled` reachable from the
    /// two non-terminal states. A race can also be force-ended before it was
    /// ever marked in progress.
    pub fn can_transition_to(self, next: RaceStatus) -> bool {
        use RaceStatus::*;

        matches!(
            (self, next),
            (Pending, InProgress)
                | (Pending, Ended)
                | (Pending, Cancelled)
                | (InProgress, Ended)
                | (InProgress, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RaceStatus::Ended | RaceStatus::Cancelled)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaceTemperature {
    Cold,
    Normal,
    Hot,
}

impl RaceTemperature {
    pub fn points_multiplier(self) -> f64 {
        match self {
            RaceTemperature::Cold | RaceTemperature::Hot => 1.3,
            RaceTemperature::Normal => 1.0,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaceRain {
    Zero,
    Light,
    Heavy,
}

impl RaceRain {
    pub fn points_multiplier(self) -> f64 {
        match self {
            RaceRain::Zero => 1.0,
            RaceRain::Light => 1.3,
            RaceRain::Heavy => 2.0,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaceWind {
    Zero,
    Light,
    Heavy,
}

impl RaceWind {
    pub fn points_multiplier(self) -> f64 {
        match self {
            RaceWind::Zero => 1.0,
            RaceWind::Light => 1.1,
            RaceWind::Heavy => 1.4,
        }
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct PointsThreshold {
    pub place: i32,
    pub points: i32,
}

/// Typed form of the race's persisted `place_to_points_mapping_json` column.
/// Thresholds mean "finishing at or above this place is worth at least this
/// many points"; a rider placing worse than every threshold scores zero.
#[derive(Clone, PartialEq, Debug)]
pub struct PlaceToPointsMapping {
    thresholds: Vec<PointsThreshold>,
}

impl PlaceToPointsMapping {
    pub fn parse(raw: &str) -> CustomResult<PlaceToPointsMapping> {
        let mut thresholds: Vec<PointsThreshold> =
            serde_json::from_str(raw).map_err(|source| {
                InvalidPointsMappingSnafu {
                    details: source.to_string(),
                }
                .build()
            })?;

        for threshold in &thresholds {
            ensure!(
                threshold.place >= 1,
                InvalidPointsMappingSnafu {
                    details: format!("threshold place must be positive, got {}", threshold.place),
                }
            );
            ensure!(
                threshold.points >= 0,
                InvalidPointsMappingSnafu {
                    details: format!(
                        "threshold points must be non-negative, got {}",
                        threshold.points
                    ),
                }
            );
        }

        thresholds.sort_by_key(|t| t.place);
        ensure!(
            thresholds.windows(2).all(|w| w[0].place != w[1].place),
            InvalidPointsMappingSnafu {
                details: "duplicate threshold places",
            }
        );

        Ok(PlaceToPointsMapping { thresholds })
    }

    pub fn to_json(&self) -> CustomResult<String> {
        serde_json::to_string(&self.thresholds).map_err(|source| {
            InvalidPointsMappingSnafu {
                details: source.to_string(),
            }
            .build()
        })
    }

    /// Points for a confirmed place: the value of the smallest threshold
    /// covering it.
    pub fn points_for_place(&self, place: i32) -> i32 {
        self.thresholds
            .iter()
            .find(|t| t.place >= place)
            .map(|t| t.points)
            .unwrap_or(0)
    }
}

/// Everything needed to create a race; mirrors what the coordinator form
/// submits.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewRace {
    pub name: String,
    pub description: String,
    pub requirements: Option<String>,
    pub checkpoints_gpx_file: String,
    pub meetup_timestamp: Option<NaiveDateTime>,
    pub start_timestamp: NaiveDateTime,
    pub end_timestamp: NaiveDateTime,
    pub entry_fee_gr: i32,
    pub no_laps: i32,
    pub temperature: Option<RaceTemperature>,
    pub rain: Option<RaceRain>,
    pub wind: Option<RaceWind>,
    pub place_to_points_mapping_json: String,
    pub sponsor_banners_uuids_json: String,
    pub season_id: i32,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Race {
    pub id: i32,
    pub status: RaceStatus,
    pub name: String,
    pub description: String,
    pub requirements: Option<String>,
    pub checkpoints_gpx_file: String,
    pub meetup_timestamp: Option<NaiveDateTime>,
    pub start_timestamp: NaiveDateTime,
    pub end_timestamp: NaiveDateTime,
    pub entry_fee_gr: i32,
    pub no_laps: i32,
    pub temperature: Option<RaceTemperature>,
    pub rain: Option<RaceRain>,
    pub wind: Option<RaceWind>,
    pub place_to_points_mapping_json: String,
    pub sponsor_banners_uuids_json: String,
    pub season_id: i32,
}

impl Race {
    /// # create a race
    /// validates the timestamp window, the lap count and both json-encoded
    /// sub-schemas before anything is stored; a new race always starts out
    /// pending
    ///
    /// ## Arguments
    /// * `conn` - the store to create the race in
    /// * `new_race` - the race fields
    ///
    /// ## Returns
    /// * `Race` - the created race
    pub fn new(conn: &mut Store, new_race: NewRace) -> CustomResult<Race> {
        Season::get_by_id(conn, new_race.season_id)?;
        ensure!(
            new_race.end_timestamp > new_race.start_timestamp,
            MalformedInputSnafu {
                details: format!("race '{}' must end after it starts", new_race.name),
            }
        );
        ensure!(
            new_race.no_laps >= 1,
            MalformedInputSnafu {
                details: format!(
                    "race '{}' must have a positive lap count, got {}",
                    new_race.name, new_race.no_laps
                ),
            }
        );
        PlaceToPointsMapping::parse(&new_race.place_to_points_mapping_json)?;
        SponsorBanners::parse(&new_race.sponsor_banners_uuids_json)?;

        let race = Race {
            id: conn.next_id(),
            status: RaceStatus::Pending,
            name: new_race.name,
            description: new_race.description,
            requirements: new_race.requirements,
            checkpoints_gpx_file: new_race.checkpoints_gpx_file,
            meetup_timestamp: new_race.meetup_timestamp,
            start_timestamp: new_race.start_timestamp,
            end_timestamp: new_race.end_timestamp,
            entry_fee_gr: new_race.entry_fee_gr,
            no_laps: new_race.no_laps,
            temperature: new_race.temperature,
            rain: new_race.rain,
            wind: new_race.wind,
            place_to_points_mapping_json: new_race.place_to_points_mapping_json,
            sponsor_banners_uuids_json: new_race.sponsor_banners_uuids_json,
            season_id: new_race.season_id,
        };
        conn.races.insert(race.id, race.clone());

        Ok(race)
    }

    pub fn get_by_id(conn: &Store, id: i32) -> CustomResult<Race> {
        conn.races
            .get(&id)
            .cloned()
            .context(NotFoundSnafu { what: "race", id })
    }

    pub fn get_all(conn: &Store) -> Vec<Race> {
        let mut races: Vec<Race> = conn.races.values().cloned().collect();
        races.sort_by_key(|r| r.id);
        races
    }

    pub fn from_season(conn: &Store, season_id: i32) -> Vec<Race> {
        let mut races: Vec<Race> = conn
            .races
            .values()
            .filter(|r| r.season_id == season_id)
            .cloned()
            .collect();
        races.sort_by_key(|r| r.id);
        races
    }

    /// # transition the race status
    /// setting the current status again is a no-op, every other transition
    /// has to be allowed by the state machine
    pub fn set_status(conn: &mut Store, id: i32, next: RaceStatus) -> CustomResult<Race> {
        let race = conn
            .races
            .get_mut(&id)
            .context(NotFoundSnafu { what: "race", id })?;
        if race.status == next {
            return Ok(race.clone());
        }
        ensure!(
            race.status.can_transition_to(next),
            InvalidRaceStatusSnafu {
                details: format!(
                    "race {} cannot transition from {:?} to {:?}",
                    id, race.status, next
                ),
            }
        );
        race.status = next;

        Ok(race.clone())
    }

    pub fn set_weather(
        conn: &mut Store,
        id: i32,
        temperature: Option<RaceTemperature>,
        rain: Option<RaceRain>,
        wind: Option<RaceWind>,
    ) -> CustomResult<Race> {
        let race = conn
            .races
            .get_mut(&id)
            .context(NotFoundSnafu { what: "race", id })?;
        race.temperature = temperature;
        race.rain = rain;
        race.wind = wind;

        Ok(race.clone())
    }

    pub fn points_mapping(&self) -> CustomResult<PlaceToPointsMapping> {
        PlaceToPointsMapping::parse(&self.place_to_points_mapping_json)
    }

    /// Combined weather bonus applied to every point award of this race;
    /// missing attributes contribute a neutral factor.
    pub fn weather_multiplier(&self) -> f64 {
        self.temperature
            .map_or(1.0, RaceTemperature::points_multiplier)
            * self.rain.map_or(1.0, RaceRain::points_multiplier)
            * self.wind.map_or(1.0, RaceWind::points_multiplier)
    }
}

/// Typed form of the race's persisted `sponsor_banners_uuids_json` column.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct SponsorBanners(pub Vec<String>);

impl SponsorBanners {
    pub fn parse(raw: &str) -> CustomResult<SponsorBanners> {
        serde_json::from_str(raw)
            .map(SponsorBanners)
            .map_err(|source| {
                MalformedInputSnafu {
                    details: format!("invalid sponsor banner list: {source}"),
                }
                .build()
            })
    }

    pub fn to_json(&self) -> CustomResult<String> {
        serde_json::to_string(&self.0).map_err(|source| {
            MalformedInputSnafu {
                details: format!("invalid sponsor banner list: {source}"),
            }
            .build()
        })
    }
}
