//! Shared fixtures for the task tests.

use chrono::{NaiveDate, NaiveDateTime};

use crate::modules::models::bike::{Bike, BikeType};
use crate::modules::models::classification::Classification;
use crate::modules::models::general::Store;
use crate::modules::models::participation::{RaceParticipation, RaceParticipationStatus};
use crate::modules::models::race::{NewRace, Race};
use crate::modules::models::rider::Rider;
use crate::modules::models::season::Season;

pub fn datetime(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 12, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

pub fn setup_season(conn: &mut Store) -> Season {
    let season = Season::new(
        conn,
        "Season 1",
        datetime(1, 0, 0),
        datetime(30, 0, 0),
    )
    .unwrap();
    Classification::create_standard_set(conn, season.id).unwrap();

    season
}

pub fn race_factory(conn: &mut Store, season_id: i32, mapping: &str) -> Race {
    let number = conn.races.len() + 1;
    Race::new(
        conn,
        NewRace {
            name: format!("Race {number}"),
            description: "A lap race around the park".to_string(),
            requirements: None,
            checkpoints_gpx_file: format!("route-{number}.gpx"),
            meetup_timestamp: Some(datetime(20, 12, 0)),
            start_timestamp: datetime(20, 12, 30),
            end_timestamp: datetime(20, 14, 0),
            entry_fee_gr: 1500,
            no_laps: 3,
            temperature: None,
            rain: None,
            wind: None,
            place_to_points_mapping_json: mapping.to_string(),
            sponsor_banners_uuids_json: r#"["banner-1"]"#.to_string(),
            season_id,
        },
    )
    .unwrap()
}

pub fn riders_with_bikes(conn: &mut Store, count: usize) -> Vec<(Rider, Bike)> {
    (1..=count)
        .map(|i| {
            let rider = Rider::new(
                conn,
                &format!("rider{i}"),
                &format!("Test{i}"),
                "Rider",
                None,
            );
            let bike = Bike::new(
                conn,
                rider.id,
                &format!("Rocket {i}"),
                BikeType::Road,
                Some("Canyon"),
                None,
            )
            .unwrap();
            (rider, bike)
        })
        .collect()
}

pub fn approved_participations(
    conn: &mut Store,
    race_id: i32,
    riders: &[(Rider, Bike)],
) -> Vec<RaceParticipation> {
    riders
        .iter()
        .map(|(rider, bike)| {
            let participation = RaceParticipation::new(conn, race_id, rider.id, bike.id).unwrap();
            RaceParticipation::set_status(
                conn,
                participation.id,
                RaceParticipationStatus::Approved,
            )
            .unwrap()
        })
        .collect()
}

pub struct RaceFixture {
    pub season_id: i32,
    pub race_id: i32,
    pub rider_ids: Vec<i32>,
    pub bike_ids: Vec<i32>,
    pub participation_ids: Vec<i32>,
}

/// A pending race in a fully set up season with `rider_count` approved
/// participations.
pub fn race_fixture(conn: &mut Store, rider_count: usize) -> RaceFixture {
    let season = setup_season(conn);
    let race = race_factory(
        conn,
        season.id,
        r#"[{"place": 1, "points": 20}, {"place": 999, "points": 4}]"#,
    );
    let riders = riders_with_bikes(conn, rider_count);
    let participations = approved_participations(conn, race.id, &riders);

    RaceFixture {
        season_id: season.id,
        race_id: race.id,
        rider_ids: riders.iter().map(|(r, _)| r.id).collect(),
        bike_ids: riders.iter().map(|(_, b)| b.id).collect(),
        participation_ids: participations.iter().map(|p| p.id).collect(),
    }
}

/// Backdoor for ranking tests that need exact end timestamps.
pub fn set_end_timestamp(conn: &mut Store, participation_id: i32, timestamp: NaiveDateTime) {
    RaceParticipation::stamp_missing_end_timestamp(conn, participation_id, timestamp).unwrap();
}
