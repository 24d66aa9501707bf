use std::path::PathBuf;

use snafu::prelude::*;

pub type CustomResult<T> = Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("{what} {id} not found"))]
    NotFound { what: &'static str, id: i32 },

    #[snafu(display("{details}"))]
    AlreadyExists { details: String },

    #[snafu(display("malformed input: {details}"))]
    MalformedInput { details: String },

    #[snafu(display("could not read gpx file {}: {source}", path.display()))]
    TrackRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("could not parse gpx file {}: {source}", path.display()))]
    TrackParse {
        path: PathBuf,
        source: gpx::errors::GpxError,
    },

    #[snafu(display("malformed track: {details}"))]
    MalformedTrack { details: String },

    #[snafu(display("found less than 2 distance minima ({found})"))]
    InsufficientData { found: usize },

    #[snafu(display("recording covers {found} finish crossings but the race has {required} laps"))]
    TooFewLaps { required: i32, found: usize },

    #[snafu(display("no trackpoint close enough to the finish"))]
    NoFinishCrossing,

    #[snafu(display("interpolated timestamp outside the interpolation window: {details}"))]
    InterpolationOutOfRange { details: String },

    #[snafu(display("invalid points mapping: {details}"))]
    InvalidPointsMapping { details: String },

    #[snafu(display("invalid race status: {details}"))]
    InvalidRaceStatus { details: String },

    #[snafu(display("participation {id} is not approved"))]
    NotApproved { id: i32 },

    #[snafu(display("participation {id} already has a recorded ride"))]
    DuplicateSubmission { id: i32 },

    #[snafu(display("participation {id} already has an assigned place"))]
    PlaceAlreadyAssigned { id: i32 },

    #[snafu(display("race {race_id} already has classification placements"))]
    PlacementsAlreadyAssigned { race_id: i32 },

    #[snafu(display("invalid place set: {details}"))]
    InvalidPlaceSet { details: String },

    #[snafu(display("no season is currently active"))]
    NoCurrentSeason,

    #[snafu(display("classification '{name}' missing for season {season_id}"))]
    MissingClassification { name: String, season_id: i32 },

    #[snafu(display("bike {id} is retired"))]
    BikeRetired { id: i32 },

    #[snafu(display("scheduler error: {message}"))]
    Scheduler { message: String },
}
