use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::errors::{CustomResult, MalformedTrackSnafu, TrackParseSnafu, TrackReadSnafu};
use crate::modules::helpers::math::Math;

/// A single recorded GPS sample. Reference routes usually come without
/// timestamps, recordings always carry them.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct TrackPoint {
    pub timestamp: Option<NaiveDateTime>,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
}

/// An ordered, immutable sequence of trackpoints loaded from a gpx file.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Track {
    points: Vec<TrackPoint>,
}

impl Track {
    /// # load a track from a gpx file
    /// flattens every segment of every contained track into one ordered
    /// point sequence
    ///
    /// ## Arguments
    /// * `path` - path of the gpx file to load
    ///
    /// ## Returns
    /// * `Track` - the loaded track
    pub fn from_gpx_file(path: &Path) -> CustomResult<Track> {
        let file = File::open(path).context(TrackReadSnafu { path })?;
        let gpx = gpx::read(BufReader::new(file)).context(TrackParseSnafu { path })?;

        let mut points = Vec::new();
        for track in &gpx.tracks {
            for segment in &track.segments {
                for waypoint in &segment.points {
                    let position = waypoint.point();
                    points.push(TrackPoint {
                        timestamp: waypoint.time.map(to_naive_utc).transpose()?,
                        latitude: position.y(),
                        longitude: position.x(),
                        elevation: waypoint.elevation,
                    });
                }
            }
        }

        Track::from_points(points)
    }

    pub fn from_points(points: Vec<TrackPoint>) -> CustomResult<Track> {
        ensure!(
            !points.is_empty(),
            MalformedTrackSnafu {
                details: "track contains no trackpoints",
            }
        );

        Ok(Track { points })
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    pub fn first_point(&self) -> Option<&TrackPoint> {
        self.points.first()
    }

    pub fn last_point(&self) -> Option<&TrackPoint> {
        self.points.last()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// # smooth the track
    /// averages latitude and longitude over a moving window of `window`
    /// samples to suppress GPS jitter; timestamps and elevation are carried
    /// through unchanged
    ///
    /// ## Arguments
    /// * `window` - amount of samples in the averaging window
    ///
    /// ## Returns
    /// * `Track` - the smoothed copy
    pub fn smoothed(&self, window: usize) -> Track {
        let latitudes: Vec<f64> = self.points.iter().map(|p| p.latitude).collect();
        let longitudes: Vec<f64> = self.points.iter().map(|p| p.longitude).collect();

        let latitudes = Math::moving_average(&latitudes, window);
        let longitudes = Math::moving_average(&longitudes, window);

        let points = self
            .points
            .iter()
            .zip(latitudes.into_iter().zip(longitudes))
            .map(|(point, (latitude, longitude))| TrackPoint {
                timestamp: point.timestamp,
                latitude,
                longitude,
                elevation: point.elevation,
            })
            .collect();

        Track { points }
    }
}

fn to_naive_utc(time: gpx::Time) -> CustomResult<NaiveDateTime> {
    let odt: time::OffsetDateTime = time.into();

    chrono::DateTime::<chrono::Utc>::from_timestamp(odt.unix_timestamp(), odt.nanosecond())
        .map(|dt| dt.naive_utc())
        .context(MalformedTrackSnafu {
            details: format!("trackpoint timestamp out of range: {odt}"),
        })
}
