use chrono::{Duration, NaiveDateTime};
use snafu::prelude::*;

use crate::errors::{
    CustomResult, InsufficientDataSnafu, InterpolationOutOfRangeSnafu, MalformedInputSnafu,
    MalformedTrackSnafu, NoFinishCrossingSnafu, TooFewLapsSnafu,
};
use crate::modules::helpers::math::Math;
use crate::modules::track::{Track, TrackPoint};

/// Local minima further from the finish than this (degree units, roughly
/// 15 m) are GPS noise, not lap crossings.
pub const FINISH_DISTANCE_THRESHOLD: f64 = 0.00015;

/// Samples averaged together when denoising a recording.
const SMOOTHING_WINDOW: usize = 15;

/// Neighbourhood checked on each side of a sample when detecting distance
/// minima.
const MINIMA_ORDER: usize = 5;

/// Keeps the slope arithmetic finite when the two bracketing samples share a
/// latitude.
const SLOPE_EPSILON: f64 = 1e-12;

/// # interpolate the finish timestamp of a ride
/// estimates the wall-clock instant a rider crossed the finish by projecting
/// the route's end point onto the recording between the two samples closest
/// to the final lap crossing
///
/// ## Arguments
/// * `recording` - the rider's raw ride recording
/// * `end_point` - `[latitude, longitude]` of the reference route's end point
/// * `no_laps` - amount of laps in the race
///
/// ## Returns
/// * `NaiveDateTime` - the interpolated finish timestamp
pub fn interpolate_end_timestamp(
    recording: &Track,
    end_point: &[f64],
    no_laps: i32,
) -> CustomResult<NaiveDateTime> {
    ensure!(
        end_point.len() == 2,
        MalformedInputSnafu {
            details: format!(
                "finish coordinates must have exactly 2 components, got {}",
                end_point.len()
            ),
        }
    );
    ensure!(
        no_laps >= 1,
        MalformedInputSnafu {
            details: format!("no_laps must be positive, got {no_laps}"),
        }
    );
    let finish = (end_point[0], end_point[1]);

    let smoothed = recording.smoothed(SMOOTHING_WINDOW);
    let points = smoothed.points();

    let mut timestamps = Vec::with_capacity(points.len());
    for point in points {
        timestamps.push(point.timestamp.context(MalformedTrackSnafu {
            details: "recording contains trackpoints without timestamps",
        })?);
    }

    // distance from every sample to the route's end point, in degree space
    let distances: Vec<f64> = points
        .iter()
        .map(|p| Math::euclidean_distance((p.latitude, p.longitude), finish))
        .collect();

    let minima = Math::local_minima(&distances, MINIMA_ORDER);
    ensure!(
        minima.len() >= 2,
        InsufficientDataSnafu {
            found: minima.len(),
        }
    );

    // minima far away from the finish are noise, not lap crossings
    let crossings: Vec<usize> = minima
        .into_iter()
        .filter(|&i| distances[i] < FINISH_DISTANCE_THRESHOLD)
        .collect();
    ensure!(!crossings.is_empty(), NoFinishCrossingSnafu);
    ensure!(
        crossings.len() >= no_laps as usize,
        TooFewLapsSnafu {
            required: no_laps,
            found: crossings.len(),
        }
    );

    // the crossing that ended the final lap; a recording started late still
    // resolves to the last available crossing
    let selected = crossings[usize::min(no_laps as usize, crossings.len()) - 1];

    // of the selected sample and its time neighbours, the two closest to the
    // finish bracket the actual passage
    let mut candidates: Vec<usize> = Vec::with_capacity(3);
    if selected > 0 {
        candidates.push(selected - 1);
    }
    candidates.push(selected);
    if selected + 1 < points.len() {
        candidates.push(selected + 1);
    }
    candidates.sort_by(|a, b| distances[*a].total_cmp(&distances[*b]));

    let (p1, t1) = sample(points, &timestamps, candidates[0]);
    let (p2, t2) = sample(points, &timestamps, candidates[1]);

    // local linear model of the path through the bracketing samples
    let a1 = (p1.1 - p2.1) / (p1.0 - p2.0 + SLOPE_EPSILON) + SLOPE_EPSILON;
    let b1 = p1.1 - a1 * p1.0;
    // perpendicular from the finish onto that line
    let a2 = -1.0 / a1;
    let b2 = finish.1 - a2 * finish.0;

    let lat_p = (b2 - b1) / (a1 - a2);
    let lon_p = a2 * lat_p + b2;
    let projected = (lat_p, lon_p);

    let ((p_first, t_first), (_, t_second)) = if t1 <= t2 {
        ((p1, t1), (p2, t2))
    } else {
        ((p2, t2), (p1, t1))
    };

    // advance from the earlier sample proportionally to how far along the
    // bracket the projected point lies
    let span = Math::euclidean_distance(p1, p2);
    let fraction = Math::euclidean_distance(p_first, projected) / span;
    let window = t_second - t_first;
    let offset_ms = window.num_milliseconds() as f64 * fraction;

    let timestamp = if offset_ms.is_finite() {
        t_first.checked_add_signed(Duration::milliseconds(offset_ms.round() as i64))
    } else {
        None
    };
    let Some(timestamp) = timestamp else {
        return InterpolationOutOfRangeSnafu {
            details: format!("offset of {offset_ms} ms from {t_first} is not representable"),
        }
        .fail();
    };
    ensure!(
        t_first <= timestamp && timestamp <= t_second,
        InterpolationOutOfRangeSnafu {
            details: format!("{timestamp} not within [{t_first}, {t_second}]"),
        }
    );

    Ok(timestamp)
}

fn sample(
    points: &[TrackPoint],
    timestamps: &[NaiveDateTime],
    index: usize,
) -> ((f64, f64), NaiveDateTime) {
    (
        (points[index].latitude, points[index].longitude),
        timestamps[index],
    )
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    use super::interpolate_end_timestamp;
    use crate::errors::Error;
    use crate::modules::track::{Track, TrackPoint};

    const END_LAT: f64 = 52.219954;
    const END_LON: f64 = 21.011319;
    const STEP: f64 = 0.0001;

    fn at(offset: f64, timestamp: NaiveDateTime) -> TrackPoint {
        TrackPoint {
            timestamp: Some(timestamp),
            latitude: END_LAT + offset * STEP,
            longitude: END_LON + offset * STEP,
            elevation: None,
        }
    }

    fn datetime(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 8)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    /// Three passes over the finish along a diagonal at one sample per
    /// second; the lap crossings fall at 20:52:19, 20:52:59 and 20:53:39.
    fn three_lap_recording() -> Track {
        let start = datetime(20, 51, 59);
        let mut offsets: Vec<f64> = Vec::new();
        offsets.extend((-20..=20).map(f64::from));
        offsets.extend((-20..=19).rev().map(f64::from));
        offsets.extend((-19..=20).map(f64::from));

        let points = offsets
            .iter()
            .enumerate()
            .map(|(i, &k)| at(k, start + Duration::seconds(i as i64)))
            .collect();

        Track::from_points(points).unwrap()
    }

    /// A rider overshooting from the north-east, backing up to just short of
    /// the timing gate, standing still for twenty seconds and riding off the
    /// way they came. The stationary stretch collapses the interpolation
    /// bracket onto a single position.
    fn stalled_recording() -> Track {
        let start = datetime(20, 40, 0);
        let mut offsets: Vec<f64> = Vec::new();
        offsets.extend((1..=20).rev().map(f64::from));
        offsets.extend(std::iter::repeat(0.5).take(20));
        offsets.extend((1..=20).map(f64::from));

        let points = offsets
            .iter()
            .enumerate()
            .map(|(i, &k)| at(k, start + Duration::seconds(i as i64)))
            .collect();

        Track::from_points(points).unwrap()
    }

    #[test]
    fn interpolates_final_lap_crossing() {
        let recording = three_lap_recording();

        let timestamp =
            interpolate_end_timestamp(&recording, &[END_LAT, END_LON], 3).unwrap();

        assert!(timestamp > datetime(20, 53, 38) + Duration::milliseconds(767));
        assert!(timestamp < datetime(20, 53, 39) + Duration::milliseconds(570));
    }

    #[test]
    fn interpolates_earlier_crossing_for_fewer_laps() {
        let recording = three_lap_recording();

        let timestamp =
            interpolate_end_timestamp(&recording, &[END_LAT, END_LON], 1).unwrap();

        assert!(timestamp >= datetime(20, 52, 18));
        assert!(timestamp <= datetime(20, 52, 20));
    }

    #[test]
    fn too_many_laps_is_rejected() {
        let recording = three_lap_recording();

        assert!(matches!(
            interpolate_end_timestamp(&recording, &[END_LAT, END_LON], 99),
            Err(Error::TooFewLaps { required: 99, .. })
        ));
    }

    #[test]
    fn wrong_end_point_arity_is_rejected() {
        let recording = three_lap_recording();

        assert!(matches!(
            interpolate_end_timestamp(&recording, &[END_LAT], 3),
            Err(Error::MalformedInput { .. })
        ));
        assert!(matches!(
            interpolate_end_timestamp(&recording, &[END_LAT, END_LON, 0.0], 3),
            Err(Error::MalformedInput { .. })
        ));
    }

    #[test]
    fn single_pass_has_too_few_minima() {
        let start = datetime(20, 0, 0);
        let points = (-20..=20)
            .map(|k| at(f64::from(k), start + Duration::seconds((k + 20) as i64)))
            .collect();
        let recording = Track::from_points(points).unwrap();

        assert!(matches!(
            interpolate_end_timestamp(&recording, &[END_LAT, END_LON], 1),
            Err(Error::InsufficientData { .. })
        ));
    }

    #[test]
    fn far_away_end_point_has_no_crossing() {
        let recording = three_lap_recording();

        assert!(matches!(
            interpolate_end_timestamp(&recording, &[52.0, 21.0], 1),
            Err(Error::NoFinishCrossing)
        ));
    }

    #[test]
    fn stalled_bracket_is_out_of_range() {
        let recording = stalled_recording();

        assert!(matches!(
            interpolate_end_timestamp(&recording, &[END_LAT, END_LON], 2),
            Err(Error::InterpolationOutOfRange { .. })
        ));
    }

    #[test]
    fn result_stays_within_the_bracketing_samples() {
        let recording = three_lap_recording();

        for laps in 1..=3 {
            let timestamp =
                interpolate_end_timestamp(&recording, &[END_LAT, END_LON], laps).unwrap();
            let crossing = datetime(20, 51, 59) + Duration::seconds(20 + (laps as i64 - 1) * 40);
            assert!(timestamp >= crossing - Duration::seconds(1));
            assert!(timestamp <= crossing + Duration::seconds(1));
        }
    }
}
