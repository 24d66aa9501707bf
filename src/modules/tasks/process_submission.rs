use std::path::Path;

use chrono::NaiveDateTime;
use log::{info, warn};
use snafu::OptionExt;

use crate::errors::{CustomResult, MalformedTrackSnafu};
use crate::modules::interpolation::interpolate_end_timestamp;
use crate::modules::models::general::Store;
use crate::modules::models::participation::RaceParticipation;
use crate::modules::models::race::Race;
use crate::modules::track::Track;

/// # process a submitted race recording
/// reads the ride window out of the recording: the start from the first
/// sample, the finish by interpolating the recording against the race's
/// reference route. Neither estimate is allowed to block the pipeline: an
/// unreadable start falls back to the race's scheduled start, a failed
/// interpolation to the submission wall-clock time, trading precision for a
/// race that can always close.
///
/// ## Arguments
/// * `conn` - the store holding the race
/// * `race_id` - race the recording belongs to
/// * `rider_id` - rider who submitted
/// * `recording_path` - the uploaded gpx file
/// * `now` - submission wall-clock time, used by the fallbacks
///
/// ## Returns
/// * `RaceParticipation` - the participation with the ride recorded
pub fn process_result_submission(
    conn: &mut Store,
    race_id: i32,
    rider_id: i32,
    recording_path: &Path,
    now: NaiveDateTime,
) -> CustomResult<RaceParticipation> {
    info!(
        target: "tasks/process_submission",
        "processing submission for race {} by rider {}", race_id, rider_id
    );

    let race = Race::get_by_id(conn, race_id)?;
    let participation = RaceParticipation::get_by_rider_and_race(conn, race_id, rider_id)?;

    let recording = Track::from_gpx_file(recording_path);

    let start_timestamp = recording
        .as_ref()
        .ok()
        .and_then(|track| track.first_point())
        .and_then(|point| point.timestamp)
        .unwrap_or_else(|| {
            warn!(
                target: "tasks/process_submission",
                "could not read start timestamp of {}, falling back to the scheduled race start",
                recording_path.display()
            );
            race.start_timestamp
        });

    let end_timestamp = match &recording {
        Ok(track) => estimate_end_timestamp(track, &race).unwrap_or_else(|error| {
            warn!(
                target: "tasks/process_submission",
                "could not interpolate end timestamp of {} ({}), falling back to now",
                recording_path.display(),
                error
            );
            now
        }),
        Err(error) => {
            warn!(
                target: "tasks/process_submission",
                "could not read recording {} ({}), falling back to now",
                recording_path.display(),
                error
            );
            now
        }
    };

    let participation = RaceParticipation::record_ride(
        conn,
        participation.id,
        start_timestamp,
        end_timestamp,
        &recording_path.to_string_lossy(),
    )?;

    info!(
        target: "tasks/process_submission",
        "submission of rider {} in race {} recorded ({} - {})",
        rider_id, race_id, start_timestamp, end_timestamp
    );

    Ok(participation)
}

/// Loads the reference route and interpolates the finish crossing of the
/// final lap.
fn estimate_end_timestamp(recording: &Track, race: &Race) -> CustomResult<NaiveDateTime> {
    let route = Track::from_gpx_file(Path::new(&race.checkpoints_gpx_file))?;
    let end = route.last_point().context(MalformedTrackSnafu {
        details: "reference route has no trackpoints",
    })?;

    interpolate_end_timestamp(
        recording,
        &[end.latitude, end.longitude],
        race.no_laps,
    )
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::Path;

    use chrono::{Duration, NaiveDate, NaiveDateTime};

    use super::process_result_submission;
    use crate::errors::Error;
    use crate::modules::models::general::Store;
    use crate::modules::models::race::Race;
    use crate::modules::testutil::race_fixture;

    const END_LAT: f64 = 52.219954;
    const END_LON: f64 = 21.011319;

    fn gpx_document(points: &[(f64, f64, NaiveDateTime)]) -> String {
        let mut doc = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <gpx xmlns=\"http://www.topografix.com/GPX/1/1\" version=\"1.1\" creator=\"velo\">\n\
             <trk><trkseg>\n",
        );
        for (lat, lon, time) in points {
            doc.push_str(&format!(
                "<trkpt lat=\"{lat}\" lon=\"{lon}\"><time>{}Z</time></trkpt>\n",
                time.format("%Y-%m-%dT%H:%M:%S%.3f")
            ));
        }
        doc.push_str("</trkseg></trk></gpx>\n");
        doc
    }

    /// A three-lap ride recording crossing the route's end point at minutes
    /// 1, 2 and 3 past `start`.
    fn ride_recording(start: NaiveDateTime) -> String {
        let step = 0.0001;
        let mut offsets: Vec<f64> = Vec::new();
        offsets.extend((-20..=20).map(f64::from));
        offsets.extend((-20..=19).rev().map(f64::from));
        offsets.extend((-19..=20).map(f64::from));

        let points: Vec<(f64, f64, NaiveDateTime)> = offsets
            .iter()
            .enumerate()
            .map(|(i, &k)| {
                (
                    END_LAT + k * step,
                    END_LON + k * step,
                    start + Duration::seconds(i as i64),
                )
            })
            .collect();
        gpx_document(&points)
    }

    /// A reference route ending exactly at the finish coordinates.
    fn reference_route() -> String {
        let points: Vec<(f64, f64, NaiveDateTime)> = (0..3)
            .map(|i| {
                (
                    END_LAT - 0.01 + i as f64 * 0.005,
                    END_LON - 0.01 + i as f64 * 0.005,
                    NaiveDate::from_ymd_opt(2023, 12, 1)
                        .unwrap()
                        .and_hms_opt(10, 0, i)
                        .unwrap(),
                )
            })
            .collect();
        gpx_document(&points)
    }

    fn write_file(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn submission_records_the_interpolated_window() {
        let conn = &mut Store::new();
        let fixture = race_fixture(conn, 1);
        let dir = tempfile::tempdir().unwrap();

        let route_path = write_file(dir.path(), "route.gpx", &reference_route());
        {
            let race = conn.races.get_mut(&fixture.race_id).unwrap();
            race.checkpoints_gpx_file = route_path.to_string_lossy().to_string();
        }

        let ride_start = NaiveDate::from_ymd_opt(2023, 12, 20)
            .unwrap()
            .and_hms_opt(12, 39, 40)
            .unwrap();
        let ride_path = write_file(dir.path(), "ride.gpx", &ride_recording(ride_start));

        let now = NaiveDate::from_ymd_opt(2023, 12, 20)
            .unwrap()
            .and_hms_opt(14, 0, 0)
            .unwrap();
        let participation = process_result_submission(
            conn,
            fixture.race_id,
            fixture.rider_ids[0],
            &ride_path,
            now,
        )
        .unwrap();

        assert_eq!(participation.ride_start_timestamp, Some(ride_start));
        // the third lap crossing, not the fallback
        assert_eq!(
            participation.ride_end_timestamp,
            Some(ride_start + Duration::seconds(100))
        );
        assert!(participation.ride_gpx_file.is_some());
    }

    #[test]
    fn broken_recording_falls_back_to_race_start_and_now() {
        let conn = &mut Store::new();
        let fixture = race_fixture(conn, 1);
        let dir = tempfile::tempdir().unwrap();

        let broken = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
            <gpx xmlns=\"http://www.topografix.com/GPX/1/1\" version=\"1.1\" creator=\"velo\">\n\
            <trk><trkseg></trkseg></trk></gpx>\n";
        let ride_path = write_file(dir.path(), "ride.gpx", broken);

        let now = NaiveDate::from_ymd_opt(2023, 12, 20)
            .unwrap()
            .and_hms_opt(13, 30, 0)
            .unwrap();
        let participation = process_result_submission(
            conn,
            fixture.race_id,
            fixture.rider_ids[0],
            &ride_path,
            now,
        )
        .unwrap();

        let race = Race::get_by_id(conn, fixture.race_id).unwrap();
        assert_eq!(participation.ride_start_timestamp, Some(race.start_timestamp));
        assert_eq!(participation.ride_end_timestamp, Some(now));
    }

    #[test]
    fn missing_route_file_still_produces_a_result() {
        let conn = &mut Store::new();
        let fixture = race_fixture(conn, 1);
        let dir = tempfile::tempdir().unwrap();

        // the race points at a route file that does not exist
        let ride_start = NaiveDate::from_ymd_opt(2023, 12, 20)
            .unwrap()
            .and_hms_opt(12, 39, 40)
            .unwrap();
        let ride_path = write_file(dir.path(), "ride.gpx", &ride_recording(ride_start));

        let now = NaiveDate::from_ymd_opt(2023, 12, 20)
            .unwrap()
            .and_hms_opt(13, 45, 0)
            .unwrap();
        let participation = process_result_submission(
            conn,
            fixture.race_id,
            fixture.rider_ids[0],
            &ride_path,
            now,
        )
        .unwrap();

        // the start is readable, the finish falls back
        assert_eq!(participation.ride_start_timestamp, Some(ride_start));
        assert_eq!(participation.ride_end_timestamp, Some(now));
    }

    #[test]
    fn second_submission_is_rejected() {
        let conn = &mut Store::new();
        let fixture = race_fixture(conn, 1);
        let dir = tempfile::tempdir().unwrap();

        let ride_start = NaiveDate::from_ymd_opt(2023, 12, 20)
            .unwrap()
            .and_hms_opt(12, 39, 40)
            .unwrap();
        let ride_path = write_file(dir.path(), "ride.gpx", &ride_recording(ride_start));

        let now = NaiveDate::from_ymd_opt(2023, 12, 20)
            .unwrap()
            .and_hms_opt(13, 45, 0)
            .unwrap();
        process_result_submission(conn, fixture.race_id, fixture.rider_ids[0], &ride_path, now)
            .unwrap();

        assert!(matches!(
            process_result_submission(
                conn,
                fixture.race_id,
                fixture.rider_ids[0],
                &ride_path,
                now,
            ),
            Err(Error::DuplicateSubmission { .. })
        ));
    }
}
