use std::{collections::HashMap, ffi::OsString, fs, path::Path};

use serde::Deserialize;
use serde_json::Value;

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::external_tool::{run_checked, CommandRunner};
use crate::photo::PhotoRecord;
use crate::track::Track;

/// One entry of the engine's `-json` output.
#[derive(Debug, Deserialize)]
struct GeotagRecord {
    #[serde(rename = "SourceFile")]
    source_file: String,
    #[serde(rename = "GPSLatitude", default)]
    latitude: Option<Value>,
    #[serde(rename = "GPSLongitude", default)]
    longitude: Option<Value>,
}

#[derive(Debug, Default)]
pub struct ImportOutcome {
    /// Photos that carry a coordinate, in input order.
    pub resolved: Vec<PhotoRecord>,
    /// Photos deleted because they carry none.
    pub unresolved: Vec<PhotoRecord>,
    /// Resolved photos already named by a waypoint are not added again.
    pub waypoints_added: usize,
}

/// Reads back the coordinates the engine wrote into `photos`, adds one
/// waypoint per located photo and deletes the files of the rest.
///
/// The raw engine output is kept in `metadata_file` until cleanup.
pub fn import_waypoints(
    runner: &dyn CommandRunner,
    config: &PipelineConfig,
    photos: Vec<PhotoRecord>,
    metadata_file: &Path,
    track: &mut Track,
) -> Result<ImportOutcome> {
    let mut outcome = ImportOutcome::default();
    let (present, missing): (Vec<_>, Vec<_>) =
        photos.into_iter().partition(|photo| photo.path.is_file());
    for photo in missing {
        warn!("no tagged copy produced for {}", photo.path.display());
        outcome.unresolved.push(photo);
    }

    let positions = if present.is_empty() {
        HashMap::new()
    } else {
        let stdout = run_checked(runner, &config.exiftool, &read_mode_args(&present))?;
        fs::write(metadata_file, &stdout)?;
        parse_positions(&config.exiftool, &stdout)?
    };

    for mut photo in present {
        photo.position = photo
            .file_name()
            .and_then(|name| positions.get(name))
            .copied();
        match photo.position {
            Some((latitude, longitude)) => {
                debug!(
                    "{} -> ({}, {})",
                    photo.path.display(),
                    latitude,
                    longitude
                );
                match photo.file_name() {
                    Some(name) if track.has_waypoint_named(name) => {
                        debug!("track already has a waypoint for {}", name);
                    }
                    Some(name) => {
                        track.add_named_waypoint(latitude, longitude, name)?;
                        outcome.waypoints_added += 1;
                    }
                    None => {
                        track.add_waypoint(latitude, longitude)?;
                        outcome.waypoints_added += 1;
                    }
                }
                outcome.resolved.push(photo);
            }
            None => {
                info!("no location for {}, discarding it", photo.path.display());
                fs::remove_file(&photo.path)?;
                outcome.unresolved.push(photo);
            }
        }
    }

    if outcome.resolved.is_empty() {
        warn!("none of the photos could be located on the track");
    }
    Ok(outcome)
}

pub fn read_mode_args(photos: &[PhotoRecord]) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-GPSLatitude".into(),
        "-GPSLongitude".into(),
        "-c".into(),
        "%+f".into(),
        "-json".into(),
    ];
    args.extend(photos.iter().map(|photo| photo.path.as_os_str().to_owned()));
    args
}

/// File name -> `(latitude, longitude)` for every record that has both.
fn parse_positions(tool: &str, json: &[u8]) -> Result<HashMap<String, (f64, f64)>> {
    // the engine prints nothing at all when no file had any of the tags
    if json.iter().all(u8::is_ascii_whitespace) {
        return Ok(HashMap::new());
    }
    let records: Vec<GeotagRecord> = serde_json::from_slice(json)
        .map_err(|e| Error::external_tool(tool, format!("unreadable metadata output: {e}")))?;

    let mut positions = HashMap::new();
    for record in records {
        let file_name = match Path::new(&record.source_file).file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => continue,
        };
        let latitude = record.latitude.as_ref().map(coordinate);
        let longitude = record.longitude.as_ref().map(coordinate);
        match (latitude, longitude) {
            (Some(Some(latitude)), Some(Some(longitude))) => {
                positions.insert(file_name, (latitude, longitude));
            }
            (None, None) => (),
            _ => warn!(
                "ignoring unusable coordinate for {}: {:?} / {:?}",
                record.source_file, record.latitude, record.longitude
            ),
        }
    }
    Ok(positions)
}

/// Accepts `+47.123456`, `-122.5` or a bare JSON number.
fn coordinate(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|x| x.is_finite())
}
