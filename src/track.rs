use std::{
    fs,
    io::{Read, Write},
    path::Path,
};

use chrono::{DateTime, Utc};
use geo_types::Point;
use gpx::{Gpx, Waypoint};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{Error, Result};
use crate::segment_merger;

/// A path point as seen by the rest of the pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
    pub time: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TrackSegment {
    pub track_points: Vec<TrackPoint>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct WaypointPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub name: Option<String>,
}

/// One recording session.
///
/// The source document is kept as read. `gpx` is the typed view used for
/// queries; edits are applied to both, and `serialize` replays them onto the
/// source so extensions and anything else the view does not model survive.
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    source: Vec<u8>,
    gpx: Gpx,
    added_waypoints: Vec<WaypointPosition>,
    merged: bool,
}

impl Track {
    pub fn parse<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        let source = fs::read(path)?;
        Self::from_bytes(source).map_err(|e| match e {
            Error::Format { reason, .. } => Error::Format {
                path: path.to_path_buf(),
                reason,
            },
            e => e,
        })
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut source = Vec::new();
        reader.read_to_end(&mut source)?;
        Self::from_bytes(source)
    }

    fn from_bytes(source: Vec<u8>) -> Result<Self> {
        let gpx = gpx::read(source.as_slice()).map_err(format_error)?;
        Ok(Track {
            source,
            gpx,
            added_waypoints: Vec::new(),
            merged: false,
        })
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        rewrite(&self.source, &self.added_waypoints, self.merged, writer)
    }

    pub fn add_waypoint(&mut self, latitude: f64, longitude: f64) -> Result<()> {
        self.push_waypoint(latitude, longitude, None)
    }

    pub fn add_named_waypoint(&mut self, latitude: f64, longitude: f64, name: &str) -> Result<()> {
        self.push_waypoint(latitude, longitude, Some(name.to_owned()))
    }

    fn push_waypoint(&mut self, latitude: f64, longitude: f64, name: Option<String>) -> Result<()> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(Error::Validation(format!(
                "waypoint coordinates must be finite, got ({latitude}, {longitude})"
            )));
        }
        let mut waypoint = Waypoint::new(Point::new(longitude, latitude));
        waypoint.name = name.clone();
        self.gpx.waypoints.push(waypoint);
        self.added_waypoints.push(WaypointPosition {
            latitude,
            longitude,
            name,
        });
        Ok(())
    }

    pub fn has_waypoint_named(&self, name: &str) -> bool {
        self.gpx
            .waypoints
            .iter()
            .any(|waypoint| waypoint.name.as_deref() == Some(name))
    }

    pub fn merge_all_segments(&mut self) {
        for track in self.gpx.tracks.iter_mut() {
            segment_merger::merge_segments(&mut track.segments);
        }
        self.merged = true;
    }

    pub fn segment_count(&self) -> usize {
        self.gpx.tracks.iter().map(|t| t.segments.len()).sum()
    }

    pub fn waypoint_count(&self) -> usize {
        self.gpx.waypoints.len()
    }

    /// All segments, track by track, in file order.
    pub fn segments(&self) -> Vec<TrackSegment> {
        self.gpx
            .tracks
            .iter()
            .flat_map(|track| track.segments.iter())
            .map(|segment| TrackSegment {
                track_points: segment.points.iter().map(to_track_point).collect(),
            })
            .collect()
    }

    pub fn waypoints(&self) -> Vec<WaypointPosition> {
        self.gpx
            .waypoints
            .iter()
            .map(|waypoint| {
                let point = waypoint.point();
                WaypointPosition {
                    latitude: point.y(),
                    longitude: point.x(),
                    name: waypoint.name.clone(),
                }
            })
            .collect()
    }

    fn timed_points(&self) -> impl Iterator<Item = (DateTime<Utc>, TrackPoint)> + '_ {
        self.gpx
            .tracks
            .iter()
            .flat_map(|track| track.segments.iter())
            .flat_map(|segment| segment.points.iter())
            .filter_map(|waypoint| {
                let point = to_track_point(waypoint);
                point.time.map(|time| (time, point))
            })
    }

    /// Earliest and latest timestamp over all path points.
    pub fn time_span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.timed_points().fold(None, |span, (time, _)| match span {
            None => Some((time, time)),
            Some((first, last)) => Some((first.min(time), last.max(time))),
        })
    }

    /// Where the recording was at `at`: the timed point nearest to it, or
    /// `None` when `at` is outside the recorded interval. No extrapolation.
    pub fn locate(&self, at: DateTime<Utc>) -> Option<(f64, f64)> {
        let (first, last) = self.time_span()?;
        if at < first || at > last {
            return None;
        }
        let mut best: Option<(i64, TrackPoint)> = None;
        for (time, point) in self.timed_points() {
            let distance = (time - at).num_milliseconds().abs();
            // strict comparison keeps the earlier point on ties
            if best.as_ref().map_or(true, |(d, _)| distance < *d) {
                best = Some((distance, point));
            }
        }
        best.map(|(_, point)| (point.latitude, point.longitude))
    }
}

fn to_track_point(waypoint: &Waypoint) -> TrackPoint {
    let point = waypoint.point();
    let time = waypoint
        .time
        .as_ref()
        .and_then(|time| time.format().ok())
        .and_then(|time| DateTime::parse_from_rfc3339(&time).ok())
        .map(|time| time.with_timezone(&Utc));
    TrackPoint {
        latitude: point.y(),
        longitude: point.x(),
        elevation: waypoint.elevation,
        time,
    }
}

fn format_error(e: impl std::fmt::Display) -> Error {
    Error::Format {
        path: Default::default(),
        reason: e.to_string(),
    }
}

const TRK: &[u8] = b"trk";
const TRKSEG: &[u8] = b"trkseg";
const EXTENSIONS: &[u8] = b"extensions";

/// Streams `source` into `writer`, placing `waypoints` after the existing
/// `<wpt>`s and, when `merge` is set, folding the `<trkseg>`s of every
/// `<trk>` into its first one. All other events are copied as read.
fn rewrite<W: Write>(
    source: &[u8],
    waypoints: &[WaypointPosition],
    merge: bool,
    writer: W,
) -> Result<()> {
    let mut reader = Reader::from_reader(source);
    let mut writer = Writer::new(writer);
    let mut buf = Vec::new();

    // local names of the open elements
    let mut open: Vec<Vec<u8>> = Vec::new();
    let mut prefix = String::new();
    let mut waypoints_pending = !waypoints.is_empty();
    // qualified name of the current track's first segment; its end tag is
    // held back until `</trk>`
    let mut segment: Option<Vec<u8>> = None;
    // segment `<extensions>` go after all merged points
    let mut segment_extensions: Vec<Event<'static>> = Vec::new();
    let mut capture_depth = 0usize;

    loop {
        buf.clear();
        let event = reader.read_event_into(&mut buf).map_err(format_error)?;
        if capture_depth > 0 {
            match &event {
                Event::Start(_) => capture_depth += 1,
                Event::End(_) => capture_depth -= 1,
                Event::Eof => return Err(format_error("unexpected end of document")),
                _ => (),
            }
            segment_extensions.push(event.into_owned());
            continue;
        }
        let in_track = merge && ends_with(&open, &[TRK]);
        let in_segment = merge && ends_with(&open, &[TRK, TRKSEG]);

        match event {
            Event::Eof => break,
            Event::Start(e) => {
                let name = e.local_name().as_ref().to_vec();
                if open.is_empty() {
                    prefix = prefix_of(e.name().as_ref());
                }
                if waypoints_pending && open.len() == 1 && follows_waypoints(&name) {
                    write_waypoints(&mut writer, &prefix, waypoints)?;
                    waypoints_pending = false;
                }
                if in_segment && name == EXTENSIONS {
                    capture_depth = 1;
                    segment_extensions.push(Event::Start(e.into_owned()));
                    continue;
                }
                let is_segment = in_track && name == TRKSEG;
                open.push(name);
                if is_segment {
                    if segment.is_some() {
                        continue;
                    }
                    segment = Some(e.name().as_ref().to_vec());
                }
                emit(&mut writer, Event::Start(e))?;
            }
            Event::Empty(e) => {
                let name = e.local_name().as_ref().to_vec();
                if open.is_empty() && waypoints_pending {
                    prefix = prefix_of(e.name().as_ref());
                    let end = e.to_end().into_owned();
                    emit(&mut writer, Event::Start(e))?;
                    write_waypoints(&mut writer, &prefix, waypoints)?;
                    emit(&mut writer, Event::End(end))?;
                    waypoints_pending = false;
                    continue;
                }
                if waypoints_pending && open.len() == 1 && follows_waypoints(&name) {
                    write_waypoints(&mut writer, &prefix, waypoints)?;
                    waypoints_pending = false;
                }
                if in_segment && name == EXTENSIONS {
                    segment_extensions.push(Event::Empty(e.into_owned()));
                    continue;
                }
                if in_track && name == TRKSEG {
                    if segment.is_none() {
                        // opened here, closed at `</trk>`
                        segment = Some(e.name().as_ref().to_vec());
                        emit(&mut writer, Event::Start(e))?;
                    }
                    continue;
                }
                emit(&mut writer, Event::Empty(e))?;
            }
            Event::End(e) => {
                if waypoints_pending && open.len() == 1 {
                    write_waypoints(&mut writer, &prefix, waypoints)?;
                    waypoints_pending = false;
                }
                if in_segment {
                    open.pop();
                    continue;
                }
                if in_track {
                    if let Some(tag) = segment.take() {
                        for extension in segment_extensions.drain(..) {
                            emit(&mut writer, extension)?;
                        }
                        let tag = String::from_utf8_lossy(&tag);
                        emit(&mut writer, Event::End(BytesEnd::new(tag)))?;
                    }
                }
                open.pop();
                emit(&mut writer, Event::End(e))?;
            }
            event => emit(&mut writer, event)?,
        }
    }
    Ok(())
}

fn emit<W: Write>(writer: &mut Writer<W>, event: Event<'_>) -> Result<()> {
    writer.write_event(event).map_err(format_error)
}

fn ends_with(open: &[Vec<u8>], tail: &[&[u8]]) -> bool {
    open.len() >= tail.len()
        && open[open.len() - tail.len()..]
            .iter()
            .zip(tail)
            .all(|(name, expected)| name.as_slice() == *expected)
}

/// Children of `<gpx>` that come after the waypoints.
fn follows_waypoints(name: &[u8]) -> bool {
    matches!(name, b"rte" | b"trk" | b"extensions")
}

/// `gpx:` for `gpx:gpx`, empty for an unprefixed root.
fn prefix_of(qualified: &[u8]) -> String {
    match qualified.iter().position(|&b| b == b':') {
        Some(colon) => String::from_utf8_lossy(&qualified[..=colon]).into_owned(),
        None => String::new(),
    }
}

fn write_waypoints<W: Write>(
    writer: &mut Writer<W>,
    prefix: &str,
    waypoints: &[WaypointPosition],
) -> Result<()> {
    let wpt = format!("{prefix}wpt");
    let name_tag = format!("{prefix}name");
    for waypoint in waypoints {
        let mut start = BytesStart::new(wpt.as_str());
        start.push_attribute(("lat", waypoint.latitude.to_string().as_str()));
        start.push_attribute(("lon", waypoint.longitude.to_string().as_str()));
        match &waypoint.name {
            Some(name) => {
                emit(writer, Event::Start(start))?;
                emit(writer, Event::Start(BytesStart::new(name_tag.as_str())))?;
                emit(writer, Event::Text(BytesText::new(name)))?;
                emit(writer, Event::End(BytesEnd::new(name_tag.as_str())))?;
                emit(writer, Event::End(BytesEnd::new(wpt.as_str())))?;
            }
            None => emit(writer, Event::Empty(start))?,
        }
        emit(writer, Event::Text(BytesText::new("\n  ")))?;
    }
    Ok(())
}
