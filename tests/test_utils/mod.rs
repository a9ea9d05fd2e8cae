#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use phototrack::external_tool::{CommandRunner, ToolOutput};
use phototrack::track::Track;
use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const TWO_SEGMENTS_GPX: &str = "./tests/data/two_segments.gpx";
pub const OUT_OF_ORDER_GPX: &str = "./tests/data/out_of_order.gpx";
pub const HEART_RATE_GPX: &str = "./tests/data/heart_rate.gpx";
pub const GPX10_SPEED_GPX: &str = "./tests/data/gpx10_speed.gpx";

pub fn at(hour: u32, min: u32, sec: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2014, 6, 2, hour, min, sec).unwrap()
}

/// Stands in for exiftool, ffmpeg and togeojson.
///
/// Photos are "taken" at the times given in `photo_times` (what the real
/// engine would read from the file modification date) and located with
/// `Track::locate`.
#[derive(Default)]
pub struct FakeRunner {
    pub photo_times: HashMap<String, DateTime<Utc>>,
    pub fail: Vec<&'static str>,
    /// Replaces the generated GeoJSON when set.
    pub map_output: Option<&'static str>,
    pub calls: RefCell<Vec<(String, Vec<String>)>>,
    tags: RefCell<HashMap<String, (f64, f64)>>,
}

impl FakeRunner {
    pub fn new(photo_times: &[(&str, DateTime<Utc>)]) -> Self {
        FakeRunner {
            photo_times: photo_times
                .iter()
                .map(|(name, time)| (name.to_string(), *time))
                .collect(),
            ..Default::default()
        }
    }

    pub fn failing(mut self, program: &'static str) -> Self {
        self.fail.push(program);
        self
    }

    pub fn with_map_output(mut self, output: &'static str) -> Self {
        self.map_output = Some(output);
        self
    }

    pub fn calls_to(&self, program: &str) -> Vec<Vec<String>> {
        self.calls
            .borrow()
            .iter()
            .filter(|(p, _)| p == program)
            .map(|(_, args)| args.clone())
            .collect()
    }

    fn geotag(&self, args: &[String]) -> io::Result<ToolOutput> {
        let track = Track::parse(&args[1]).map_err(io::Error::other)?;
        let out = args.iter().position(|a| a == "-o").unwrap();
        let out_dir = PathBuf::from(&args[out + 1]);
        for photo in &args[out + 2..] {
            let name = file_name(photo);
            fs::copy(photo, out_dir.join(&name))?;
            let position = self
                .photo_times
                .get(&name)
                .and_then(|time| track.locate(*time));
            if let Some(position) = position {
                self.tags.borrow_mut().insert(name, position);
            }
        }
        Ok(success(Vec::new()))
    }

    fn read_tags(&self, args: &[String]) -> io::Result<ToolOutput> {
        let json = args.iter().position(|a| a == "-json").unwrap();
        let records: Vec<String> = args[json + 1..]
            .iter()
            .map(|photo| match self.tags.borrow().get(&file_name(photo)) {
                Some((lat, lon)) => format!(
                    "{{\n  \"SourceFile\": \"{photo}\",\n  \"GPSLatitude\": \"{lat:+.6}\",\n  \"GPSLongitude\": \"{lon:+.6}\"\n}}"
                ),
                None => format!("{{\n  \"SourceFile\": \"{photo}\"\n}}"),
            })
            .collect();
        Ok(success(format!("[{}]\n", records.join(",\n")).into_bytes()))
    }

    fn to_geojson(&self, args: &[String]) -> io::Result<ToolOutput> {
        if let Some(output) = self.map_output {
            return Ok(success(output.as_bytes().to_vec()));
        }
        let track = Track::parse(&args[0]).map_err(io::Error::other)?;
        let mut features = Vec::new();
        for segment in track.segments() {
            let coords: Vec<String> = segment
                .track_points
                .iter()
                .map(|p| format!("[{}, {}]", p.longitude, p.latitude))
                .collect();
            features.push(format!(
                "{{\"type\": \"Feature\",\n\n\"geometry\": {{\"type\": \"LineString\", \"coordinates\": [{}]}}}}",
                coords.join(", ")
            ));
        }
        for waypoint in track.waypoints() {
            features.push(format!(
                "{{\"type\": \"Feature\",\n\"geometry\": {{\"type\": \"Point\", \"coordinates\": [{}, {}]}}}}",
                waypoint.longitude, waypoint.latitude
            ));
        }
        let document = format!(
            "{{\n  \"type\": \"FeatureCollection\",\n\n  \"features\": [\n{}\n  ]\n}}\n\n",
            features.join(",\n")
        );
        Ok(success(document.into_bytes()))
    }

    fn encode(&self, args: &[String]) -> io::Result<ToolOutput> {
        let input = args.iter().position(|a| a == "-i").unwrap();
        let list = fs::read_to_string(&args[input + 1])?;
        let frames = list.lines().filter(|l| l.starts_with("file ")).count();
        if frames == 0 {
            return Ok(ToolOutput {
                code: Some(1),
                stdout: Vec::new(),
            });
        }
        fs::write(args.last().unwrap(), format!("{frames} frames"))?;
        Ok(success(Vec::new()))
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, program: &str, args: &[OsString]) -> io::Result<ToolOutput> {
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        self.calls
            .borrow_mut()
            .push((program.to_string(), args.clone()));
        if self.fail.contains(&program) {
            return Ok(ToolOutput {
                code: Some(1),
                stdout: Vec::new(),
            });
        }
        match program {
            "exiftool" if args.contains(&"-geotag".to_string()) => self.geotag(&args),
            "exiftool" => self.read_tags(&args),
            "togeojson" => self.to_geojson(&args),
            "ffmpeg" => self.encode(&args),
            _ => Err(io::Error::new(io::ErrorKind::NotFound, program.to_string())),
        }
    }
}

fn success(stdout: Vec<u8>) -> ToolOutput {
    ToolOutput {
        code: Some(0),
        stdout,
    }
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .unwrap()
        .to_string_lossy()
        .into_owned()
}

/// Creates `dir` with one small fake JPEG per name.
pub fn write_photos(dir: &Path, names: &[&str]) {
    fs::create_dir_all(dir).unwrap();
    for name in names {
        fs::write(dir.join(name), format!("jpeg {name}")).unwrap();
    }
}
