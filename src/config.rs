use std::{
    ffi::OsStr,
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use crate::error::{Error, Result};
use crate::photo::PhotoMatcher;

/// Temporary merged track handed to the map converter.
pub const TEMP_TRACK_FILE: &str = "tmp.gpx";
/// Temporary dump of the geotagging engine's read-mode output.
pub const TEMP_METADATA_FILE: &str = "tmp.json";
/// Temporary frame list handed to the video encoder.
pub const TEMP_FRAME_LIST_FILE: &str = "tmp.ffconcat";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for FrameSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::Validation(format!("frame size must look like 920x690, got `{s}`"));
        let (width, height) = s.split_once(['x', 'X']).ok_or_else(invalid)?;
        let width: u32 = width.trim().parse().map_err(|_| invalid())?;
        let height: u32 = height.trim().parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(FrameSize { width, height })
    }
}

/// Everything about a run that is not a path.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub exiftool: String,
    pub ffmpeg: String,
    pub togeojson: String,
    pub photo_matcher: PhotoMatcher,
    pub frame_rate: u32,
    pub frame_size: FrameSize,
    /// How far past either end of the track the engine may extrapolate.
    pub max_extrapolation_secs: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            exiftool: "exiftool".to_owned(),
            ffmpeg: "ffmpeg".to_owned(),
            togeojson: "togeojson".to_owned(),
            photo_matcher: PhotoMatcher::default(),
            frame_rate: 5,
            frame_size: FrameSize {
                width: 920,
                height: 690,
            },
            max_extrapolation_secs: 0,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.frame_rate == 0 {
            return Err(Error::Validation("frame rate must be positive".to_owned()));
        }
        Ok(())
    }
}

/// The four locations a run works with, checked up front.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunPaths {
    pub track_file: PathBuf,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub work_dir: PathBuf,
}

impl RunPaths {
    pub fn new(
        track_file: impl Into<PathBuf>,
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        work_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let track_file = track_file.into();
        if !track_file.is_file() || track_file.extension() != Some(OsStr::new("gpx")) {
            return Err(Error::Validation(format!(
                "'{}' is not a gpx file",
                track_file.display()
            )));
        }
        let input_dir = existing_dir(input_dir.into())?;
        let output_dir = existing_dir(output_dir.into())?;
        let work_dir = existing_dir(work_dir.into())?;
        // copies in the working directory are replaced on every run
        for (dir, role) in [(&input_dir, "input"), (&output_dir, "output")] {
            if same_dir(dir, &work_dir)? {
                return Err(Error::Validation(format!(
                    "working directory '{}' must differ from the {} directory",
                    work_dir.display(),
                    role
                )));
            }
        }
        Ok(RunPaths {
            track_file,
            input_dir,
            output_dir,
            work_dir,
        })
    }

    /// Base name of the track file; all artifacts are named after it.
    pub fn basename(&self) -> String {
        self.track_file
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "track".to_owned())
    }

    pub fn artifact(&self, extension: &str) -> PathBuf {
        self.work_dir
            .join(format!("{}.{}", self.basename(), extension))
    }

    pub fn temp_file(&self, name: &str) -> PathBuf {
        self.work_dir.join(name)
    }
}

fn existing_dir(path: PathBuf) -> Result<PathBuf> {
    if !path.is_dir() {
        return Err(Error::Validation(format!(
            "'{}' is not an existing directory",
            path.display()
        )));
    }
    Ok(path)
}

fn same_dir(a: &Path, b: &Path) -> Result<bool> {
    Ok(fs::canonicalize(a)? == fs::canonicalize(b)?)
}
