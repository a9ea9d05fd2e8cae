use std::{
    fs,
    path::{Path, PathBuf},
};

use regex::Regex;

use crate::error::{Error, Result};

/// GoPro stills are named `GOPR0001.JPG`, `G0010002.JPG` and so on.
pub const DEFAULT_PHOTO_PATTERN: &str = r"^G.*\.JPG$";

/// Decides which files in the input directory count as camera photos.
#[derive(Clone, Debug)]
pub struct PhotoMatcher {
    regex: Regex,
}

impl PhotoMatcher {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| Error::Validation(format!("bad photo pattern `{pattern}`: {e}")))?;
        Ok(PhotoMatcher { regex })
    }

    pub fn is_match(&self, file_name: &str) -> bool {
        self.regex.is_match(file_name)
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl Default for PhotoMatcher {
    fn default() -> Self {
        lazy_static! {
            static ref DEFAULT_REGEX: Regex = Regex::new(DEFAULT_PHOTO_PATTERN).unwrap();
        }
        PhotoMatcher {
            regex: DEFAULT_REGEX.clone(),
        }
    }
}

/// A photo moving through the pipeline, identified by where its file
/// currently lives.
#[derive(Clone, Debug, PartialEq)]
pub struct PhotoRecord {
    pub path: PathBuf,
    /// `(latitude, longitude)` once the geotag has been read back.
    pub position: Option<(f64, f64)>,
}

impl PhotoRecord {
    pub fn new(path: PathBuf) -> Self {
        PhotoRecord {
            path,
            position: None,
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }

    pub fn is_resolved(&self) -> bool {
        self.position.is_some()
    }
}

/// Regular files directly under `dir` whose names match, sorted by file name
/// so frame order is stable.
pub fn discover_photos(dir: &Path, matcher: &PhotoMatcher) -> Result<Vec<PathBuf>> {
    let mut photos = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        match file_name.to_str() {
            Some(name) if matcher.is_match(name) => photos.push(entry.path()),
            Some(_) => (),
            None => warn!("skipping file with non UTF-8 name: {:?}", file_name),
        }
    }
    photos.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(photos)
}
