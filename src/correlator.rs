use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::external_tool::{run_checked, CommandRunner};
use crate::photo::{discover_photos, PhotoRecord};

/// Stamps coordinates onto copies of the camera photos, by matching each
/// photo's modification time against the track. The copies land in
/// `work_dir`; the originals are left alone.
pub fn correlate(
    runner: &dyn CommandRunner,
    config: &PipelineConfig,
    track_file: &Path,
    input_dir: &Path,
    work_dir: &Path,
) -> Result<Vec<PhotoRecord>> {
    let photos = discover_photos(input_dir, &config.photo_matcher)?;
    if photos.is_empty() {
        warn!(
            "no photo in {} matches `{}`",
            input_dir.display(),
            config.photo_matcher.as_str()
        );
        return Ok(Vec::new());
    }
    info!("geotagging {} photo(s)", photos.len());

    let mut records = Vec::with_capacity(photos.len());
    for photo in &photos {
        let copy = tagged_copy_path(photo, work_dir);
        // the engine refuses to overwrite, a previous run may have left one
        if copy.exists() {
            debug!("removing stale copy {}", copy.display());
            fs::remove_file(&copy)?;
        }
        records.push(PhotoRecord::new(copy));
    }

    let args = write_mode_args(config, track_file, work_dir, &photos);
    run_checked(runner, &config.exiftool, &args)?;
    Ok(records)
}

fn tagged_copy_path(photo: &Path, work_dir: &Path) -> PathBuf {
    match photo.file_name() {
        Some(name) => work_dir.join(name),
        None => work_dir.to_path_buf(),
    }
}

pub fn write_mode_args(
    config: &PipelineConfig,
    track_file: &Path,
    work_dir: &Path,
    photos: &[PathBuf],
) -> Vec<OsString> {
    // a trailing separator makes the engine treat `-o` as a directory
    let mut out_dir = work_dir.as_os_str().to_owned();
    out_dir.push(std::path::MAIN_SEPARATOR_STR);

    let mut args: Vec<OsString> = vec![
        "-geotag".into(),
        track_file.as_os_str().to_owned(),
        "-geotime<FileModifyDate".into(),
        "-api".into(),
        format!("GeoMaxExtSecs={}", config.max_extrapolation_secs).into(),
        "-P".into(),
        "-o".into(),
        out_dir,
    ];
    args.extend(photos.iter().map(|photo| photo.as_os_str().to_owned()));
    args
}
