use std::{fs, path::PathBuf};

use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

use crate::config::{
    PipelineConfig, RunPaths, TEMP_FRAME_LIST_FILE, TEMP_METADATA_FILE, TEMP_TRACK_FILE,
};
use crate::error::{Error, PipelineError};
use crate::external_tool::CommandRunner;
use crate::track::Track;
use crate::utils::{move_into_dir, remove_if_exists};
use crate::video_encoder::{self, VideoFormat};
use crate::{correlator, map_converter, waypoint_importer};

/// Stages of a run, in the order they execute.
#[derive(Copy, Clone, Debug, Display, EnumIter, PartialEq, Eq, Hash)]
pub enum Stage {
    LoadTrack,
    Correlate,
    ImportWaypoints,
    Merge,
    SerializeTrack,
    ConvertToMap,
    EncodeVideos,
    PlaceOutputs,
    CleanupTemp,
}

#[derive(Debug, Default)]
pub struct RunReport {
    /// Camera photos found in the input directory.
    pub photos_found: usize,
    pub photos_discarded: usize,
    pub waypoints_added: usize,
    /// Final location of every photo moved to the output directory.
    pub photos_placed: Vec<PathBuf>,
    /// Annotated track, map and videos, in the order they were produced.
    pub artifacts: Vec<PathBuf>,
    /// Recovered `Error::Placement`s.
    pub placement_errors: Vec<Error>,
}

/// Intermediate files of a run. Whatever is still registered when this is
/// dropped gets removed, so failed runs clean up too.
#[derive(Default)]
struct TempFiles {
    paths: Vec<PathBuf>,
}

impl TempFiles {
    fn register(&mut self, path: PathBuf) -> PathBuf {
        self.paths.push(path.clone());
        path
    }

    fn cleanup(&mut self) {
        for path in self.paths.drain(..) {
            match remove_if_exists(&path) {
                Ok(true) => debug!("removed {}", path.display()),
                Ok(false) => (),
                Err(e) => warn!("cannot remove {}: {}", path.display(), e),
            }
        }
    }
}

impl Drop for TempFiles {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn at(stage: Stage) -> impl FnOnce(Error) -> PipelineError {
    move |e| PipelineError::new(stage, e)
}

pub struct Pipeline<'a> {
    runner: &'a dyn CommandRunner,
    config: PipelineConfig,
    paths: RunPaths,
}

impl<'a> Pipeline<'a> {
    pub fn new(runner: &'a dyn CommandRunner, config: PipelineConfig, paths: RunPaths) -> Self {
        Pipeline {
            runner,
            config,
            paths,
        }
    }

    pub fn paths(&self) -> &RunPaths {
        &self.paths
    }

    /// Runs every stage in order. Stops at the first fatal error; only
    /// placement errors are collected instead.
    pub fn run(&self) -> Result<RunReport, PipelineError> {
        let runner = self.runner;
        let config = &self.config;
        let paths = &self.paths;
        let mut temp_files = TempFiles::default();
        let mut report = RunReport::default();

        info!("{}: {}", Stage::LoadTrack, paths.track_file.display());
        let mut track = Track::parse(&paths.track_file).map_err(at(Stage::LoadTrack))?;

        info!("{}", Stage::Correlate);
        let photos = correlator::correlate(
            runner,
            config,
            &paths.track_file,
            &paths.input_dir,
            &paths.work_dir,
        )
        .map_err(at(Stage::Correlate))?;
        report.photos_found = photos.len();

        info!("{}", Stage::ImportWaypoints);
        let metadata_file = temp_files.register(paths.temp_file(TEMP_METADATA_FILE));
        let outcome =
            waypoint_importer::import_waypoints(runner, config, photos, &metadata_file, &mut track)
                .map_err(at(Stage::ImportWaypoints))?;
        report.waypoints_added = outcome.waypoints_added;
        report.photos_discarded = outcome.unresolved.len();
        info!(
            "{} photo(s) located, {} discarded",
            outcome.resolved.len(),
            outcome.unresolved.len()
        );

        info!("{}", Stage::Merge);
        let segments_before = track.segment_count();
        track.merge_all_segments();
        debug!(
            "{} segment(s) merged into {}",
            segments_before,
            track.segment_count()
        );

        info!("{}", Stage::SerializeTrack);
        let track_copy = temp_files.register(paths.temp_file(TEMP_TRACK_FILE));
        let serialized = track.serialize().map_err(at(Stage::SerializeTrack))?;
        // the annotated track replaces the input track
        fs::write(&track_copy, &serialized)
            .and_then(|()| fs::write(&paths.track_file, &serialized))
            .map_err(|e| PipelineError::new(Stage::SerializeTrack, e.into()))?;
        report.artifacts.push(paths.track_file.clone());

        info!("{}", Stage::ConvertToMap);
        let map_file = paths.artifact("json");
        map_converter::convert_to_map(runner, &config.togeojson, &track_copy, &map_file)
            .map_err(at(Stage::ConvertToMap))?;
        report.artifacts.push(map_file);

        info!("{}", Stage::EncodeVideos);
        let mut frames: Vec<PathBuf> = outcome
            .resolved
            .iter()
            .map(|photo| photo.path.clone())
            .collect();
        frames.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        let frame_list = temp_files.register(paths.temp_file(TEMP_FRAME_LIST_FILE));
        video_encoder::write_frame_list(&frames, config.frame_rate, &frame_list)
            .map_err(at(Stage::EncodeVideos))?;
        for format in VideoFormat::iter() {
            let video = paths.artifact(format.extension());
            video_encoder::encode(runner, config, format, frames.len(), &frame_list, &video)
                .map_err(at(Stage::EncodeVideos))?;
            report.artifacts.push(video);
        }

        info!("{}", Stage::PlaceOutputs);
        for frame in frames {
            match move_into_dir(&frame, &paths.output_dir) {
                Ok(target) => report.photos_placed.push(target),
                Err(source) => {
                    let e = Error::Placement {
                        path: frame,
                        source,
                    };
                    warn!("{}", e);
                    report.placement_errors.push(e);
                }
            }
        }

        info!("{}", Stage::CleanupTemp);
        temp_files.cleanup();

        info!(
            "done: {} waypoint(s) added, {} photo(s) placed, {} placement error(s)",
            report.waypoints_added,
            report.photos_placed.len(),
            report.placement_errors.len()
        );
        Ok(report)
    }
}
