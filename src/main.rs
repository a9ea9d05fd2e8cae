use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};

use phototrack::{
    config::{FrameSize, PipelineConfig, RunPaths},
    external_tool::SystemRunner,
    logs,
    photo::{PhotoMatcher, DEFAULT_PHOTO_PATTERN},
    pipeline::Pipeline,
    Error,
};

/// Geotags images from a gpx file, adds those tags back to the gpx file as
/// waypoints, renders the images as videos, then moves the edited images to
/// a destination.
#[derive(Parser, Debug)]
#[command(name = "phototrack", version, about)]
struct Args {
    /// Path to the gpx file to get geotagging data from.
    #[arg(value_name = "GPXFILE")]
    track_file: PathBuf,

    /// Directory containing the unedited photos.
    #[arg(value_name = "INPUTDIR")]
    input_dir: PathBuf,

    /// Where the edited photos are moved to.
    #[arg(value_name = "OUTPUTDIR")]
    output_dir: PathBuf,

    /// Where editing is done and the track, map and videos are written.
    #[arg(value_name = "WORKDIR", default_value = ".")]
    work_dir: PathBuf,

    /// Regex a file name must match to be treated as a camera photo.
    #[arg(long, default_value = DEFAULT_PHOTO_PATTERN)]
    photo_pattern: String,

    #[arg(long, default_value_t = 5)]
    frame_rate: u32,

    /// Video frame size as WIDTHxHEIGHT.
    #[arg(long, default_value = "920x690")]
    frame_size: String,

    /// Seconds the geotagger may extrapolate past either end of the track.
    #[arg(long, default_value_t = 0)]
    max_extrapolation_secs: u32,

    #[arg(long, default_value = "exiftool")]
    exiftool: String,

    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: String,

    #[arg(long, default_value = "togeojson")]
    togeojson: String,

    /// Also write rotating log files here.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

impl Args {
    fn into_run(self) -> Result<(PipelineConfig, RunPaths), Error> {
        let config = PipelineConfig {
            exiftool: self.exiftool,
            ffmpeg: self.ffmpeg,
            togeojson: self.togeojson,
            photo_matcher: PhotoMatcher::new(&self.photo_pattern)?,
            frame_rate: self.frame_rate,
            frame_size: self.frame_size.parse::<FrameSize>()?,
            max_extrapolation_secs: self.max_extrapolation_secs,
        };
        config.validate()?;
        let paths = RunPaths::new(
            self.track_file,
            self.input_dir,
            self.output_dir,
            self.work_dir,
        )?;
        Ok((config, paths))
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = logs::init(args.log_dir.as_deref(), args.verbose) {
        eprintln!("cannot initialize logging: {e:?}");
        return ExitCode::FAILURE;
    }

    let (config, paths) = match args.into_run() {
        Ok(run) => run,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(2);
        }
    };

    match run(config, paths) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: PipelineConfig, paths: RunPaths) -> Result<()> {
    let runner = SystemRunner;
    let pipeline = Pipeline::new(&runner, config, paths);
    let report = pipeline
        .run()
        .with_context(|| format!("processing {}", pipeline.paths().track_file.display()))?;
    for artifact in &report.artifacts {
        info!("wrote {}", artifact.display());
    }
    for e in &report.placement_errors {
        warn!("{e}");
    }
    Ok(())
}
