use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use strum_macros::EnumIter;

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::external_tool::{run_checked, CommandRunner};

#[derive(Copy, Clone, Debug, EnumIter, PartialEq, Eq, Hash)]
pub enum VideoFormat {
    Mp4,
    Webm,
}

impl VideoFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            VideoFormat::Mp4 => "mp4",
            VideoFormat::Webm => "webm",
        }
    }

    fn codec_args(&self) -> &'static [&'static str] {
        match self {
            VideoFormat::Mp4 => &[
                "-c:v",
                "libx264",
                "-pix_fmt",
                "yuv420p",
                "-preset",
                "veryslow",
                "-tune",
                "stillimage",
                "-profile:v",
                "baseline",
                "-level",
                "3.0",
                "-movflags",
                "+faststart",
            ],
            VideoFormat::Webm => &["-c:v", "libvpx", "-crf", "10", "-b:v", "4M"],
        }
    }
}

/// Writes `frames` as an ffconcat list where every frame is shown for
/// `1 / frame_rate` seconds.
pub fn write_frame_list(frames: &[PathBuf], frame_rate: u32, list_file: &Path) -> Result<()> {
    let frame_duration = 1.0 / frame_rate as f64;
    let mut list = String::from("ffconcat version 1.0\n");
    for frame in frames {
        let frame = fs::canonicalize(frame)?;
        list.push_str(&format!(
            "file {}\nduration {}\n",
            quote(&frame.to_string_lossy()),
            frame_duration
        ));
    }
    // the demuxer ignores the duration of the last entry unless it is repeated
    if let Some(last) = frames.last() {
        let last = fs::canonicalize(last)?;
        list.push_str(&format!("file {}\n", quote(&last.to_string_lossy())));
    }
    fs::write(list_file, list)?;
    Ok(())
}

fn quote(path: &str) -> String {
    format!("'{}'", path.replace('\'', r"'\''"))
}

pub fn encoder_args(
    config: &PipelineConfig,
    format: VideoFormat,
    list_file: &Path,
    output: &Path,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-y".into(),
        "-f".into(),
        "concat".into(),
        "-safe".into(),
        "0".into(),
        "-i".into(),
        list_file.as_os_str().to_owned(),
        "-r".into(),
        config.frame_rate.to_string().into(),
        "-s".into(),
        config.frame_size.to_string().into(),
    ];
    args.extend(format.codec_args().iter().map(OsString::from));
    args.push(output.as_os_str().to_owned());
    args
}

/// Encodes the frame list at `list_file` into `output`. `frame_count` is
/// checked first since the encoder has nothing to do without frames.
pub fn encode(
    runner: &dyn CommandRunner,
    config: &PipelineConfig,
    format: VideoFormat,
    frame_count: usize,
    list_file: &Path,
    output: &Path,
) -> Result<()> {
    if frame_count == 0 {
        return Err(Error::external_tool(&config.ffmpeg, "no frames to encode"));
    }
    info!(
        "encoding {} frame(s) into {}",
        frame_count,
        output.display()
    );
    run_checked(
        runner,
        &config.ffmpeg,
        &encoder_args(config, format, list_file, output),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{encoder_args, quote, write_frame_list, VideoFormat};
    use crate::config::PipelineConfig;
    use std::fs;
    use std::path::{Path, PathBuf};
    use strum::IntoEnumIterator;
    use tempdir::TempDir;

    #[test]
    fn quoting() {
        assert_eq!(quote("/a/b.JPG"), "'/a/b.JPG'");
        assert_eq!(quote("/it's.JPG"), r"'/it'\''s.JPG'");
    }

    #[test]
    fn frame_list_repeats_last_frame() {
        let temp_dir = TempDir::new("video_encoder-frame_list").unwrap();
        let frames: Vec<PathBuf> = ["G001.JPG", "G002.JPG"]
            .iter()
            .map(|name| {
                let path = temp_dir.path().join(name);
                fs::write(&path, "jpeg").unwrap();
                path
            })
            .collect();
        let list_file = temp_dir.path().join("tmp.ffconcat");
        write_frame_list(&frames, 4, &list_file).unwrap();

        let list = fs::read_to_string(&list_file).unwrap();
        let lines: Vec<&str> = list.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "ffconcat version 1.0");
        assert!(lines[1].starts_with("file '") && lines[1].ends_with("G001.JPG'"));
        assert_eq!(lines[2], "duration 0.25");
        assert!(lines[3].ends_with("G002.JPG'"));
        assert_eq!(lines[4], "duration 0.25");
        assert_eq!(lines[5], lines[3]);
    }

    #[test]
    fn every_format_gets_rate_and_size() {
        let config = PipelineConfig::default();
        for format in VideoFormat::iter() {
            let args: Vec<String> = encoder_args(
                &config,
                format,
                Path::new("list"),
                Path::new(&format!("out.{}", format.extension())),
            )
            .into_iter()
            .map(|a| a.into_string().unwrap())
            .collect();
            let rate = args.iter().position(|a| a == "-r").unwrap();
            assert_eq!(args[rate + 1], "5");
            let size = args.iter().position(|a| a == "-s").unwrap();
            assert_eq!(args[size + 1], "920x690");
            assert_eq!(
                args.last().unwrap(),
                &format!("out.{}", format.extension())
            );
        }
    }
}
