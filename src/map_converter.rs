use std::{ffi::OsString, fs, path::Path};

use crate::error::{Error, Result};
use crate::external_tool::{run_checked, CommandRunner};

/// Converts `track_file` to GeoJSON with the external converter and writes
/// the compacted result to `map_file`.
pub fn convert_to_map(
    runner: &dyn CommandRunner,
    togeojson: &str,
    track_file: &Path,
    map_file: &Path,
) -> Result<()> {
    let track_file = fs::canonicalize(track_file)?;
    let args: Vec<OsString> = vec![track_file.into_os_string()];
    let stdout = run_checked(runner, togeojson, &args)?;
    let text = String::from_utf8(stdout)
        .map_err(|_| Error::external_tool(togeojson, "output is not UTF-8"))?;

    let document = strip_blank_lines(&text);
    serde_json::from_str::<serde_json::Value>(&document)
        .map_err(|e| Error::external_tool(togeojson, format!("output is not JSON: {e}")))?;
    fs::write(map_file, document)?;
    Ok(())
}

/// Trims every line and drops the empty ones, leaving a single-line document.
pub fn strip_blank_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}
