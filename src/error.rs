use std::{io, path::PathBuf};

use thiserror::Error;

use crate::pipeline::Stage;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad command line input. Raised before any stage runs.
    #[error("invalid argument: {0}")]
    Validation(String),

    #[error("track file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("malformed track file {}: {reason}", path.display())]
    Format { path: PathBuf, reason: String },

    /// An external process could not be launched, exited non-zero or
    /// produced output we cannot use.
    #[error("`{tool}` failed: {reason}")]
    ExternalTool { tool: String, reason: String },

    /// Recovered locally while moving photos into the output directory.
    #[error("failed to place {}: {source}", path.display())]
    Placement {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub fn external_tool(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::ExternalTool {
            tool: tool.into(),
            reason: reason.into(),
        }
    }
}

/// A fatal error tagged with the pipeline stage it came from.
#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: Error,
}

impl PipelineError {
    pub fn new(stage: Stage, source: Error) -> Self {
        PipelineError { stage, source }
    }
}
