#![allow(clippy::new_without_default)]

#[macro_use]
extern crate log;
#[macro_use]
extern crate lazy_static;

pub mod config;
pub mod correlator;
pub mod error;
pub mod external_tool;
pub mod logs;
pub mod map_converter;
pub mod photo;
pub mod pipeline;
pub mod segment_merger;
pub mod track;
pub mod utils;
pub mod video_encoder;
pub mod waypoint_importer;

pub use error::{Error, PipelineError, Result};
