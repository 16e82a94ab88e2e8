#![allow(clippy::collapsible_if)]
pub mod encoder;
pub mod ffmpeg;
pub mod hls;
pub mod manifest;
pub mod pipeline;
pub mod profile;
pub mod rendition;
pub mod thumbnail;

#[cfg(test)]
mod testing;

use std::path::PathBuf;
use thiserror::Error;

use crate::encoder::Geometry;
use crate::profile::{ProfileError, QualityProfile};

/// Failure reported by an [`encoder::EncoderAdapter`].
#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("failed to start encoder: {0}")]
    Spawn(String),
    #[error("encoder exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("encoder cancelled")]
    Cancelled,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fatal pipeline errors. Any of these fails the whole run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("input not found or unreadable: {0}")]
    InputNotFound(PathBuf),
    #[error("invalid quality profile: {0}")]
    InvalidProfile(#[from] ProfileError),
    #[error("cannot create output directory {path}: {source}")]
    OutputDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("encoding {profile} failed: {message}")]
    EncoderFailure { profile: String, message: String },
    #[error("cannot write master manifest {path}: {source}")]
    ManifestWriteFailure {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("pipeline cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Stage of the run that produced the error.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::InputNotFound(_) => "input",
            Self::InvalidProfile(_) => "profile",
            Self::OutputDirectory { .. } => "output_directory",
            Self::EncoderFailure { .. } => "rendition",
            Self::ManifestWriteFailure { .. } => "manifest",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Non-fatal thumbnail extraction failure.
#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("thumbnail extraction failed: {0}")]
    Failed(String),
    #[error("thumbnail extraction cancelled")]
    Cancelled,
}

/// Pipeline configuration shared by every run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub ffmpeg_path: PathBuf,
    /// Rendition ladder, ascending by bitrate.
    pub profiles: Vec<QualityProfile>,
    pub segment_secs: u32,
    /// Rendition jobs allowed in flight per run. 1 means strictly sequential.
    pub max_parallel_renditions: usize,
    pub thumbnail_timestamp_secs: f64,
    pub thumbnail_size: Geometry,
    pub thumbnail_file_name: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            profiles: profile::default_ladder(),
            segment_secs: 10,
            max_parallel_renditions: 1,
            thumbnail_timestamp_secs: thumbnail::DEFAULT_TIMESTAMP_SECS,
            thumbnail_size: thumbnail::THUMBNAIL_SIZE,
            thumbnail_file_name: "thumbnail.jpg".to_string(),
        }
    }
}
