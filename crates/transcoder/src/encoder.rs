//! The seam between the pipeline and the transcoding engine.

use std::path::Path;

use tokio_util::sync::CancellationToken;

use crate::EncoderError;

/// Output frame size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for Geometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One HLS rendition to produce.
#[derive(Debug, Clone)]
pub struct EncodeRequest<'a> {
    pub input: &'a Path,
    /// Playlist to write; segments land next to it.
    pub output_playlist: &'a Path,
    pub geometry: Geometry,
    pub video_bitrate: &'a str,
    pub audio_bitrate: &'a str,
    pub segment_secs: u32,
    /// Emit a complete VOD playlist rather than a sliding live window.
    pub list_all_segments: bool,
}

/// A single still frame to grab.
#[derive(Debug, Clone)]
pub struct FrameRequest<'a> {
    pub input: &'a Path,
    pub output_image: &'a Path,
    pub timestamp_secs: f64,
    pub size: Geometry,
}

/// A transcoding engine capable of producing HLS renditions and still frames.
///
/// Implementations must only return `Ok` once every file they were asked to
/// produce is fully written and closed, and should stop promptly (returning
/// [`EncoderError::Cancelled`]) when `cancel` fires.
#[async_trait::async_trait]
pub trait EncoderAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn encode(
        &self,
        request: &EncodeRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), EncoderError>;

    async fn extract_frame(
        &self,
        request: &FrameRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), EncoderError>;
}
