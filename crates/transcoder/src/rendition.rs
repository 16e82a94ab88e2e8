//! One rendition job: one profile in, one variant playlist out.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::encoder::{EncodeRequest, EncoderAdapter};
use crate::profile::QualityProfile;
use crate::{EncoderError, PipelineError};

/// A completed rendition, as listed in the master manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenditionDescriptor {
    pub name: String,
    /// Playlist file name relative to the master manifest.
    #[serde(rename = "file")]
    pub playlist_file_name: String,
    #[serde(rename = "bandwidth")]
    pub bandwidth_bps: u64,
    pub resolution: String,
}

/// Encode `input` at `profile` into `{base_name}_{profile}.m3u8` under
/// `output_dir`. Segments are named by the encoder and are not cleaned up
/// here on failure.
pub async fn encode_rendition(
    encoder: &dyn EncoderAdapter,
    input: &Path,
    output_dir: &Path,
    base_name: &str,
    profile: &QualityProfile,
    segment_secs: u32,
    cancel: &CancellationToken,
) -> Result<RenditionDescriptor, PipelineError> {
    let bandwidth_bps = profile.bandwidth_bps()?;
    let playlist_file_name = profile.playlist_file_name(base_name);
    let output_playlist = output_dir.join(&playlist_file_name);

    info!(profile = %profile.name, output = %output_playlist.display(), "rendition starting");

    let request = EncodeRequest {
        input,
        output_playlist: &output_playlist,
        geometry: profile.geometry(),
        video_bitrate: &profile.video_bitrate,
        audio_bitrate: &profile.audio_bitrate,
        segment_secs,
        list_all_segments: true,
    };

    match encoder.encode(&request, cancel).await {
        Ok(()) => {}
        Err(EncoderError::Cancelled) => return Err(PipelineError::Cancelled),
        Err(e) => {
            warn!(profile = %profile.name, error = %e, "rendition failed");
            return Err(PipelineError::EncoderFailure {
                profile: profile.name.clone(),
                message: e.to_string(),
            });
        }
    }

    // The master manifest must never point at a playlist that is not on disk.
    if !tokio::fs::try_exists(&output_playlist).await.unwrap_or(false) {
        return Err(PipelineError::EncoderFailure {
            profile: profile.name.clone(),
            message: format!(
                "{} reported success but {} was not written",
                encoder.name(),
                output_playlist.display()
            ),
        });
    }

    info!(profile = %profile.name, "rendition completed");
    Ok(RenditionDescriptor {
        name: profile.name.clone(),
        playlist_file_name,
        bandwidth_bps,
        resolution: profile.resolution(),
    })
}
