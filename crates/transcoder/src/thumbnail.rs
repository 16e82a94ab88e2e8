//! Best-effort poster frame extraction.

use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::encoder::{EncoderAdapter, FrameRequest, Geometry};
use crate::{EncoderError, ThumbnailError};

pub const DEFAULT_TIMESTAMP_SECS: f64 = 2.0;

/// 16:9 thumbnail.
pub const THUMBNAIL_SIZE: Geometry = Geometry::new(320, 180);

/// Grab the frame at `timestamp_secs` into `output_image`. Sources shorter
/// than the timestamp are left to the encoder to clamp or reject.
pub async fn extract_thumbnail(
    encoder: &dyn EncoderAdapter,
    input: &Path,
    output_image: &Path,
    timestamp_secs: f64,
    size: Geometry,
    cancel: &CancellationToken,
) -> Result<(), ThumbnailError> {
    if let Some(parent) = output_image.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ThumbnailError::Failed(format!("create {}: {e}", parent.display())))?;
    }

    info!(timestamp_secs, output = %output_image.display(), "extracting thumbnail");

    let request = FrameRequest {
        input,
        output_image,
        timestamp_secs,
        size,
    };
    let result = encoder.extract_frame(&request, cancel).await;
    if let Err(e) = result {
        // A half-written image would still be served next to the playlists.
        if let Err(remove_err) = tokio::fs::remove_file(output_image).await {
            if remove_err.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    output = %output_image.display(),
                    error = %remove_err,
                    "failed to remove partial thumbnail"
                );
            }
        }
        return Err(match e {
            EncoderError::Cancelled => ThumbnailError::Cancelled,
            other => ThumbnailError::Failed(other.to_string()),
        });
    }
    Ok(())
}
