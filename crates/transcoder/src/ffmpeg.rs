//! [`EncoderAdapter`] backed by the `ffmpeg` binary.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::EncoderError;
use crate::encoder::{EncodeRequest, EncoderAdapter, FrameRequest};

/// Lines of ffmpeg stderr kept in failure diagnostics.
const STDERR_TAIL_LINES: usize = 20;

pub struct FfmpegEncoder {
    ffmpeg_path: PathBuf,
}

impl FfmpegEncoder {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    async fn run(&self, args: Vec<String>, cancel: &CancellationToken) -> Result<(), EncoderError> {
        if cancel.is_cancelled() {
            return Err(EncoderError::Cancelled);
        }

        // kill_on_drop: if the cancel branch wins, dropping the wait future
        // takes the child down with it.
        let child = tokio::process::Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                EncoderError::Spawn(format!("{}: {e}", self.ffmpeg_path.display()))
            })?;

        debug!(ffmpeg_path = ?self.ffmpeg_path, ?args, "spawned ffmpeg");

        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EncoderError::Cancelled),
            output = child.wait_with_output() => output?,
        };

        if output.status.success() {
            Ok(())
        } else {
            Err(EncoderError::Failed {
                status: output.status.to_string(),
                stderr: stderr_tail(&output.stderr),
            })
        }
    }
}

#[async_trait::async_trait]
impl EncoderAdapter for FfmpegEncoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn encode(
        &self,
        request: &EncodeRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), EncoderError> {
        info!(
            output = %request.output_playlist.display(),
            geometry = %request.geometry,
            video_bitrate = request.video_bitrate,
            "ffmpeg HLS encode starting"
        );
        self.run(build_encode_args(request), cancel).await
    }

    async fn extract_frame(
        &self,
        request: &FrameRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), EncoderError> {
        self.run(build_frame_args(request), cancel).await
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// H.264 baseline / AAC HLS output, compatible with every HLS client.
pub fn build_encode_args(request: &EncodeRequest<'_>) -> Vec<String> {
    let mut args: Vec<String> = vec!["-hide_banner".into(), "-y".into()];

    args.extend(["-i".into(), path_arg(request.input)]);

    args.extend([
        "-c:v".into(),
        "libx264".into(),
        "-profile:v".into(),
        "baseline".into(),
        "-level".into(),
        "3.0".into(),
        "-s".into(),
        request.geometry.to_string(),
        "-b:v".into(),
        request.video_bitrate.to_string(),
    ]);

    args.extend([
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        request.audio_bitrate.to_string(),
    ]);

    args.extend([
        "-start_number".into(),
        "0".into(),
        "-hls_time".into(),
        request.segment_secs.to_string(),
    ]);

    if request.list_all_segments {
        args.extend([
            "-hls_list_size".into(),
            "0".into(),
            "-hls_playlist_type".into(),
            "vod".into(),
        ]);
    } else {
        args.extend(["-hls_list_size".into(), "6".into()]);
    }

    args.extend([
        "-f".into(),
        "hls".into(),
        path_arg(request.output_playlist),
    ]);

    args
}

/// Seek, grab one frame, scale it.
pub fn build_frame_args(request: &FrameRequest<'_>) -> Vec<String> {
    vec![
        "-hide_banner".into(),
        "-y".into(),
        "-ss".into(),
        format!("{:.3}", request.timestamp_secs),
        "-i".into(),
        path_arg(request.input),
        "-frames:v".into(),
        "1".into(),
        "-vf".into(),
        format!("scale={}:{}", request.size.width, request.size.height),
        path_arg(request.output_image),
    ]
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
