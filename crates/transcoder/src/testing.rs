//! Scripted encoder used by the unit tests.

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::EncoderError;
use crate::encoder::{EncodeRequest, EncoderAdapter, FrameRequest};

#[derive(Debug, Clone)]
pub struct RecordedEncode {
    pub profile: String,
    pub geometry: String,
    pub video_bitrate: String,
    pub segment_secs: u32,
    pub list_all_segments: bool,
}

/// Writes plausible playlists and segments without running a real encoder.
/// Profiles are recognised from the `_{profile}.m3u8` suffix of the output.
#[derive(Default)]
pub struct ScriptedEncoder {
    fail_profiles: Vec<String>,
    silent_profiles: Vec<String>,
    delays: Vec<(String, Duration)>,
    fail_thumbnail: bool,
    encodes: Mutex<Vec<RecordedEncode>>,
    frames: Mutex<Vec<(f64, String)>>,
    master_seen_early: AtomicBool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedEncoder {
    pub fn failing_profile(mut self, profile: &str) -> Self {
        self.fail_profiles.push(profile.to_string());
        self
    }

    /// Report success without writing the playlist.
    pub fn silent_profile(mut self, profile: &str) -> Self {
        self.silent_profiles.push(profile.to_string());
        self
    }

    pub fn slow_profile(mut self, profile: &str, delay: Duration) -> Self {
        self.delays.push((profile.to_string(), delay));
        self
    }

    pub fn failing_thumbnail(mut self) -> Self {
        self.fail_thumbnail = true;
        self
    }

    pub fn encode_requests(&self) -> Vec<RecordedEncode> {
        self.encodes.lock().unwrap().clone()
    }

    pub fn encoded_profiles(&self) -> Vec<String> {
        self.encode_requests().into_iter().map(|r| r.profile).collect()
    }

    pub fn frame_requests(&self) -> Vec<(f64, String)> {
        self.frames.lock().unwrap().clone()
    }

    /// Whether any encode finished while a master playlist already existed.
    pub fn master_seen_early(&self) -> bool {
        self.master_seen_early.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn run_encode(
        &self,
        profile: &str,
        request: &EncodeRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), EncoderError> {
        if let Some((_, delay)) = self.delays.iter().find(|(p, _)| p == profile) {
            tokio::select! {
                _ = cancel.cancelled() => return Err(EncoderError::Cancelled),
                _ = tokio::time::sleep(*delay) => {}
            }
        }

        let dir = request.output_playlist.parent().unwrap_or(Path::new("."));
        if master_exists(dir) {
            self.master_seen_early.store(true, Ordering::SeqCst);
        }

        if self.fail_profiles.iter().any(|p| p == profile) {
            return Err(EncoderError::Failed {
                status: "exit status: 1".into(),
                stderr: format!("scripted failure for {profile}"),
            });
        }
        if self.silent_profiles.iter().any(|p| p == profile) {
            return Ok(());
        }

        let stem = request
            .output_playlist
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("out");
        let segment = format!("{stem}0.ts");
        tokio::fs::write(dir.join(&segment), b"segment").await?;
        let playlist = format!(
            "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:{}\n#EXT-X-PLAYLIST-TYPE:VOD\n#EXTINF:{}.0,\n{segment}\n#EXT-X-ENDLIST\n",
            request.segment_secs, request.segment_secs
        );
        tokio::fs::write(request.output_playlist, playlist).await?;
        Ok(())
    }
}

fn master_exists(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .any(|e| e.file_name().to_string_lossy().ends_with("_master.m3u8"))
        })
        .unwrap_or(false)
}

fn profile_of(output_playlist: &Path) -> String {
    output_playlist
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.rsplit_once('_'))
        .map(|(_, p)| p.to_string())
        .unwrap_or_default()
}

#[async_trait::async_trait]
impl EncoderAdapter for ScriptedEncoder {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn encode(
        &self,
        request: &EncodeRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), EncoderError> {
        let profile = profile_of(request.output_playlist);
        self.encodes.lock().unwrap().push(RecordedEncode {
            profile: profile.clone(),
            geometry: request.geometry.to_string(),
            video_bitrate: request.video_bitrate.to_string(),
            segment_secs: request.segment_secs,
            list_all_segments: request.list_all_segments,
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let result = self.run_encode(&profile, request, cancel).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn extract_frame(
        &self,
        request: &FrameRequest<'_>,
        _cancel: &CancellationToken,
    ) -> Result<(), EncoderError> {
        self.frames
            .lock()
            .unwrap()
            .push((request.timestamp_secs, request.size.to_string()));
        if self.fail_thumbnail {
            // Like ffmpeg dying mid-write: a truncated JPEG is left behind.
            tokio::fs::write(request.output_image, b"\xFF").await?;
            return Err(EncoderError::Failed {
                status: "exit status: 1".into(),
                stderr: "Output file is empty, nothing was encoded".into(),
            });
        }
        tokio::fs::write(request.output_image, b"\xFF\xD8\xFF").await?;
        Ok(())
    }
}
