//! Adaptive pipeline orchestration.
//!
//! A run encodes every profile of the ladder, publishes the master playlist
//! only once all of them are on disk, then tries for a thumbnail. Renditions
//! are all-or-nothing: the first failure cancels whatever is still encoding
//! and no master playlist is written.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use futures::StreamExt;
use regex::Regex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::encoder::EncoderAdapter;
use crate::rendition::{RenditionDescriptor, encode_rendition};
use crate::{PipelineConfig, PipelineError, manifest, profile, thumbnail};

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]+").unwrap());

/// Longest base name kept. Leaves room under the 255-byte file name limit
/// for rendition suffixes, segment numbers and the server's temp prefix.
pub const MAX_BASE_NAME_LEN: usize = 180;

/// Base name used for every file of a run, derived from the uploaded file
/// name: last path component, extension dropped, unsafe characters replaced,
/// capped at [`MAX_BASE_NAME_LEN`] bytes.
pub fn derive_base_name(original_file_name: &str) -> String {
    let last = original_file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_file_name);
    let stem = Path::new(last)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("");
    let safe = UNSAFE_FILENAME_CHARS.replace_all(stem, "_");
    let safe = safe.trim_start_matches('.');
    // Only ASCII survives the replacement, so any byte index is a char boundary.
    let safe = &safe[..safe.len().min(MAX_BASE_NAME_LEN)];
    if safe.is_empty() {
        "video".to_string()
    } else {
        safe.to_string()
    }
}

/// `{base_name}_master.m3u8`
pub fn master_file_name(base_name: &str) -> String {
    format!("{base_name}_master.m3u8")
}

/// Remove a run's output directory. Missing directories are not an error.
pub async fn cleanup_output_dir(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => info!(dir = %dir.display(), "cleaned up output directory"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(dir = %dir.display(), error = %e, "failed to clean up output directory"),
    }
}

/// A published adaptive package.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutput {
    pub success: bool,
    pub manifest_path: PathBuf,
    pub output_directory: PathBuf,
    pub master_file_name: String,
    pub base_name: String,
    pub renditions: Vec<RenditionDescriptor>,
    /// Absent when thumbnail extraction failed.
    pub thumbnail: Option<PathBuf>,
}

/// A failed run. The output directory is left in place for the caller to
/// reclaim.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct PipelineFailure {
    pub error: PipelineError,
    pub output_directory: PathBuf,
}

impl PipelineFailure {
    pub fn message(&self) -> String {
        self.error.to_string()
    }

    /// Name of the profile whose rendition failed, if that is what failed.
    pub fn failed_profile(&self) -> Option<&str> {
        match &self.error {
            PipelineError::EncoderFailure { profile, .. } => Some(profile),
            _ => None,
        }
    }
}

pub struct Pipeline {
    encoder: Arc<dyn EncoderAdapter>,
    config: PipelineConfig,
}

impl Pipeline {
    /// Build a pipeline, rejecting a ladder that is empty or not strictly
    /// ascending by bitrate.
    pub fn new(
        encoder: Arc<dyn EncoderAdapter>,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        profile::validate_ladder(&config.profiles)?;
        Ok(Self { encoder, config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn run_adaptive_pipeline(
        &self,
        input: &Path,
        output_dir: &Path,
        original_file_name: &str,
    ) -> Result<PipelineOutput, PipelineFailure> {
        self.run_with_cancel(input, output_dir, original_file_name, CancellationToken::new())
            .await
    }

    /// Like [`Pipeline::run_adaptive_pipeline`], stopping in-flight encodes
    /// when `cancel` fires.
    pub async fn run_with_cancel(
        &self,
        input: &Path,
        output_dir: &Path,
        original_file_name: &str,
        cancel: CancellationToken,
    ) -> Result<PipelineOutput, PipelineFailure> {
        self.run(input, output_dir, original_file_name, cancel)
            .await
            .map_err(|error| PipelineFailure {
                error,
                output_directory: output_dir.to_path_buf(),
            })
    }

    async fn run(
        &self,
        input: &Path,
        output_dir: &Path,
        original_file_name: &str,
        cancel: CancellationToken,
    ) -> Result<PipelineOutput, PipelineError> {
        let base_name = derive_base_name(original_file_name);
        let master_file_name = master_file_name(&base_name);
        let manifest_path = output_dir.join(&master_file_name);

        match tokio::fs::metadata(input).await {
            Ok(meta) if meta.is_file() => {}
            _ => return Err(PipelineError::InputNotFound(input.to_path_buf())),
        }

        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|source| PipelineError::OutputDirectory {
                path: output_dir.to_path_buf(),
                source,
            })?;

        info!(
            input = %input.display(),
            output_dir = %output_dir.display(),
            base_name = %base_name,
            profiles = self.config.profiles.len(),
            "adaptive pipeline starting"
        );

        let renditions = self
            .encode_all(input, output_dir, &base_name, &cancel)
            .await?;

        // Every listed playlist exists at this point.
        manifest::compose_master_manifest(&manifest_path, &renditions)
            .await
            .map_err(|source| PipelineError::ManifestWriteFailure {
                path: manifest_path.clone(),
                source,
            })?;

        let thumbnail_path = output_dir.join(&self.config.thumbnail_file_name);
        let thumbnail = match thumbnail::extract_thumbnail(
            &*self.encoder,
            input,
            &thumbnail_path,
            self.config.thumbnail_timestamp_secs,
            self.config.thumbnail_size,
            &cancel,
        )
        .await
        {
            Ok(()) => Some(thumbnail_path),
            Err(e) => {
                warn!(error = %e, "thumbnail generation failed, continuing without it");
                None
            }
        };

        info!(
            manifest = %manifest_path.display(),
            renditions = renditions.len(),
            thumbnail = thumbnail.is_some(),
            "adaptive pipeline completed"
        );

        Ok(PipelineOutput {
            success: true,
            manifest_path,
            output_directory: output_dir.to_path_buf(),
            master_file_name,
            base_name,
            renditions,
            thumbnail,
        })
    }

    /// Run one rendition job per profile with at most
    /// `max_parallel_renditions` in flight. Descriptors come back in ladder
    /// order regardless of completion order.
    async fn encode_all(
        &self,
        input: &Path,
        output_dir: &Path,
        base_name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<RenditionDescriptor>, PipelineError> {
        let profiles = &self.config.profiles;
        let limit = self.config.max_parallel_renditions.max(1);
        let segment_secs = self.config.segment_secs;
        let encoder = &*self.encoder;
        let jobs_cancel = cancel.child_token();
        let token = &jobs_cancel;

        let jobs: Vec<_> = profiles
            .iter()
            .enumerate()
            .map(|(idx, profile)| async move {
                let result = encode_rendition(
                    encoder,
                    input,
                    output_dir,
                    base_name,
                    profile,
                    segment_secs,
                    token,
                )
                .await;
                (idx, result)
            })
            .collect();
        let jobs = futures::stream::iter(jobs).buffer_unordered(limit);
        let mut jobs = std::pin::pin!(jobs);

        let mut completed: Vec<Option<RenditionDescriptor>> = vec![None; profiles.len()];
        while let Some((idx, result)) = jobs.next().await {
            match result {
                Ok(descriptor) => completed[idx] = Some(descriptor),
                Err(e) => {
                    // Stop sibling encodes; dropping the stream kills any
                    // encoder process still running.
                    jobs_cancel.cancel();
                    warn!(error = %e, "rendition failed, aborting remaining profiles");
                    return Err(e);
                }
            }
        }

        Ok(completed.into_iter().flatten().collect())
    }
}
