//! `POST /api/upload`: receive a video, run the adaptive pipeline, report URLs.

use std::path::{Path, PathBuf};

use axum::Json;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use hlsbox_core::error::ApiError;
use hlsbox_core::types::VideoMime;
use hlsbox_transcoder::pipeline::{PipelineOutput, cleanup_output_dir, derive_base_name};
use hlsbox_transcoder::rendition::RenditionDescriptor;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::state::AppState;

/// Multipart field carrying the video.
pub const VIDEO_FIELD: &str = "video";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub data: UploadData,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadData {
    pub file_name: String,
    pub hls_url: String,
    pub manifest_file: String,
    pub thumbnail_url: Option<String>,
    pub size: u64,
    pub output_dir: String,
    pub renditions: Vec<RenditionDescriptor>,
}

/// An upload spooled to the temp directory.
struct SavedUpload {
    path: PathBuf,
    original_name: String,
    size: u64,
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("video exceeds the upload size limit".into())
    } else {
        ApiError::BadRequest(format!("upload error: {}", e.body_text()))
    }
}

pub async fn upload_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let temp_dir = state.config.temp_dir();
    tokio::fs::create_dir_all(&temp_dir)
        .await
        .map_err(|e| ApiError::Internal(format!("create temp dir: {e}")))?;

    let mut saved = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }
        let original_name = field
            .file_name()
            .filter(|n| !n.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| ApiError::BadRequest("video field has no file name".into()))?;
        if field.content_type().and_then(VideoMime::from_mime).is_none() {
            return Err(ApiError::BadRequest(
                "Invalid file type. Only video files are allowed.".into(),
            )
            .into());
        }
        saved = Some(
            spool_field(field, &temp_dir, original_name, state.config.max_upload_bytes).await?,
        );
        break;
    }
    let saved = saved.ok_or_else(|| ApiError::BadRequest("No video file provided".into()))?;

    info!(file = %saved.original_name, size = saved.size, "processing upload");

    // Run on its own task so a client hanging up does not abandon the
    // encoder halfway and leak the temp file or output directory.
    let task_state = state.clone();
    let outcome = tokio::spawn(async move {
        let result = process_upload(&task_state, &saved).await;
        if let Err(e) = tokio::fs::remove_file(&saved.path).await {
            warn!(path = %saved.path.display(), error = %e, "failed to remove temp upload");
        }
        result
    })
    .await
    .map_err(|e| ApiError::Internal(format!("upload task failed: {e}")))?;

    outcome.map(Json).map_err(AppError::from)
}

async fn spool_field(
    mut field: Field<'_>,
    temp_dir: &Path,
    original_name: String,
    max_bytes: usize,
) -> Result<SavedUpload, ApiError> {
    let path = temp_dir.join(temp_file_name(&original_name));
    let mut file = tokio::fs::File::create(&path)
        .await
        .map_err(|e| ApiError::Internal(format!("create temp file: {e}")))?;

    let written = write_chunks(&mut field, &mut file, max_bytes).await;
    drop(file);

    match written {
        Ok(size) => Ok(SavedUpload {
            path,
            original_name,
            size,
        }),
        Err(e) => {
            let _ = tokio::fs::remove_file(&path).await;
            Err(e)
        }
    }
}

async fn write_chunks(
    field: &mut Field<'_>,
    file: &mut tokio::fs::File,
    max_bytes: usize,
) -> Result<u64, ApiError> {
    let mut size: u64 = 0;
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        size += chunk.len() as u64;
        if size > max_bytes as u64 {
            return Err(ApiError::PayloadTooLarge(format!(
                "video exceeds the {max_bytes} byte upload limit"
            )));
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| ApiError::Internal(format!("write temp file: {e}")))?;
    }
    file.flush()
        .await
        .map_err(|e| ApiError::Internal(format!("flush temp file: {e}")))?;
    Ok(size)
}

/// Longer extensions are dropped from temp names rather than kept.
const MAX_EXTENSION_LEN: usize = 10;

/// `{millis}-{uuid}-{base}.{ext}`, unique and free of client-controlled paths.
fn temp_file_name(original_name: &str) -> String {
    let ext = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| {
            !e.is_empty() && e.len() <= MAX_EXTENSION_LEN && e.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();
    format!(
        "{}-{}-{}{}",
        chrono::Utc::now().timestamp_millis(),
        uuid::Uuid::new_v4().simple(),
        derive_base_name(original_name),
        ext
    )
}

/// Claim a fresh directory under the HLS root. A second upload with the same
/// name gets a suffixed directory instead of writing into the first one.
async fn claim_output_dir(hls_root: &Path, base_name: &str) -> Result<(String, PathBuf), ApiError> {
    tokio::fs::create_dir_all(hls_root)
        .await
        .map_err(|e| ApiError::Internal(format!("create hls root: {e}")))?;

    let mut dir_name = base_name.to_string();
    loop {
        let dir = hls_root.join(&dir_name);
        match tokio::fs::create_dir(&dir).await {
            Ok(()) => return Ok((dir_name, dir)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                let suffix = uuid::Uuid::new_v4().simple().to_string();
                dir_name = format!("{base_name}-{}", &suffix[..8]);
            }
            Err(e) => return Err(ApiError::Internal(format!("create output dir: {e}"))),
        }
    }
}

async fn process_upload(state: &AppState, saved: &SavedUpload) -> Result<UploadResponse, ApiError> {
    let base_name = derive_base_name(&saved.original_name);
    let (dir_name, output_dir) = claim_output_dir(&state.config.hls_root(), &base_name).await?;

    let output = match state
        .pipeline
        .run_adaptive_pipeline(&saved.path, &output_dir, &saved.original_name)
        .await
    {
        Ok(output) => output,
        Err(failure) => {
            error!(
                file = %saved.original_name,
                stage = failure.error.stage(),
                error = %failure,
                "adaptive conversion failed"
            );
            cleanup_output_dir(&failure.output_directory).await;
            return Err(ApiError::Internal(failure.message()));
        }
    };

    info!(
        file = %saved.original_name,
        manifest = %output.master_file_name,
        qualities = %output
            .renditions
            .iter()
            .map(|r| r.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        "adaptive conversion succeeded"
    );

    Ok(build_response(
        &state.config.public_base_url,
        &dir_name,
        saved,
        output,
    ))
}

fn build_response(
    public_base_url: &str,
    dir_name: &str,
    saved: &SavedUpload,
    output: PipelineOutput,
) -> UploadResponse {
    let url_for = |file: &str| format!("{public_base_url}/videos/{dir_name}/{file}");
    let thumbnail_url = output
        .thumbnail
        .as_deref()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .map(|n| url_for(n));

    UploadResponse {
        success: true,
        message: "Video uploaded and converted to HLS successfully".to_string(),
        data: UploadData {
            file_name: saved.original_name.clone(),
            hls_url: url_for(&output.master_file_name),
            manifest_file: output.master_file_name,
            thumbnail_url,
            size: saved.size,
            output_dir: dir_name.to_string(),
            renditions: output.renditions,
        },
    }
}
