//! Serving of published HLS packages under `/videos/{dir}/{file}`.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use hlsbox_core::error::ApiError;
use hlsbox_transcoder::hls;

use crate::error::AppError;
use crate::state::AppState;

/// A single path segment that cannot escape its parent directory.
fn is_safe_component(component: &str) -> bool {
    !component.is_empty()
        && !component.starts_with('.')
        && !component.contains("..")
        && !component.contains('/')
        && !component.contains('\\')
        && !component.contains('\0')
}

/// GET /videos/{dir}/{file}
pub async fn serve_hls_file(
    State(state): State<AppState>,
    Path((dir, file)): Path<(String, String)>,
) -> Result<Response, AppError> {
    if !is_safe_component(&dir) || !is_safe_component(&file) {
        return Err(ApiError::BadRequest("invalid path".into()).into());
    }

    // Only files that belong to an HLS package are exposed.
    let content_type =
        hls::content_type(&file).ok_or_else(|| ApiError::NotFound("file not found".into()))?;

    let path = state.config.hls_root().join(&dir).join(&file);
    let file_handle = match tokio::fs::File::open(&path).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound("file not found".into()).into());
        }
        Err(e) => return Err(ApiError::Internal(format!("file open error: {e}")).into()),
    };
    let metadata = file_handle
        .metadata()
        .await
        .map_err(|e| ApiError::Internal(format!("stat error: {e}")))?;
    if !metadata.is_file() {
        return Err(ApiError::NotFound("file not found".into()).into());
    }

    let stream = tokio_util::io::ReaderStream::new(file_handle);

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_LENGTH, metadata.len().to_string()),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}
