//! Master playlist composition.

use std::fmt::Write as _;
use std::path::Path;

use tracing::info;

use crate::rendition::RenditionDescriptor;

pub const MASTER_HEADER: &str = "#EXTM3U\n#EXT-X-VERSION:3\n\n";

/// Render the master playlist, one variant per descriptor in the order given.
/// Players tend to start on the first entry, so callers pass the ladder in
/// ascending bitrate order.
pub fn render_master_manifest(renditions: &[RenditionDescriptor]) -> String {
    let mut out = String::from(MASTER_HEADER);
    for r in renditions {
        let _ = writeln!(
            out,
            "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}",
            r.bandwidth_bps, r.resolution
        );
        let _ = writeln!(out, "{}", r.playlist_file_name);
    }
    out
}

/// Write the master playlist to `master_path`.
///
/// The document goes to a hidden sibling temp file first and is renamed into
/// place, so readers see either no master or the complete one. Referenced
/// playlists are not checked here.
pub async fn compose_master_manifest(
    master_path: &Path,
    renditions: &[RenditionDescriptor],
) -> std::io::Result<()> {
    let content = render_master_manifest(renditions);

    let file_name = master_path
        .file_name()
        .ok_or_else(|| std::io::Error::other("master path has no file name"))?;
    let mut tmp_name = std::ffi::OsString::from(".");
    tmp_name.push(file_name);
    tmp_name.push(".tmp");
    let tmp_path = master_path.with_file_name(tmp_name);

    if let Err(e) = write_then_rename(&tmp_path, master_path, content.as_bytes()).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(e);
    }

    info!(path = %master_path.display(), variants = renditions.len(), "master playlist written");
    Ok(())
}

async fn write_then_rename(tmp: &Path, dest: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::File::create(tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(tmp, dest).await
}
