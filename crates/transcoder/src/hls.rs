//! Content types for the files of a published HLS tree.

/// Content-Type for HLS master/variant playlists.
pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// Content-Type for MPEG-TS segments.
pub const SEGMENT_CONTENT_TYPE_TS: &str = "video/MP2T";

/// Content-Type for fMP4 segments.
pub const SEGMENT_CONTENT_TYPE_MP4: &str = "video/mp4";

pub const THUMBNAIL_CONTENT_TYPE: &str = "image/jpeg";

/// Content type from filename extension, `None` for files that are not part
/// of an HLS package.
pub fn content_type(filename: &str) -> Option<&'static str> {
    let ext = filename.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase())?;
    match ext.as_str() {
        "m3u8" => Some(PLAYLIST_CONTENT_TYPE),
        "ts" => Some(SEGMENT_CONTENT_TYPE_TS),
        "m4s" | "mp4" => Some(SEGMENT_CONTENT_TYPE_MP4),
        "jpg" | "jpeg" => Some(THUMBNAIL_CONTENT_TYPE),
        _ => None,
    }
}
