use serde::{Deserialize, Serialize};

/// Video container types accepted by the upload endpoint, keyed by MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoMime {
    Mp4,
    Mpeg,
    QuickTime,
    Avi,
    Webm,
    Matroska,
}

impl VideoMime {
    pub const ALL: [VideoMime; 6] = [
        Self::Mp4,
        Self::Mpeg,
        Self::QuickTime,
        Self::Avi,
        Self::Webm,
        Self::Matroska,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mp4 => "video/mp4",
            Self::Mpeg => "video/mpeg",
            Self::QuickTime => "video/quicktime",
            Self::Avi => "video/x-msvideo",
            Self::Webm => "video/webm",
            Self::Matroska => "video/x-matroska",
        }
    }

    /// Match a `Content-Type` value, ignoring parameters and case.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(essence))
    }
}

impl std::fmt::Display for VideoMime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_video_types() {
        assert_eq!(VideoMime::from_mime("video/mp4"), Some(VideoMime::Mp4));
        assert_eq!(
            VideoMime::from_mime("Video/X-Matroska; codecs=avc1"),
            Some(VideoMime::Matroska)
        );
        assert_eq!(VideoMime::from_mime("image/png"), None);
        assert_eq!(VideoMime::from_mime(""), None);
    }
}
