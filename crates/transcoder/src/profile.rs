//! Quality profiles for the adaptive rendition ladder.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::encoder::Geometry;

pub const DEFAULT_AUDIO_BITRATE: &str = "128k";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    #[error("profile ladder is empty")]
    Empty,
    #[error("profile {profile}: bitrate {value:?} is not a positive kbps value like \"800k\"")]
    InvalidBitrate { profile: String, value: String },
    #[error("profile {0}: width and height must be positive")]
    InvalidGeometry(String),
    #[error("profile {0}: name must be a non-empty filename-safe token")]
    InvalidName(String),
    #[error("profile name {0} is declared twice")]
    DuplicateName(String),
    #[error("profile {next} must have a higher bitrate than {previous}")]
    NotAscending { previous: String, next: String },
}

/// One rendition of the ladder, e.g. `360p 640x360 @ 800k`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityProfile {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Video bitrate as passed to the encoder, magnitude plus `k` suffix.
    pub video_bitrate: String,
    pub audio_bitrate: String,
}

impl QualityProfile {
    pub fn new(name: &str, width: u32, height: u32, video_bitrate: &str) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            video_bitrate: video_bitrate.to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
        }
    }

    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.width, self.height)
    }

    /// `"{width}x{height}"`
    pub fn resolution(&self) -> String {
        self.geometry().to_string()
    }

    /// Declared bandwidth in bits per second: the kbps magnitude times 1000.
    /// This is the configured bitrate, not the bitrate the encoder achieved.
    pub fn bandwidth_bps(&self) -> Result<u64, ProfileError> {
        parse_bitrate_kbps(&self.video_bitrate)
            .and_then(|kbps| kbps.checked_mul(1000))
            .ok_or_else(|| ProfileError::InvalidBitrate {
                profile: self.name.clone(),
                value: self.video_bitrate.clone(),
            })
    }

    /// `{base_name}_{name}.m3u8`
    pub fn playlist_file_name(&self, base_name: &str) -> String {
        format!("{base_name}_{}.m3u8", self.name)
    }
}

/// Parse `"800k"` (or a bare `"800"`) into 800. Any other suffix is rejected.
pub fn parse_bitrate_kbps(value: &str) -> Option<u64> {
    let value = value.trim();
    let digits = value
        .strip_suffix('k')
        .or_else(|| value.strip_suffix('K'))
        .unwrap_or(value);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u64>().ok().filter(|&kbps| kbps > 0)
}

/// The 360p / 480p / 720p ladder.
pub fn default_ladder() -> Vec<QualityProfile> {
    vec![
        QualityProfile::new("360p", 640, 360, "800k"),
        QualityProfile::new("480p", 854, 480, "1400k"),
        QualityProfile::new("720p", 1280, 720, "2800k"),
    ]
}

/// Check the ladder invariants: non-empty, unique safe names, positive
/// geometry, parsable bitrates strictly ascending in declaration order.
pub fn validate_ladder(profiles: &[QualityProfile]) -> Result<(), ProfileError> {
    if profiles.is_empty() {
        return Err(ProfileError::Empty);
    }

    let mut previous: Option<(&str, u64)> = None;
    for (i, profile) in profiles.iter().enumerate() {
        let name_ok = !profile.name.is_empty()
            && profile
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
        if !name_ok {
            return Err(ProfileError::InvalidName(profile.name.clone()));
        }
        if profiles[..i].iter().any(|p| p.name == profile.name) {
            return Err(ProfileError::DuplicateName(profile.name.clone()));
        }
        if profile.width == 0 || profile.height == 0 {
            return Err(ProfileError::InvalidGeometry(profile.name.clone()));
        }
        if parse_bitrate_kbps(&profile.audio_bitrate).is_none() {
            return Err(ProfileError::InvalidBitrate {
                profile: profile.name.clone(),
                value: profile.audio_bitrate.clone(),
            });
        }

        let bandwidth = profile.bandwidth_bps()?;
        if let Some((prev_name, prev_bandwidth)) = previous {
            if bandwidth <= prev_bandwidth {
                return Err(ProfileError::NotAscending {
                    previous: prev_name.to_string(),
                    next: profile.name.clone(),
                });
            }
        }
        previous = Some((&profile.name, bandwidth));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitrate_is_numeric_prefix_times_thousand() {
        assert_eq!(parse_bitrate_kbps("800k"), Some(800));
        assert_eq!(parse_bitrate_kbps("1400K"), Some(1400));
        assert_eq!(parse_bitrate_kbps("96"), Some(96));
        assert_eq!(parse_bitrate_kbps("2M"), None);
        assert_eq!(parse_bitrate_kbps("k"), None);
        assert_eq!(parse_bitrate_kbps("0k"), None);
        assert_eq!(parse_bitrate_kbps("-5k"), None);

        let p = QualityProfile::new("720p", 1280, 720, "2800k");
        assert_eq!(p.bandwidth_bps().unwrap(), 2_800_000);
        assert_eq!(p.resolution(), "1280x720");
        assert_eq!(p.playlist_file_name("demo"), "demo_720p.m3u8");
    }

    #[test]
    fn default_ladder_is_valid() {
        let ladder = default_ladder();
        assert_eq!(ladder.len(), 3);
        assert!(validate_ladder(&ladder).is_ok());
        assert!(ladder.iter().all(|p| p.audio_bitrate == "128k"));
    }

    #[test]
    fn ladder_violations_are_rejected() {
        assert_eq!(validate_ladder(&[]), Err(ProfileError::Empty));

        let descending = vec![
            QualityProfile::new("720p", 1280, 720, "2800k"),
            QualityProfile::new("360p", 640, 360, "800k"),
        ];
        assert_eq!(
            validate_ladder(&descending),
            Err(ProfileError::NotAscending {
                previous: "720p".into(),
                next: "360p".into()
            })
        );

        let dup = vec![
            QualityProfile::new("sd", 640, 360, "800k"),
            QualityProfile::new("sd", 854, 480, "1400k"),
        ];
        assert_eq!(
            validate_ladder(&dup),
            Err(ProfileError::DuplicateName("sd".into()))
        );

        let bad_rate = vec![QualityProfile::new("hd", 1280, 720, "fast")];
        assert!(matches!(
            validate_ladder(&bad_rate),
            Err(ProfileError::InvalidBitrate { .. })
        ));

        let huge = vec![QualityProfile::new("hd", 1280, 720, "18446744073709552k")];
        assert_eq!(
            validate_ladder(&huge),
            Err(ProfileError::InvalidBitrate {
                profile: "hd".into(),
                value: "18446744073709552k".into()
            })
        );

        let slash = vec![QualityProfile::new("../x", 1280, 720, "800k")];
        assert!(matches!(
            validate_ladder(&slash),
            Err(ProfileError::InvalidName(_))
        ));

        let flat = vec![QualityProfile::new("zero", 0, 720, "800k")];
        assert_eq!(
            validate_ladder(&flat),
            Err(ProfileError::InvalidGeometry("zero".into()))
        );
    }
}
