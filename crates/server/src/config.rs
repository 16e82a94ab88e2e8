//! Environment-driven configuration.

use std::path::PathBuf;

use hlsbox_transcoder::PipelineConfig;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Sliding-window request budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    pub max_requests: u64,
    pub window_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// Holds `temp/` (in-flight uploads) and `hls/` (published packages).
    pub upload_root: PathBuf,
    /// Prefix for URLs returned to clients, without trailing slash.
    pub public_base_url: String,
    /// Allowed CORS origin; any origin when unset.
    pub frontend_origin: Option<String>,
    pub max_upload_bytes: usize,
    pub api_limit: RateLimitSettings,
    pub upload_limit: RateLimitSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: format!("0.0.0.0:{DEFAULT_PORT}"),
            upload_root: PathBuf::from("uploads"),
            public_base_url: format!("http://localhost:{DEFAULT_PORT}"),
            frontend_origin: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            api_limit: RateLimitSettings {
                max_requests: 100,
                window_secs: 60,
            },
            upload_limit: RateLimitSettings {
                max_requests: 5,
                window_secs: 15 * 60,
            },
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let port: u16 = lookup("PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Self {
            bind: lookup("HLSBOX_BIND").unwrap_or_else(|| format!("0.0.0.0:{port}")),
            upload_root: lookup("HLSBOX_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_root),
            public_base_url: lookup("HLSBOX_PUBLIC_URL")
                .unwrap_or_else(|| format!("http://localhost:{port}"))
                .trim_end_matches('/')
                .to_string(),
            frontend_origin: lookup("HLSBOX_FRONTEND_URL").filter(|v| !v.trim().is_empty()),
            max_upload_bytes: lookup("HLSBOX_MAX_UPLOAD_BYTES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_upload_bytes),
            api_limit: defaults.api_limit,
            upload_limit: defaults.upload_limit,
        }
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.upload_root.join("temp")
    }

    pub fn hls_root(&self) -> PathBuf {
        self.upload_root.join("hls")
    }
}

/// Pipeline settings that may be overridden from the environment.
pub fn pipeline_config_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> PipelineConfig {
    let defaults = PipelineConfig::default();
    PipelineConfig {
        ffmpeg_path: lookup("HLSBOX_FFMPEG")
            .map(PathBuf::from)
            .unwrap_or(defaults.ffmpeg_path.clone()),
        max_parallel_renditions: lookup("HLSBOX_PARALLEL_RENDITIONS")
            .and_then(|v| v.parse().ok())
            .filter(|&n: &usize| n > 0)
            .unwrap_or(defaults.max_parallel_renditions),
        ..defaults
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let cfg = ServerConfig::from_lookup(lookup(&[]));
        assert_eq!(cfg.bind, "0.0.0.0:3000");
        assert_eq!(cfg.public_base_url, "http://localhost:3000");
        assert_eq!(cfg.max_upload_bytes, 100 * 1024 * 1024);
        assert_eq!(cfg.upload_limit.max_requests, 5);
        assert_eq!(cfg.upload_limit.window_secs, 900);
        assert_eq!(cfg.hls_root(), PathBuf::from("uploads/hls"));
        assert!(cfg.frontend_origin.is_none());
    }

    #[test]
    fn port_and_overrides() {
        let cfg = ServerConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("HLSBOX_PUBLIC_URL", "https://video.example.com/"),
            ("HLSBOX_FRONTEND_URL", "https://app.example.com"),
            ("HLSBOX_MAX_UPLOAD_BYTES", "1024"),
        ]));
        assert_eq!(cfg.bind, "0.0.0.0:8080");
        assert_eq!(cfg.public_base_url, "https://video.example.com");
        assert_eq!(cfg.frontend_origin.as_deref(), Some("https://app.example.com"));
        assert_eq!(cfg.max_upload_bytes, 1024);
    }

    #[test]
    fn pipeline_overrides() {
        let cfg = pipeline_config_from_lookup(lookup(&[
            ("HLSBOX_FFMPEG", "/opt/ffmpeg/bin/ffmpeg"),
            ("HLSBOX_PARALLEL_RENDITIONS", "0"),
        ]));
        assert_eq!(cfg.ffmpeg_path, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        assert_eq!(cfg.max_parallel_renditions, 1);
        assert_eq!(cfg.segment_secs, 10);
        assert_eq!(cfg.profiles.len(), 3);
    }
}
