use std::sync::Arc;

use hlsbox_transcoder::pipeline::Pipeline;

use crate::config::ServerConfig;
use crate::rate_limit::RateLimiter;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub config: Arc<ServerConfig>,
    pub api_limiter: RateLimiter,
    pub upload_limiter: RateLimiter,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, config: ServerConfig) -> Self {
        let api_limiter =
            RateLimiter::new(config.api_limit.max_requests, config.api_limit.window_secs);
        let upload_limiter = RateLimiter::new(
            config.upload_limit.max_requests,
            config.upload_limit.window_secs,
        );
        Self {
            pipeline,
            config: Arc::new(config),
            api_limiter,
            upload_limiter,
        }
    }
}
