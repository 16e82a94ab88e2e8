use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use hlsbox_core::error::ApiError;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::error::AppError;
use crate::state::AppState;

/// Simple in-memory sliding-window rate limiter keyed by client.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<RateLimiterInner>>,
    max_requests: u64,
    window_secs: u64,
}

struct RateLimiterInner {
    buckets: HashMap<String, Vec<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: u64, window_secs: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RateLimiterInner {
                buckets: HashMap::new(),
            })),
            max_requests,
            window_secs,
        }
    }

    /// Record a request for `key`. Returns the remaining budget, or
    /// `Err(retry_after_secs)` when the window is exhausted.
    pub async fn check(&self, key: &str) -> Result<u64, u64> {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        let window = Duration::from_secs(self.window_secs);

        // Drop idle clients so the map does not grow without bound.
        inner
            .buckets
            .retain(|_, hits| hits.last().is_some_and(|t| now.duration_since(*t) < window));

        let entries = inner.buckets.entry(key.to_string()).or_default();
        entries.retain(|t| now.duration_since(*t) < window);

        if entries.len() as u64 >= self.max_requests {
            let retry_after = entries
                .first()
                .map(|oldest| window.saturating_sub(now.duration_since(*oldest)).as_secs().max(1))
                .unwrap_or(self.window_secs);
            Err(retry_after)
        } else {
            entries.push(now);
            Ok(self.max_requests - entries.len() as u64)
        }
    }
}

fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| format!("ip:{}", ci.0.ip()))
        .unwrap_or_else(|| "unknown".to_string())
}

async fn enforce(limiter: &RateLimiter, request: Request, next: Next) -> Response {
    let key = client_key(&request);
    match limiter.check(&key).await {
        Ok(_remaining) => next.run(request).await,
        Err(retry_after_secs) => {
            tracing::warn!(client = %key, retry_after_secs, "rate limit exceeded");
            AppError(ApiError::TooManyRequests { retry_after_secs }).into_response()
        }
    }
}

/// General API budget.
pub async fn api_rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    enforce(&state.api_limiter, request, next).await
}

/// Upload budget, applied on top of the API budget.
pub async fn upload_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    enforce(&state.upload_limiter, request, next).await
}
