use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderValue, Method, header};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::{Json, Router};
use hlsbox_core::error::ApiError;
use serde_json::{Value, json};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::rate_limit::{api_rate_limit, upload_rate_limit};
use crate::state::AppState;

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(state.config.frontend_origin.as_deref()));

    Router::new()
        .route("/", get(service_info))
        .nest("/api", api_router(&state))
        .route("/videos/{dir}/{file}", get(crate::streaming::serve_hls_file))
        .fallback(not_found)
        .layer(middleware)
        .with_state(state)
}

fn api_router(state: &AppState) -> Router<AppState> {
    let upload = Router::new()
        .route("/upload", post(crate::upload::upload_video))
        .layer(DefaultBodyLimit::max(
            state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES,
        ))
        .route_layer(from_fn_with_state(state.clone(), upload_rate_limit));

    Router::new()
        .route("/health", get(health))
        .merge(upload)
        .route_layer(from_fn_with_state(state.clone(), api_rate_limit))
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let allow_origin = match origin.map(HeaderValue::from_str) {
        Some(Ok(value)) => AllowOrigin::exact(value),
        Some(Err(e)) => {
            tracing::warn!(error = %e, "invalid frontend origin, allowing any origin");
            AllowOrigin::any()
        }
        None => AllowOrigin::any(),
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

async fn service_info(State(state): State<AppState>) -> Json<Value> {
    let cfg = &state.config;
    Json(json!({
        "service": "hlsbox adaptive video streaming",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "upload": "POST /api/upload",
            "health": "GET /api/health",
            "videos": "GET /videos/{dir}/{file}"
        },
        "renditions": state
            .pipeline
            .config()
            .profiles
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>(),
        "rateLimits": {
            "api": format!(
                "{} requests per {} seconds",
                cfg.api_limit.max_requests, cfg.api_limit.window_secs
            ),
            "upload": format!(
                "{} uploads per {} seconds",
                cfg.upload_limit.max_requests, cfg.upload_limit.window_secs
            )
        }
    }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "success": true,
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn not_found() -> AppError {
    ApiError::NotFound("endpoint not found".into()).into()
}
