use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use hlsbox_server::config::{ServerConfig, pipeline_config_from_lookup};
use hlsbox_transcoder::ffmpeg::FfmpegEncoder;
use hlsbox_transcoder::pipeline::Pipeline;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = ServerConfig::from_env();
    let pipeline_config = pipeline_config_from_lookup(|key| std::env::var(key).ok());

    for dir in [config.temp_dir(), config.hls_root()] {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let encoder = Arc::new(FfmpegEncoder::new(pipeline_config.ffmpeg_path.clone()));
    let pipeline = Pipeline::new(encoder, pipeline_config).context("invalid pipeline config")?;
    info!(
        ffmpeg = %pipeline.config().ffmpeg_path.display(),
        parallel_renditions = pipeline.config().max_parallel_renditions,
        "transcoding pipeline ready"
    );

    let bind_addr = config.bind.clone();
    info!(
        upload_root = %config.upload_root.display(),
        cors_origin = config.frontend_origin.as_deref().unwrap_or("*"),
        "configuration loaded"
    );

    let state = hlsbox_server::state::AppState::new(Arc::new(pipeline), config);
    let app = hlsbox_server::routes::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .context("failed to bind")?;
    info!(addr = %bind_addr, "server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
