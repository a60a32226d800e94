mod error;
mod routes;

use crate::{
    config::{Config, ServerConfig},
    media::{MediaService, YtDlpTranscoder},
};
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use error::ApiError;
use std::{sync::Arc, time::Duration};
use tokio::{
    net::TcpListener,
    sync::{OwnedSemaphorePermit, Semaphore},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    media: MediaService,
    transcode_slots: Arc<Semaphore>,
    slot_wait: Duration,
}

impl AppState {
    pub fn new(media: MediaService, max_concurrent_transcodes: usize, slot_wait: Duration) -> Self {
        Self {
            media,
            transcode_slots: Arc::new(Semaphore::new(max_concurrent_transcodes.max(1))),
            slot_wait,
        }
    }

    /// Admission control for long-running transcodes: reject instead of queueing.
    fn reserve_slot(&self) -> Result<OwnedSemaphorePermit, ApiError> {
        self.transcode_slots.clone().try_acquire_owned().map_err(|_| {
            warn!("Rejecting request, all transcode slots are busy");
            ApiError::busy()
        })
    }

    /// Queues for a slot, giving up with `503` once `slot_wait` has passed.
    async fn wait_for_slot(&self) -> Result<OwnedSemaphorePermit, ApiError> {
        let acquire = self.transcode_slots.clone().acquire_owned();
        match tokio::time::timeout(self.slot_wait, acquire).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(ApiError::internal("Process slots are closed")),
            Err(_) => {
                warn!(
                    "No transcode slot freed up within {:?}, rejecting request",
                    self.slot_wait
                );
                Err(ApiError::busy())
            }
        }
    }
}

pub fn router(state: AppState, config: &ServerConfig) -> Router {
    let max_upload_bytes = config.max_upload_mb.saturating_mul(1024 * 1024);

    let mut app = Router::new()
        .route("/api/health", get(routes::health))
        .route("/api/info", get(routes::info))
        .route("/api/download", get(routes::download))
        .route(
            "/api/convert",
            post(routes::convert).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.cors_allow_any {
        app = app.layer(CorsLayer::permissive());
    }

    app
}

pub async fn run(config: Config) -> Result<()> {
    let paths = config.tool_paths();
    info!("Using yt-dlp at: {}", paths.yt_dlp);
    info!("Using ffmpeg at: {}", paths.ffmpeg);

    let info_timeout = Duration::from_secs(config.tools.info_timeout_secs);
    let transcoder = YtDlpTranscoder::new(paths, info_timeout);
    let media = MediaService::new(Arc::new(transcoder));
    media.test_setup().await;

    let state = AppState::new(media, config.server.max_concurrent_transcodes, info_timeout);
    let app = router(state, &config.server);

    let listener = TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;

    info!(
        "Server running on {} (max {} concurrent transcodes)",
        config.server.bind, config.server.max_concurrent_transcodes
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{
        ByteStream, MediaTranscoder, MetadataDocument, ToolError, ToolStatus, TranscodeOptions,
    };
    use async_trait::async_trait;
    use bytes::Bytes;

    struct IdleTranscoder;

    #[async_trait]
    impl MediaTranscoder for IdleTranscoder {
        fn name(&self) -> &'static str {
            "idle"
        }

        async fn fetch_metadata(&self, _url: &str) -> Result<MetadataDocument, ToolError> {
            Ok(MetadataDocument::default())
        }

        async fn transcode(
            &self,
            _url: &str,
            _options: &TranscodeOptions,
        ) -> Result<ByteStream, ToolError> {
            Err(ToolError::InvalidInput("unused".to_string()))
        }

        async fn convert_to_audio(&self, _input: Bytes) -> Result<ByteStream, ToolError> {
            Err(ToolError::InvalidInput("unused".to_string()))
        }

        async fn check_availability(&self) -> ToolStatus {
            ToolStatus::default()
        }
    }

    fn state(slots: usize) -> AppState {
        AppState::new(
            MediaService::new(Arc::new(IdleTranscoder)),
            slots,
            Duration::from_millis(100),
        )
    }

    #[tokio::test]
    async fn test_reserve_slot_until_exhausted() {
        let state = state(2);
        let first = state.reserve_slot().unwrap();
        let _second = state.reserve_slot().unwrap();

        let rejected = state.reserve_slot().unwrap_err();
        assert_eq!(rejected.status(), axum::http::StatusCode::SERVICE_UNAVAILABLE);

        drop(first);
        assert!(state.reserve_slot().is_ok());
    }

    #[tokio::test]
    async fn test_wait_for_slot_gives_up_after_slot_wait() {
        let state = state(1);
        let held = state.reserve_slot().unwrap();

        let rejected = state.wait_for_slot().await.unwrap_err();
        assert_eq!(rejected.status(), axum::http::StatusCode::SERVICE_UNAVAILABLE);

        drop(held);
        assert!(state.wait_for_slot().await.is_ok());
    }

    #[tokio::test]
    async fn test_wait_for_slot_queues_until_released() {
        let state = state(1);
        let held = state.reserve_slot().unwrap();

        let waiter = {
            let state = state.clone();
            tokio::spawn(async move { state.wait_for_slot().await.is_ok() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);

        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_zero_slots_is_clamped() {
        let state = state(0);
        assert!(state.reserve_slot().is_ok());
    }

    #[tokio::test]
    async fn test_router_builds() {
        let _app = router(state(1), &ServerConfig::default());
    }
}
