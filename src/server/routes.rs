use super::{error::ApiError, AppState};
use crate::media::{
    attachment_filename, content_disposition, download_filename, ByteStream, MediaInfo, MediaKind,
};
use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        StatusCode,
    },
    response::Response,
    Json,
};
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::OwnedSemaphorePermit;
use tracing::{error, info};

const CONVERTED_BASE_NAME: &str = "converted_audio";

#[derive(Debug, Default, Deserialize)]
pub struct InfoQuery {
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    pub url: Option<String>,
    pub itag: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConvertQuery {
    pub title: Option<String>,
}

fn required(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let status = state.media.test_setup().await;
    Json(serde_json::json!({
        "status": "ok",
        "transcoder": state.media.backend_name(),
        "ytDlp": status.yt_dlp,
        "ffmpeg": status.ffmpeg,
    }))
}

pub async fn info(
    State(state): State<AppState>,
    Query(query): Query<InfoQuery>,
) -> Result<Json<MediaInfo>, ApiError> {
    let Some(url) = required(&query.url) else {
        return Err(ApiError::bad_request("Invalid URL"));
    };

    // info lookups queue for a slot instead of being rejected outright
    let _permit = state.wait_for_slot().await?;

    match state.media.fetch_info(url).await {
        Ok(info) => Ok(Json(info)),
        Err(e) => {
            error!("Info Error: {}", e);
            Err(ApiError::info_failure(e))
        }
    }
}

pub async fn download(
    State(state): State<AppState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let Some(url) = required(&query.url) else {
        return Err(ApiError::bad_request("Invalid URL").into_plain_text());
    };

    let kind = MediaKind::from_query(query.kind.as_deref());
    let filename = download_filename(query.title.as_deref(), kind);
    let permit = state.reserve_slot()?;

    let stream = state
        .media
        .relay(url, query.itag.as_deref(), kind)
        .await
        .map_err(ApiError::relay_failure)?;

    info!("Streaming {} as {}", url, filename);
    attachment_response(stream, permit, &filename, kind.content_type())
}

pub async fn convert(
    State(state): State<AppState>,
    Query(query): Query<ConvertQuery>,
    body: Bytes,
) -> Result<Response, ApiError> {
    if body.is_empty() {
        return Err(ApiError::bad_request("Empty upload").into_plain_text());
    }

    let filename = attachment_filename(query.title.as_deref(), CONVERTED_BASE_NAME, "mp3");
    let permit = state.reserve_slot()?;

    let stream = state
        .media
        .convert_upload(body)
        .await
        .map_err(ApiError::relay_failure)?;

    info!("Streaming converted upload as {}", filename);
    attachment_response(stream, permit, &filename, MediaKind::Audio.content_type())
}

/// Headers are fixed here, before the first relayed byte. The slot permit
/// lives as long as the body stream.
fn attachment_response(
    stream: ByteStream,
    permit: OwnedSemaphorePermit,
    filename: &str,
    content_type: &'static str,
) -> Result<Response, ApiError> {
    let stream = stream.map(move |chunk| {
        let _slot = &permit;
        chunk
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type)
        .header(CONTENT_DISPOSITION, content_disposition(filename))
        .body(Body::from_stream(stream))
        .map_err(|e| ApiError::internal(format!("Failed to build response: {}", e)).into_plain_text())
}
