mod error;
mod normalize;
mod relay;
mod transcoder;
mod types;
mod utils;
mod ytdlp;

pub use error::{FailureKind, ToolError};
pub use relay::ByteStream;
pub use transcoder::MediaTranscoder;
pub use types::{MediaInfo, MediaKind, ToolStatus, TranscodeOptions};
pub use utils::{attachment_filename, content_disposition, download_filename};
pub use ytdlp::YtDlpTranscoder;

#[cfg(test)]
pub use types::{MetadataDocument, RawFormat};

use bytes::Bytes;
use std::sync::Arc;
use tracing::{info, warn};
use utils::validate_url;

/// Validates requests and drives a [`MediaTranscoder`].
#[derive(Clone)]
pub struct MediaService {
    transcoder: Arc<dyn MediaTranscoder>,
}

impl MediaService {
    pub fn new(transcoder: Arc<dyn MediaTranscoder>) -> Self {
        info!("Media service initialized with {}", transcoder.name());
        Self { transcoder }
    }

    pub fn backend_name(&self) -> &'static str {
        self.transcoder.name()
    }

    pub async fn fetch_info(&self, url: &str) -> Result<MediaInfo, ToolError> {
        let url = validate_url(url)?;
        info!("Fetching info for: {}", url);

        let document = self.transcoder.fetch_metadata(url).await?;
        let info = MediaInfo::from_document(document);

        info!(
            "Found {} video and {} audio formats for \"{}\"",
            info.video_formats.len(),
            info.audio_formats.len(),
            info.title
        );
        Ok(info)
    }

    pub async fn relay(
        &self,
        url: &str,
        format_id: Option<&str>,
        kind: MediaKind,
    ) -> Result<ByteStream, ToolError> {
        let url = validate_url(url)?;
        let options = TranscodeOptions {
            format_id: format_id
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(String::from),
            kind,
        };

        info!("Downloading: {} [Format: {:?}, {:?}]", url, options.format_id, kind);
        self.transcoder.transcode(url, &options).await
    }

    pub async fn convert_upload(&self, input: Bytes) -> Result<ByteStream, ToolError> {
        if input.is_empty() {
            return Err(ToolError::InvalidInput("Empty upload".to_string()));
        }
        self.transcoder.convert_to_audio(input).await
    }

    pub async fn test_setup(&self) -> ToolStatus {
        info!("Testing media tool setup...");
        let status = self.transcoder.check_availability().await;

        if !status.yt_dlp.available {
            warn!("yt-dlp is not available, /api/info and /api/download will fail");
        }
        status
    }
}
