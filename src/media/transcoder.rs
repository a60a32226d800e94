use super::error::ToolError;
use super::relay::ByteStream;
use super::types::{MetadataDocument, ToolStatus, TranscodeOptions};
use async_trait::async_trait;
use bytes::Bytes;

/// External media tooling, behind a trait so tests can swap in canned output.
#[async_trait]
pub trait MediaTranscoder: Send + Sync {
    /// Human-readable name of the backend
    fn name(&self) -> &'static str;

    /// Fetch the metadata document for a single URL (playlists are not expanded)
    async fn fetch_metadata(&self, url: &str) -> Result<MetadataDocument, ToolError>;

    /// Start extracting/transcoding `url`; the stream yields the output file bytes
    async fn transcode(&self, url: &str, options: &TranscodeOptions)
        -> Result<ByteStream, ToolError>;

    /// Convert an uploaded video file to MP3
    async fn convert_to_audio(&self, input: Bytes) -> Result<ByteStream, ToolError>;

    /// Report which external tools can be run
    async fn check_availability(&self) -> ToolStatus;
}
