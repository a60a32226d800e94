use super::{
    error::ToolError,
    relay::{spawn_relay, ByteStream},
    transcoder::MediaTranscoder,
    types::{MediaKind, MetadataDocument, ToolAvailability, ToolStatus, TranscodeOptions},
};
use crate::config::ToolPaths;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

pub struct YtDlpTranscoder {
    paths: ToolPaths,
    info_timeout: Duration,
}

impl YtDlpTranscoder {
    pub fn new(paths: ToolPaths, info_timeout: Duration) -> Self {
        Self {
            paths,
            info_timeout,
        }
    }
}

pub fn info_args(url: &str) -> Vec<String> {
    vec!["-J".to_string(), "--flat-playlist".to_string(), url.to_string()]
}

pub fn format_selector(format_id: Option<&str>) -> String {
    match format_id {
        Some(id) => format!("{}+bestaudio/best", id),
        None => "bestvideo+bestaudio/best".to_string(),
    }
}

/// Arguments for a download whose output goes to stdout.
pub fn transcode_args(url: &str, options: &TranscodeOptions, ffmpeg_location: &str) -> Vec<String> {
    let mut args: Vec<String> = match options.kind {
        MediaKind::Audio => vec!["-x", "--audio-format", "mp3"]
            .into_iter()
            .map(String::from)
            .collect(),
        MediaKind::Video => vec![
            "--ffmpeg-location".to_string(),
            ffmpeg_location.to_string(),
            "-f".to_string(),
            format_selector(options.format_id.as_deref()),
        ],
    };
    args.extend(["-o".to_string(), "-".to_string(), url.to_string()]);
    args
}

pub fn convert_args() -> Vec<&'static str> {
    vec!["-loglevel", "error", "-i", "pipe:0", "-vn", "-f", "mp3", "pipe:1"]
}

async fn probe_version(program: &str, flag: &str) -> ToolAvailability {
    match Command::new(program).arg(flag).kill_on_drop(true).output().await {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("unknown")
                .trim()
                .to_string();
            info!("✅ {} is available: {}", program, version);
            ToolAvailability {
                available: true,
                version: Some(version),
            }
        }
        Ok(output) => {
            warn!("❌ {} command failed with {}", program, output.status);
            ToolAvailability::default()
        }
        Err(e) => {
            warn!("❌ {} not found: {}", program, e);
            ToolAvailability::default()
        }
    }
}

#[async_trait]
impl MediaTranscoder for YtDlpTranscoder {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn fetch_metadata(&self, url: &str) -> Result<MetadataDocument, ToolError> {
        debug!("Extracting metadata with yt-dlp for: {}", url);

        let output = tokio::time::timeout(
            self.info_timeout,
            Command::new(&self.paths.yt_dlp)
                .args(info_args(url))
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| ToolError::Timeout {
            tool: "yt-dlp".to_string(),
            secs: self.info_timeout.as_secs(),
        })?
        .map_err(|source| ToolError::Spawn {
            tool: self.paths.yt_dlp.clone(),
            source,
        })?;

        if !output.status.success() {
            let error = ToolError::from_exit(&output.stderr, "yt-dlp failed");
            warn!("yt-dlp metadata extraction failed ({}): {}", output.status, error);
            return Err(error);
        }

        debug!("yt-dlp produced {} bytes of JSON", output.stdout.len());
        let document: MetadataDocument = serde_json::from_slice(&output.stdout)?;
        Ok(document)
    }

    async fn transcode(
        &self,
        url: &str,
        options: &TranscodeOptions,
    ) -> Result<ByteStream, ToolError> {
        let args = transcode_args(url, options, &self.paths.ffmpeg);
        info!("Starting yt-dlp relay: {}", args.join(" "));

        let mut command = Command::new(&self.paths.yt_dlp);
        command.args(&args);
        spawn_relay("yt-dlp", command, None)
    }

    async fn convert_to_audio(&self, input: Bytes) -> Result<ByteStream, ToolError> {
        info!("Converting {} byte upload to mp3 with ffmpeg", input.len());

        let mut command = Command::new(&self.paths.ffmpeg);
        command.args(convert_args());
        spawn_relay("ffmpeg", command, Some(input))
    }

    async fn check_availability(&self) -> ToolStatus {
        let yt_dlp = probe_version(&self.paths.yt_dlp, "--version").await;
        let ffmpeg = probe_version(&self.paths.ffmpeg, "-version").await;

        if yt_dlp.available && !ffmpeg.available {
            warn!("⚠️  yt-dlp will work but merging, audio extraction and uploads will fail");
        }

        ToolStatus { yt_dlp, ffmpeg }
    }
}
