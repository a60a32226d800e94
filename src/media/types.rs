use serde::{Deserialize, Serialize};

/// Structured document printed by `yt-dlp -J`. Only the fields we read are modelled.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataDocument {
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub formats: Vec<RawFormat>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFormat {
    #[serde(default)]
    pub format_id: String,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub video_ext: Option<String>,
    pub height: Option<u32>,
    pub format_note: Option<String>,
    pub ext: Option<String>,
    pub filesize: Option<f64>,
    pub filesize_approx: Option<f64>,
    pub abr: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaInfo {
    pub title: String,
    #[serde(rename = "thumbnail")]
    pub thumbnail_url: String,
    #[serde(rename = "videoFormats")]
    pub video_formats: Vec<VideoFormat>,
    #[serde(rename = "audioFormats")]
    pub audio_formats: Vec<AudioFormat>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoFormat {
    #[serde(rename = "itag")]
    pub format_id: String,
    pub quality_label: String,
    pub container: String,
    pub has_video: bool,
    pub has_audio: bool,
    #[serde(rename = "codecs")]
    pub codec: String,
    #[serde(rename = "fileSize")]
    pub file_size_bytes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioFormat {
    #[serde(rename = "itag")]
    pub format_id: String,
    pub container: String,
    #[serde(rename = "audioBitrate")]
    pub audio_bitrate_kbps: Option<f64>,
    #[serde(rename = "fileSize")]
    pub file_size_bytes: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    /// `audio` selects audio extraction; any other value means video.
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some("audio") => MediaKind::Audio,
            _ => MediaKind::Video,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            MediaKind::Audio => "mp3",
            MediaKind::Video => "mp4",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            MediaKind::Audio => "audio/mpeg",
            MediaKind::Video => "video/mp4",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeOptions {
    pub format_id: Option<String>,
    pub kind: MediaKind,
}

/// Availability of one external executable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ToolAvailability {
    pub available: bool,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ToolStatus {
    #[serde(rename = "ytDlp")]
    pub yt_dlp: ToolAvailability,
    pub ffmpeg: ToolAvailability,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_from_query() {
        assert_eq!(MediaKind::from_query(Some("audio")), MediaKind::Audio);
        assert_eq!(MediaKind::from_query(Some("video")), MediaKind::Video);
        assert_eq!(MediaKind::from_query(Some("AUDIO")), MediaKind::Video);
        assert_eq!(MediaKind::from_query(None), MediaKind::Video);
    }

    #[test]
    fn test_raw_format_tolerates_missing_fields() {
        let doc: MetadataDocument = serde_json::from_str(
            r#"{"title": "t", "formats": [{"format_id": "sb0", "filesize_approx": 1234.0}]}"#,
        )
        .unwrap();

        assert_eq!(doc.thumbnail, None);
        assert_eq!(doc.formats.len(), 1);
        assert_eq!(doc.formats[0].vcodec, None);
        assert_eq!(doc.formats[0].filesize_approx, Some(1234.0));
    }

    #[test]
    fn test_metadata_without_formats() {
        let doc: MetadataDocument =
            serde_json::from_str(r#"{"_type": "playlist", "title": "Mix"}"#).unwrap();
        assert!(doc.formats.is_empty());
    }

    #[test]
    fn test_video_format_wire_names() {
        let format = VideoFormat {
            format_id: "137".to_string(),
            quality_label: "1080p".to_string(),
            container: "mp4".to_string(),
            has_video: true,
            has_audio: false,
            codec: "avc1".to_string(),
            file_size_bytes: None,
        };

        let json = serde_json::to_value(&format).unwrap();
        assert_eq!(json["itag"], "137");
        assert_eq!(json["qualityLabel"], "1080p");
        assert_eq!(json["hasVideo"], true);
        assert_eq!(json["codecs"], "avc1");
        assert!(json["fileSize"].is_null());
    }
}
