use super::types::{AudioFormat, MediaInfo, MetadataDocument, RawFormat, VideoFormat};

/// Video and audio descriptors derived from a raw format list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedFormats {
    pub video_formats: Vec<VideoFormat>,
    pub audio_formats: Vec<AudioFormat>,
}

/// yt-dlp reports a missing stream as the literal `"none"`.
fn is_present(field: Option<&str>) -> bool {
    matches!(field, Some(value) if !value.is_empty() && value != "none")
}

fn is_video(format: &RawFormat) -> bool {
    is_present(format.vcodec.as_deref()) && is_present(format.video_ext.as_deref())
}

fn is_audio_only(format: &RawFormat) -> bool {
    is_present(format.acodec.as_deref())
        && (!is_present(format.vcodec.as_deref()) || !is_present(format.video_ext.as_deref()))
}

fn file_size(format: &RawFormat) -> Option<u64> {
    // an exact size of 0 means unknown, so the estimate wins
    format
        .filesize
        .filter(|size| *size > 0.0)
        .or(format.filesize_approx)
        .filter(|size| size.is_finite() && *size >= 0.0)
        .map(|size| size as u64)
}

fn quality_label(format: &RawFormat) -> String {
    let note = format.format_note.as_deref().filter(|n| !n.is_empty());
    match (format.height, note) {
        (Some(height), Some(note)) => format!("{}p ({})", height, note),
        (Some(height), None) => format!("{}p", height),
        (None, Some(note)) => note.to_string(),
        (None, None) => "unknown".to_string(),
    }
}

pub fn normalize(raw_formats: &[RawFormat]) -> NormalizedFormats {
    let mut video: Vec<&RawFormat> = raw_formats.iter().filter(|f| is_video(f)).collect();
    // sort_by is stable, so equal heights keep the tool's ordering
    video.sort_by(|a, b| b.height.unwrap_or(0).cmp(&a.height.unwrap_or(0)));

    let video_formats = video
        .into_iter()
        .map(|f| VideoFormat {
            format_id: f.format_id.clone(),
            quality_label: quality_label(f),
            container: f.ext.clone().unwrap_or_default(),
            has_video: true,
            has_audio: is_present(f.acodec.as_deref()),
            codec: f.vcodec.clone().unwrap_or_default(),
            file_size_bytes: file_size(f),
        })
        .collect();

    let audio_formats = raw_formats
        .iter()
        .filter(|f| is_audio_only(f))
        .map(|f| AudioFormat {
            format_id: f.format_id.clone(),
            container: f.ext.clone().unwrap_or_default(),
            audio_bitrate_kbps: f.abr.filter(|abr| abr.is_finite()),
            file_size_bytes: file_size(f),
        })
        .collect();

    NormalizedFormats {
        video_formats,
        audio_formats,
    }
}

impl MediaInfo {
    pub fn from_document(document: MetadataDocument) -> Self {
        let NormalizedFormats {
            video_formats,
            audio_formats,
        } = normalize(&document.formats);

        Self {
            title: document.title.unwrap_or_default(),
            thumbnail_url: document.thumbnail.unwrap_or_default(),
            video_formats,
            audio_formats,
        }
    }
}
