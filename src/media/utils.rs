use super::error::ToolError;
use super::types::MediaKind;

const DEFAULT_BASE_NAME: &str = "download";

/// Rejects input that must never reach the tool's argument list.
///
/// Bare video ids and extractor prefixes (`ytsearch:`) are passed through, but
/// anything that parses as a URL has to be http(s).
pub fn validate_url(raw: &str) -> Result<&str, ToolError> {
    let url = raw.trim();

    if url.is_empty() {
        return Err(ToolError::InvalidInput("Invalid URL".to_string()));
    }

    // yt-dlp would read this as an option
    if url.starts_with('-') {
        return Err(ToolError::InvalidInput(format!("Invalid URL: {}", url)));
    }

    if let Ok(parsed) = url::Url::parse(url) {
        if url.contains("://") && !matches!(parsed.scheme(), "http" | "https") {
            return Err(ToolError::InvalidInput(format!(
                "Unsupported URL scheme: {}",
                parsed.scheme()
            )));
        }
    }

    Ok(url)
}

/// Keeps ASCII letters, digits, whitespace, `-` and `.`; everything else
/// becomes `_` and runs of `_` collapse to one.
pub fn sanitize_filename(title: &str) -> String {
    let mut sanitized = String::with_capacity(title.len());

    for c in title.chars() {
        let mapped = if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
            c
        } else if c.is_whitespace() {
            // header values cannot carry CR/LF or tabs
            ' '
        } else {
            '_'
        };

        if mapped == '_' && sanitized.ends_with('_') {
            continue;
        }
        sanitized.push(mapped);
    }

    sanitized
}

pub fn download_filename(title: Option<&str>, kind: MediaKind) -> String {
    attachment_filename(title, DEFAULT_BASE_NAME, kind.extension())
}

pub fn attachment_filename(title: Option<&str>, default_base: &str, extension: &str) -> String {
    let base = match title.filter(|t| !t.is_empty()) {
        Some(title) => sanitize_filename(title),
        None => default_base.to_string(),
    };
    format!("{}.{}", base, extension)
}

pub fn content_disposition(filename: &str) -> String {
    format!("attachment; filename=\"{}\"", filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_safe(name: &str) -> bool {
        name.chars()
            .all(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || c == '-' || c == '.' || c == '_')
            && !name.contains("__")
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Hello World"), "Hello World");
        assert_eq!(sanitize_filename("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_filename("Rick Astley - Never (Official)"), "Rick Astley - Never _Official_");
        assert_eq!(sanitize_filename("wow!!!???"), "wow_");
        assert_eq!(sanitize_filename("a__b"), "a_b");
        assert_eq!(sanitize_filename("ÄÖÜ music"), "_ music");
        assert_eq!(sanitize_filename("line\nbreak\ttab"), "line break tab");
    }

    #[test]
    fn test_sanitize_filename_property() {
        let titles = [
            "",
            "___",
            "\"quoted\"; filename=evil",
            "日本語のタイトル 1080p (Premium)",
            "emoji 🎵🎶 mix",
            "v1.2-final",
            "%00%0d%0a",
            "tab\there",
        ];

        for title in titles {
            let name = sanitize_filename(title);
            assert!(is_safe(&name), "{:?} -> {:?}", title, name);
            assert!(!name.contains('"'));
            assert!(!name.contains('\n') && !name.contains('\r'));
        }
    }

    #[test]
    fn test_download_filename_defaults() {
        assert_eq!(download_filename(None, MediaKind::Audio), "download.mp3");
        assert_eq!(download_filename(Some(""), MediaKind::Video), "download.mp4");
        assert_eq!(
            download_filename(Some("My Clip (1080p)"), MediaKind::Video),
            "My Clip _1080p_.mp4"
        );
    }

    #[test]
    fn test_content_disposition() {
        assert_eq!(
            content_disposition("song.mp3"),
            "attachment; filename=\"song.mp3\""
        );
    }

    #[test]
    fn test_validate_url() {
        assert_eq!(
            validate_url("  https://www.youtube.com/watch?v=dQw4w9WgXcQ ").unwrap(),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert_eq!(validate_url("dQw4w9WgXcQ").unwrap(), "dQw4w9WgXcQ");
        assert_eq!(validate_url("ytsearch:lofi").unwrap(), "ytsearch:lofi");
        assert!(validate_url("").is_err());
        assert!(validate_url("   ").is_err());
        assert!(validate_url("--exec=rm -rf /").is_err());
        assert!(validate_url("file:///etc/passwd").is_err());
        assert!(validate_url("ftp://example.com/a.mp4").is_err());
    }
}
