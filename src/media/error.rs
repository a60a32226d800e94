use std::fmt;
use thiserror::Error;

/// Best-effort category of a failed tool run.
///
/// Derived from stderr text, so it is a hint and never a reliable classifier:
/// yt-dlp has no stable error codes and the set below is not exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NotFound,
    AccessDenied,
    Transient,
    MalformedOutput,
    Other,
}

impl FailureKind {
    pub fn classify(stderr: &str) -> Self {
        let lower = stderr.to_ascii_lowercase();

        if lower.contains("sign in to confirm")
            || lower.contains("private video")
            || lower.contains("members-only")
            || lower.contains("http error 403")
            || lower.contains("age-restricted")
        {
            FailureKind::AccessDenied
        } else if lower.contains("video unavailable")
            || lower.contains("http error 404")
            || lower.contains("unsupported url")
            || lower.contains("does not exist")
        {
            FailureKind::NotFound
        } else if lower.contains("timed out")
            || lower.contains("http error 429")
            || lower.contains("http error 5")
            || lower.contains("connection reset")
            || lower.contains("temporary failure")
        {
            FailureKind::Transient
        } else {
            FailureKind::Other
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            FailureKind::NotFound => "not_found",
            FailureKind::AccessDenied => "access_denied",
            FailureKind::Transient => "transient_failure",
            FailureKind::MalformedOutput => "malformed_output",
            FailureKind::Other => "tool_failure",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// Non-zero exit; `detail` is the tool's stderr verbatim.
    #[error("{detail}")]
    Exit { kind: FailureKind, detail: String },

    #[error("malformed tool output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{tool} did not finish within {secs}s")]
    Timeout { tool: String, secs: u64 },
}

impl ToolError {
    pub fn from_exit(stderr: &[u8], fallback: &str) -> Self {
        let text = String::from_utf8_lossy(stderr);
        let detail = if text.trim().is_empty() {
            fallback.to_string()
        } else {
            text.into_owned()
        };

        ToolError::Exit {
            kind: FailureKind::classify(&detail),
            detail,
        }
    }

    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            ToolError::InvalidInput(_) => None,
            ToolError::Spawn { .. } => Some(FailureKind::Other),
            ToolError::Exit { kind, .. } => Some(*kind),
            ToolError::Parse(_) => Some(FailureKind::MalformedOutput),
            ToolError::Timeout { .. } => Some(FailureKind::Transient),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_sign_in_challenge() {
        let stderr = "ERROR: [youtube] dQw4w9WgXcQ: Sign in to confirm you're not a bot.";
        assert_eq!(FailureKind::classify(stderr), FailureKind::AccessDenied);
    }

    #[test]
    fn test_classify_other_categories() {
        assert_eq!(
            FailureKind::classify("ERROR: [youtube] abc: Video unavailable"),
            FailureKind::NotFound
        );
        assert_eq!(
            FailureKind::classify("ERROR: Unable to download webpage: HTTP Error 429: Too Many Requests"),
            FailureKind::Transient
        );
        assert_eq!(FailureKind::classify("something odd"), FailureKind::Other);
    }

    #[test]
    fn test_from_exit_keeps_stderr_verbatim() {
        let err = ToolError::from_exit(b"ERROR: Sign in to confirm you're not a bot\n", "yt-dlp failed");
        assert_eq!(err.to_string(), "ERROR: Sign in to confirm you're not a bot\n");
        assert_eq!(err.kind(), Some(FailureKind::AccessDenied));
    }

    #[test]
    fn test_from_exit_empty_stderr_uses_fallback() {
        let err = ToolError::from_exit(b"  \n", "yt-dlp failed");
        assert_eq!(err.to_string(), "yt-dlp failed");
        assert_eq!(err.kind(), Some(FailureKind::Other));
    }

    #[test]
    fn test_parse_error_kind() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = ToolError::from(json_err);
        assert_eq!(err.kind(), Some(FailureKind::MalformedOutput));
        assert!(err.to_string().starts_with("malformed tool output"));
    }
}
