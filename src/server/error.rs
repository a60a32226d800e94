use crate::media::{FailureKind, ToolError};
use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

const INFO_ERROR_LABEL: &str = "Failed to fetch info: ";
const BUSY_RETRY_AFTER_SECS: u64 = 5;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<&'static str>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    code: Option<&'static str>,
    hint: Option<&'static str>,
    retry_after_seconds: Option<u64>,
    plain_text: bool,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: None,
            hint: None,
            retry_after_seconds: None,
            plain_text: false,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn busy() -> Self {
        Self {
            code: Some("busy"),
            retry_after_seconds: Some(BUSY_RETRY_AFTER_SECS),
            ..Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "Too many conversions in progress. Please try again shortly.",
            )
        }
    }

    /// The download and convert endpoints answer with plain text.
    pub fn into_plain_text(mut self) -> Self {
        self.plain_text = true;
        self
    }

    /// `error` keeps the tool's stderr intact; `code` and `hint` are the
    /// best-effort classification on top of it.
    pub fn info_failure(error: ToolError) -> Self {
        if let ToolError::InvalidInput(message) = error {
            return Self::bad_request(message);
        }

        let kind = error.kind();
        Self {
            code: kind.map(FailureKind::code),
            hint: kind.and_then(friendly_hint),
            ..Self::internal(format!("{}{}", INFO_ERROR_LABEL, error))
        }
    }

    /// Failures before any byte was relayed, so a real status can still be sent.
    pub fn relay_failure(error: ToolError) -> Self {
        let api_error = match error {
            ToolError::InvalidInput(message) => Self::bad_request(message),
            other => Self {
                code: other.kind().map(FailureKind::code),
                ..Self::internal(format!("Failed to start transfer: {}", other))
            },
        };
        api_error.into_plain_text()
    }

    #[cfg(test)]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

fn friendly_hint(kind: FailureKind) -> Option<&'static str> {
    match kind {
        FailureKind::AccessDenied => {
            Some("Server IP blocked by YouTube. Please try again later or deploy locally.")
        }
        FailureKind::NotFound => Some("The video could not be found. Check the URL and try again."),
        FailureKind::Transient => Some("The video site did not respond in time. Please try again."),
        FailureKind::MalformedOutput | FailureKind::Other => None,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = if self.plain_text {
            (self.status, self.message).into_response()
        } else {
            let body = Json(ErrorBody {
                error: self.message,
                code: self.code,
                hint: self.hint,
            });
            (self.status, body).into_response()
        };

        if let Some(seconds) = self.retry_after_seconds {
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_failure_keeps_detail_and_adds_hint() {
        let error = ToolError::from_exit(b"ERROR: Sign in to confirm you're not a bot", "yt-dlp failed");
        let api_error = ApiError::info_failure(error);

        assert_eq!(api_error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            api_error.message,
            "Failed to fetch info: ERROR: Sign in to confirm you're not a bot"
        );
        assert_eq!(api_error.code, Some("access_denied"));
        assert!(api_error.hint.unwrap().contains("blocked"));
    }

    #[test]
    fn test_info_failure_invalid_input_is_bad_request() {
        let api_error = ApiError::info_failure(ToolError::InvalidInput("Invalid URL".to_string()));
        assert_eq!(api_error.status(), StatusCode::BAD_REQUEST);
        assert_eq!(api_error.hint, None);
    }

    #[test]
    fn test_busy_sets_retry_after() {
        let response = ApiError::busy().into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[RETRY_AFTER], "5");
    }

    #[test]
    fn test_relay_failure_is_plain_text() {
        let error = ToolError::Spawn {
            tool: "yt-dlp".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        let response = ApiError::relay_failure(error).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
    }
}
