use serde::Deserialize;
use thiserror::Error;

/// Classified failure of a request against the staffdesk API.
///
/// Cloneable so a single outcome can be handed to every subscriber of a
/// cached resource.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Authentication required. Please log in again.")]
    AuthenticationRequired,

    #[error("Access denied. You do not have permission for this action.")]
    Forbidden,

    #[error("Resource not found.")]
    NotFound,

    #[error("Server error ({0}). Please try again later.")]
    ServerError(u16),

    #[error("Invalid response format: {0}")]
    MalformedResponse(String),

    #[error("Network error: {0}. Please check your connection.")]
    NetworkError(String),

    #[error("{0}")]
    ValidationError(String),
}

/// How a UI should present a failure to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Login,
    Retry,
    Denied,
    /// Bad input, missing resource or unreadable response
    Invalid,
}

impl ErrorCategory {
    pub fn hint(&self) -> &'static str {
        match self {
            ErrorCategory::Login => "Please log in.",
            ErrorCategory::Retry => "Try again later.",
            ErrorCategory::Denied => "You are not permitted to do that.",
            ErrorCategory::Invalid => "Check the request and try again.",
        }
    }
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Shapes the backend uses for error bodies
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<String>,
    error: Option<String>,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Pull a human-readable message out of an error body.
    ///
    /// Checks `detail`, then `error`, then the first message of a
    /// field-error map such as `{"name": ["This field is required."]}`.
    fn detail_message(body: &str) -> Option<String> {
        if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
            if let Some(msg) = parsed.detail.or(parsed.error) {
                return Some(msg);
            }
        }

        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        let (field, messages) = value.as_object()?.iter().next()?;
        let first = match messages {
            serde_json::Value::Array(items) => items.first()?.as_str()?.to_string(),
            serde_json::Value::String(s) => s.clone(),
            _ => return None,
        };
        if field == "non_field_errors" {
            Some(first)
        } else {
            Some(format!("{}: {}", field, first))
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            401 => ApiError::AuthenticationRequired,
            403 => ApiError::Forbidden,
            404 => ApiError::NotFound,
            code @ 500..=599 => ApiError::ServerError(code),
            code @ 400..=499 => {
                let message = Self::detail_message(body)
                    .map(|m| Self::truncate_body(&m))
                    .unwrap_or_else(|| format!("Request failed with status {}", code));
                ApiError::ValidationError(message)
            }
            code => ApiError::MalformedResponse(format!("Unexpected status {}", code)),
        }
    }

    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::MalformedResponse(err.to_string())
        } else {
            ApiError::NetworkError(err.to_string())
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ApiError::AuthenticationRequired => ErrorCategory::Login,
            ApiError::ServerError(_) | ApiError::NetworkError(_) => ErrorCategory::Retry,
            ApiError::Forbidden => ErrorCategory::Denied,
            ApiError::NotFound | ApiError::MalformedResponse(_) | ApiError::ValidationError(_) => {
                ErrorCategory::Invalid
            }
        }
    }

    /// Network and server failures say nothing about the credential.
    pub fn is_transient(&self) -> bool {
        self.category() == ErrorCategory::Retry
    }

    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, ApiError::AuthenticationRequired)
    }
}
