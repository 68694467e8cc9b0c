use thiserror::Error;

/// Type alias for Result with ReplyDeskError
pub type Result<T> = std::result::Result<T, ReplyDeskError>;

/// Error types for the reply-desk client
#[derive(Error, Debug)]
pub enum ReplyDeskError {
    /// Backend returned a non-success status we have no better mapping for
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Missing, expired or rejected access token (401)
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Authenticated but not allowed (403)
    #[error("Access forbidden: {0}")]
    Forbidden(String),

    /// Bad parameters, rejected either locally or by the backend (400/422)
    #[error("Validation failed: {0}")]
    ValidationError(String),

    /// Mutating a draft that is already sent or discarded (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded (429)
    #[error("Rate limit exceeded, retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    /// Server returned 5xx error
    #[error("Server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    /// Network-related error (connection issues, DNS, TLS)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request exceeded the configured timeout
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Switching the selected draft would drop unsaved edits
    #[error("Unsaved edits on draft {0}")]
    UnsavedEdits(String),

    /// IO error (config and session files)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ReplyDeskError {
    /// Check if the error is transient (a manual retry may succeed)
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ReplyDeskError::RateLimitExceeded { .. }
                | ReplyDeskError::ServerError { .. }
                | ReplyDeskError::NetworkError(_)
                | ReplyDeskError::Timeout(_)
        )
    }

    /// Check if the error is permanent and should not be retried
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Map an HTTP status and response body onto the error taxonomy
    pub fn from_status(status: u16, body: &str, retry_after: Option<u64>) -> Self {
        let message = extract_error_message(body).unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("HTTP {}", status)
            } else {
                body.trim().to_string()
            }
        });

        match status {
            400 | 422 => ReplyDeskError::ValidationError(message),
            401 => ReplyDeskError::AuthError(message),
            403 => ReplyDeskError::Forbidden(message),
            404 => ReplyDeskError::NotFound(message),
            409 => ReplyDeskError::Conflict(message),
            429 => ReplyDeskError::RateLimitExceeded {
                retry_after: retry_after.unwrap_or(DEFAULT_RETRY_AFTER),
            },
            500..=599 => ReplyDeskError::ServerError { status, message },
            _ => ReplyDeskError::ApiError { status, message },
        }
    }
}

const DEFAULT_RETRY_AFTER: u64 = 5;

/// Pull `error` or `message` out of a JSON error body
fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .or_else(|| value.get("message"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

impl From<reqwest::Error> for ReplyDeskError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return ReplyDeskError::NetworkError(format!("Request timed out: {}", error));
        }
        if error.is_decode() {
            return ReplyDeskError::ApiError {
                status: error.status().map(|s| s.as_u16()).unwrap_or(200),
                message: format!("Failed to decode response: {}", error),
            };
        }
        if let Some(status) = error.status() {
            return ReplyDeskError::from_status(status.as_u16(), &error.to_string(), None);
        }
        ReplyDeskError::NetworkError(error.to_string())
    }
}
