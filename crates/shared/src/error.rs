use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    NotFound,
    Validation,
    RateLimited,
    Unavailable,
    Internal,
}

impl ErrorCode {
    pub fn from_http_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Unauthorized,
            404 => Self::NotFound,
            400 | 412 | 422 => Self::Validation,
            429 => Self::RateLimited,
            502..=504 => Self::Unavailable,
            _ => Self::Internal,
        }
    }
}

/// Error body returned by the realtime database REST endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreErrorBody {
    pub error: String,
}

#[derive(Debug, Error)]
#[error("{code:?} (http {status}): {message}")]
pub struct StoreException {
    pub code: ErrorCode,
    pub status: u16,
    pub message: String,
}

impl StoreException {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::from_http_status(status),
            status,
            message: message.into(),
        }
    }

    /// Builds the exception from a raw response body, falling back to the
    /// body text when it is not the `{"error": ...}` shape.
    pub fn from_body(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<StoreErrorBody>(body)
            .map(|parsed| parsed.error)
            .unwrap_or_else(|_| body.trim().to_string());
        Self::new(status, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_error_body_and_classifies_status() {
        let err = StoreException::from_body(401, r#"{"error":"Permission denied"}"#);
        assert_eq!(err.code, ErrorCode::Unauthorized);
        assert_eq!(err.message, "Permission denied");
    }

    #[test]
    fn keeps_raw_text_for_unstructured_bodies() {
        let err = StoreException::from_body(503, "  upstream unavailable\n");
        assert_eq!(err.code, ErrorCode::Unavailable);
        assert_eq!(err.message, "upstream unavailable");
    }
}
