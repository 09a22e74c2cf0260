//! Protocol error types with actionable suggestions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for protocol responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    BridgeDisconnected,
    DispatchFailed,
    InvalidInput,
    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::BridgeDisconnected => write!(f, "BRIDGE_DISCONNECTED"),
            ErrorCode::DispatchFailed => write!(f, "DISPATCH_FAILED"),
            ErrorCode::InvalidInput => write!(f, "INVALID_INPUT"),
            ErrorCode::InternalError => write!(f, "INTERNAL_ERROR"),
        }
    }
}

/// An error response carrying enough context to act on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    pub suggestion: Option<String>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (hint: {})", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn bridge_disconnected() -> Self {
        Self {
            code: ErrorCode::BridgeDisconnected,
            message: "Game bridge is not connected".to_string(),
            suggestion: Some(
                "Check that the client shim is running and the daemon was started with the right --bridge path".into(),
            ),
        }
    }

    /// Create a dispatch failure error with detail about what was being sent.
    pub fn dispatch_failed(detail: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::DispatchFailed,
            message: format!("Failed to deliver input to the client: {}", detail.into()),
            suggestion: Some(
                "The client window may have closed or the bridge dropped. Run 'huntpilot status' to check.".into(),
            ),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InvalidInput,
            message: message.into(),
            suggestion: Some("Check the command syntax and try again".into()),
        }
    }

    /// Create an invalid input error with a custom suggestion.
    pub fn invalid_input_with_suggestion(
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            code: ErrorCode::InvalidInput,
            message: message.into(),
            suggestion: Some(suggestion.into()),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::InternalError,
            message: message.into(),
            suggestion: Some("This is an internal error. Please report it if it persists.".into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every constructor must provide a suggestion; callers act on errors
    /// without access to daemon logs.
    fn assert_has_suggestion(err: &ApiError, context: &str) {
        assert!(
            err.suggestion.is_some(),
            "{} should have a suggestion, but got None",
            context
        );
    }

    #[test]
    fn test_bridge_disconnected_has_suggestion() {
        let err = ApiError::bridge_disconnected();
        assert_has_suggestion(&err, "bridge_disconnected");
        assert!(err.suggestion.as_ref().unwrap().contains("--bridge"));
    }

    #[test]
    fn test_dispatch_failed_has_suggestion() {
        let err = ApiError::dispatch_failed("channel closed");
        assert_has_suggestion(&err, "dispatch_failed");
        assert!(err.message.contains("channel closed"));
        assert!(err.suggestion.as_ref().unwrap().contains("status"));
    }

    #[test]
    fn test_invalid_input_has_suggestion() {
        let err = ApiError::invalid_input("bad argument");
        assert_has_suggestion(&err, "invalid_input");
    }

    #[test]
    fn test_invalid_input_with_custom_suggestion() {
        let err = ApiError::invalid_input_with_suggestion("unknown slot", "Slots are 0-9");
        assert_has_suggestion(&err, "invalid_input_with_suggestion");
        assert!(err.suggestion.as_ref().unwrap().contains("0-9"));
    }

    #[test]
    fn test_internal_has_suggestion() {
        let err = ApiError::internal("unexpected state");
        assert_has_suggestion(&err, "internal");
    }

    #[test]
    fn test_display_format_with_suggestion() {
        let err = ApiError::bridge_disconnected();
        let display = format!("{}", err);
        assert!(display.contains("[BRIDGE_DISCONNECTED]"));
        assert!(display.contains("(hint:"));
    }

    #[test]
    fn test_json_round_trip() {
        let err = ApiError::dispatch_failed("socket gone");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("DISPATCH_FAILED"));

        let back: ApiError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}
