/// Error taxonomy shared by every Tab Organizer operation
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

use crate::timing::now_ms;

/// Stable error codes. The string form is what crosses the message boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Host API errors
    TabNotFound,
    TabAccessDenied,
    ChromeApiError,

    // Extension errors
    ConfigLoadFailed,
    StatsLoadFailed,
    BookmarkSearchFailed,

    // Operation errors
    SortOperationFailed,
    GroupOperationFailed,
    BatchOperationFailed,

    // Input errors
    ValidationError,

    // Runtime errors
    RuntimeError,
    PermissionDenied,
    UnknownError,
}

/// Coarse classification of an [`ErrorCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The host denied or failed a call
    Capability,
    /// Malformed input
    Validation,
    /// A sort/group/batch operation failed partway
    Operation,
    /// Anything unexpected
    Runtime,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::TabNotFound => "TAB_NOT_FOUND",
            ErrorCode::TabAccessDenied => "TAB_ACCESS_DENIED",
            ErrorCode::ChromeApiError => "CHROME_API_ERROR",
            ErrorCode::ConfigLoadFailed => "CONFIG_LOAD_FAILED",
            ErrorCode::StatsLoadFailed => "STATS_LOAD_FAILED",
            ErrorCode::BookmarkSearchFailed => "BOOKMARK_SEARCH_FAILED",
            ErrorCode::SortOperationFailed => "SORT_OPERATION_FAILED",
            ErrorCode::GroupOperationFailed => "GROUP_OPERATION_FAILED",
            ErrorCode::BatchOperationFailed => "BATCH_OPERATION_FAILED",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::RuntimeError => "RUNTIME_ERROR",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorCode::TabNotFound
            | ErrorCode::TabAccessDenied
            | ErrorCode::ChromeApiError
            | ErrorCode::PermissionDenied
            | ErrorCode::ConfigLoadFailed
            | ErrorCode::StatsLoadFailed
            | ErrorCode::BookmarkSearchFailed => ErrorCategory::Capability,
            ErrorCode::ValidationError => ErrorCategory::Validation,
            ErrorCode::SortOperationFailed
            | ErrorCode::GroupOperationFailed
            | ErrorCode::BatchOperationFailed => ErrorCategory::Operation,
            ErrorCode::RuntimeError | ErrorCode::UnknownError => ErrorCategory::Runtime,
        }
    }

    /// Short message suitable for a toast. Never contains diagnostic detail.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorCode::TabNotFound => "Tab not found",
            ErrorCode::TabAccessDenied => "Cannot access tab",
            ErrorCode::ChromeApiError => "Browser API error",
            ErrorCode::ConfigLoadFailed => "Failed to load settings",
            ErrorCode::StatsLoadFailed => "Failed to load statistics",
            ErrorCode::BookmarkSearchFailed => "Bookmark search failed",
            ErrorCode::SortOperationFailed => "Sort failed",
            ErrorCode::GroupOperationFailed => "Grouping failed",
            ErrorCode::BatchOperationFailed => "Batch operation failed",
            ErrorCode::ValidationError => "Invalid input",
            ErrorCode::RuntimeError => "Runtime error",
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::UnknownError => "Unknown error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error with a stable code, a readable message and diagnostic context.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("[{code}] {message}")]
pub struct ExtensionError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Value>,
    pub timestamp: f64,
}

impl ExtensionError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ExtensionError {
            code,
            message: message.into(),
            context: Map::new(),
            timestamp: now_ms(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    /// Wrap a failure reported by the host browser.
    pub fn host(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ChromeApiError, message)
    }

    /// Attach one context entry. Later entries with the same key win.
    pub fn with_context(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }

    /// Re-label an error raised by a lower layer, keeping its context.
    pub fn recode(mut self, code: ErrorCode) -> Self {
        let original = self.code;
        self.code = code;
        self.context
            .entry("originalCode")
            .or_insert_with(|| Value::from(original.as_str()));
        self
    }

    pub fn user_message(&self) -> &'static str {
        self.code.user_message()
    }

    /// Diagnostic log line. The user only ever sees [`Self::user_message`].
    pub fn log(&self, prefix: &str) {
        log::error!(
            "{} [{}]: {} context={}",
            prefix,
            self.code,
            self.message,
            Value::Object(self.context.clone())
        );
    }
}

impl From<serde_json::Error> for ExtensionError {
    fn from(err: serde_json::Error) -> Self {
        ExtensionError::validation(format!("Malformed JSON: {}", err))
    }
}

/// Reject non-positive tab ids. Returns the ids that survive, failing only if none do.
pub fn validate_tab_ids(ids: &[i32]) -> Result<Vec<i32>, ExtensionError> {
    let valid: Vec<i32> = ids.iter().copied().filter(|id| *id > 0).collect();
    if valid.is_empty() {
        return Err(ExtensionError::validation("No valid tab ids")
            .with_context("tabIds", ids.to_vec()));
    }
    if valid.len() < ids.len() {
        log::warn!("Dropped {} invalid tab ids", ids.len() - valid.len());
    }
    Ok(valid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_serializes_as_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorCode::SortOperationFailed).unwrap();
        assert_eq!(json, "\"SORT_OPERATION_FAILED\"");
        assert_eq!(ErrorCode::SortOperationFailed.to_string(), "SORT_OPERATION_FAILED");
    }

    #[test]
    fn test_categories() {
        assert_eq!(ErrorCode::TabNotFound.category(), ErrorCategory::Capability);
        assert_eq!(ErrorCode::ValidationError.category(), ErrorCategory::Validation);
        assert_eq!(ErrorCode::BatchOperationFailed.category(), ErrorCategory::Operation);
        assert_eq!(ErrorCode::UnknownError.category(), ErrorCategory::Runtime);
    }

    #[test]
    fn test_display_and_context() {
        let err = ExtensionError::host("move rejected")
            .with_context("tabId", 7)
            .recode(ErrorCode::SortOperationFailed);

        assert_eq!(err.to_string(), "[SORT_OPERATION_FAILED] move rejected");
        assert_eq!(err.context.get("tabId"), Some(&Value::from(7)));
        assert_eq!(
            err.context.get("originalCode"),
            Some(&Value::from("CHROME_API_ERROR"))
        );
        assert_eq!(err.user_message(), "Sort failed");
    }

    #[test]
    fn test_validate_tab_ids() {
        assert_eq!(validate_tab_ids(&[3, -1, 0, 5]).unwrap(), vec![3, 5]);

        let err = validate_tab_ids(&[0, -4]).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        assert!(validate_tab_ids(&[]).is_err());
    }
}
