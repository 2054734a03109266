//! Error types for the statement bridge
//!
//! Every failure surfaces through one flat error kind carrying a human-readable
//! message and the native numeric code. Failures that originate in the bridge
//! itself (placeholder resolution, cursor state, configuration) carry code `0`.

use super::native::NativeError;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Code carried by failures raised by the bridge rather than the native driver
pub const BRIDGE_ERROR_CODE: i32 = 0;

/// The single typed error raised in exception mode and on construction failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("[{code}] {message}")]
pub struct DatabaseError {
    message: String,
    code: i32,
}

impl DatabaseError {
    /// Create an error with an explicit native code
    pub fn new<S: Into<String>>(message: S, code: i32) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }

    /// Create a bridge-level (logical) error
    pub fn logical<S: Into<String>>(message: S) -> Self {
        Self::new(message, BRIDGE_ERROR_CODE)
    }

    /// Create an error for a malformed or unsupported connection string
    pub fn invalid_connection_string<S: AsRef<str>>(detail: S) -> Self {
        Self::logical(format!("Invalid connection string: {}", detail.as_ref()))
    }

    /// Create an error for a rejected configuration value
    pub fn invalid_config<S: AsRef<str>>(detail: S) -> Self {
        Self::logical(format!("Invalid configuration: {}", detail.as_ref()))
    }

    /// Create a transaction state error
    pub fn transaction<S: AsRef<str>>(detail: S) -> Self {
        Self::logical(format!("Transaction error: {}", detail.as_ref()))
    }

    /// Human-readable message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Native numeric code (`0` for bridge-level failures)
    pub fn code(&self) -> i32 {
        self.code
    }

    /// Whether the error was produced by the native driver
    pub fn is_native(&self) -> bool {
        self.code != BRIDGE_ERROR_CODE
    }
}

/// Snapshot of the last failure, as returned by `error_info`
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct ErrorInfo {
    /// Native numeric code; `0` when there was no failure or it was bridge-level
    pub code: i32,
    pub message: String,
}

impl ErrorInfo {
    pub fn is_ok(&self) -> bool {
        self.code == BRIDGE_ERROR_CODE && self.message.is_empty()
    }
}

impl From<&DatabaseError> for ErrorInfo {
    fn from(err: &DatabaseError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
        }
    }
}

impl From<NativeError> for DatabaseError {
    fn from(err: NativeError) -> Self {
        Self::new(err.message, err.code)
    }
}

impl From<serde_json::Error> for DatabaseError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = DatabaseError::new("Table 'x' doesn't exist", 1146);
        assert_eq!(err.code(), 1146);
        assert!(err.is_native());

        let err = DatabaseError::logical("Unknown placeholder :missing");
        assert_eq!(err.code(), BRIDGE_ERROR_CODE);
        assert!(!err.is_native());
    }

    #[test]
    fn test_error_display() {
        let err = DatabaseError::new("no such table: t", 1);
        assert_eq!(err.to_string(), "[1] no such table: t");

        let err = DatabaseError::invalid_connection_string("unknown scheme 'pgsql'");
        assert_eq!(
            err.to_string(),
            "[0] Invalid connection string: unknown scheme 'pgsql'"
        );
    }

    #[test]
    fn test_from_native() {
        let err: DatabaseError = NativeError::new(19, "UNIQUE constraint failed").into();
        assert_eq!(err.code(), 19);
        assert_eq!(err.message(), "UNIQUE constraint failed");

        let info = ErrorInfo::from(&err);
        assert_eq!(info.code, 19);
        assert!(!info.is_ok());
        assert!(ErrorInfo::default().is_ok());
    }
}
