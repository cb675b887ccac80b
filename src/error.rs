//! Error handling for sigstream-rs
//!
//! This module defines the crate error type and a Result alias. Only
//! construction-time configuration and transport calls return these errors;
//! the streaming engine itself reports runtime failures through its state and
//! status string instead of propagating them.

use thiserror::Error;

/// Main error type for sigstream-rs operations
#[derive(Error, Debug)]
pub enum StreamError {
    /// A ring buffer was requested with zero capacity
    #[error("Invalid capacity: ring buffers need at least one slot")]
    InvalidCapacity,

    /// Errors related to parser or engine configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic transport failure (read error, device gone, ...)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The transport's device or file does not exist
    #[error("Transport not found: {0}")]
    NotFound(String),

    /// The transport exists but could not be opened
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Timeout errors
    #[error("Timeout: {0}")]
    Timeout(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<StreamError>,
    },
}

impl StreamError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        StreamError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Map an I/O error from opening a device or file onto the transport fault taxonomy
    pub fn from_open_error(target: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => StreamError::NotFound(target.to_string()),
            std::io::ErrorKind::PermissionDenied => {
                StreamError::AccessDenied(format!("{}: {}", target, err))
            }
            _ => StreamError::Transport(format!("{}: {}", target, err)),
        }
    }
}

/// Result type alias for sigstream-rs operations
pub type Result<T> = std::result::Result<T, StreamError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StreamError::Config("channel_count must be positive".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: channel_count must be positive"
        );
    }

    #[test]
    fn test_error_with_context() {
        let err = StreamError::Transport("pipe stalled".to_string());
        let with_ctx = err.with_context("Failed to read chunk");
        assert!(with_ctx.to_string().contains("Failed to read chunk"));
        assert!(with_ctx.to_string().contains("pipe stalled"));
    }

    #[test]
    fn test_open_error_mapping() {
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(
            StreamError::from_open_error("/dev/ttyUSB9", missing),
            StreamError::NotFound(_)
        ));

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err = StreamError::from_open_error("/dev/ttyUSB0", denied);
        assert!(matches!(err, StreamError::AccessDenied(_)));
        assert!(err.to_string().contains("/dev/ttyUSB0"));
    }
}
