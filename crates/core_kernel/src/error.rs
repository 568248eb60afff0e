//! Core error types used across the system

use thiserror::Error;

/// Core error type for the kernel
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A pagination cursor could not be decoded
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    /// A pagination cursor could not be encoded
    #[error("Cursor encoding failed: {0}")]
    CursorEncoding(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation(message.into())
    }

    pub fn invalid_cursor(message: impl Into<String>) -> Self {
        CoreError::InvalidCursor(message.into())
    }
}
