//! WAL error types.

use thiserror::Error;

/// Errors that can occur during WAL operations.
#[derive(Debug, Error, Clone)]
pub enum WalError {
    #[error("I/O error: {0}")]
    Io(std::sync::Arc<std::io::Error>),

    #[error("record corrupted at offset {offset}: CRC mismatch (expected {expected:#x}, got {actual:#x})")]
    CorruptedRecord {
        offset: u64,
        expected: u32,
        actual: u32,
    },

    #[error("invalid record header at offset {offset}: {reason}")]
    InvalidHeader { offset: u64, reason: String },

    #[error("no segments found")]
    NoSegmentsFound,

    #[error("WAL is closed")]
    Closed,
}

impl From<std::io::Error> for WalError {
    fn from(e: std::io::Error) -> Self {
        WalError::Io(std::sync::Arc::new(e))
    }
}

impl WalError {
    /// Returns whether this error is worth retrying (transient I/O) versus
    /// a structural problem with the data itself.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WalError::Io(_))
    }
}
