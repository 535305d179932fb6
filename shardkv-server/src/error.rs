//! Server-side error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0}")]
    Storage(#[from] shardkv_storage::StorageError),

    #[error("WAL error: {0}")]
    Wal(#[from] shardkv_wal::WalError),

    #[error("protocol error: {0}")]
    Protocol(#[from] shardkv_protocol::ProtocolError),

    #[error("config error at {path}: {reason}")]
    Config { path: String, reason: String },
}
