//! Storage façade error types.

use thiserror::Error;

/// Errors from the storage façade: role enforcement and the underlying WAL.
#[derive(Debug, Error, Clone)]
pub enum StorageError {
    #[error("unable to execute set command on slave")]
    SetOnSlave,

    #[error("unable to execute delete command on slave")]
    DeleteOnSlave,

    #[error("WAL error: {0}")]
    Wal(#[from] shardkv_wal::WalError),
}
