//! # shardkv-wal
//!
//! Write-ahead log implementation for shardkv.
//!
//! This crate provides:
//! - Segment file management (`wal_<unix_millis>.log`, fsync-on-append)
//! - A binary `Request` record codec (`{command, args}`, CRC32C-checked)
//! - A group-commit batcher in front of it, flushing by size or timeout

pub mod error;
pub mod request;
pub mod segment;
pub mod wal;

pub use error::WalError;
pub use request::{decode_all, encode_batch, Command, Request};
pub use segment::{
    parse_segment_filename, read_segment, segment_filename, segment_last, segment_next,
    write_segment,
};
pub use wal::{LogsManager, Settings, Wal, DEFAULT_SEGMENT_SIZE};
