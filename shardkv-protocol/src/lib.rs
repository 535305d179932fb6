//! # shardkv-protocol
//!
//! The replication wire protocol: the two length-framed, CRC32C-checked
//! messages exchanged between a replication slave and its master.

pub mod error;
pub mod message;

pub use error::ProtocolError;
pub use message::{MasterResponse, SlaveRequest, MAX_FRAME_SIZE};
