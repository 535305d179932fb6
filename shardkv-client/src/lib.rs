//! # shardkv-client
//!
//! A minimal line-oriented client for shardkv's text protocol.

pub mod client;
pub mod error;

pub use client::Client;
pub use error::ClientError;
