//! # shardkv-server
//!
//! The TCP front end: the textual client protocol's request parser and
//! dispatcher, the connection-bounding semaphore, the accept loop, config
//! loading, and the replication master/slave tasks.

pub mod config;
pub mod error;
pub mod framing;
pub mod handler;
pub mod parser;
pub mod replication;
pub mod semaphore;
pub mod server;

pub use config::Config;
pub use error::ServerError;
pub use semaphore::ConnectionSemaphore;
