//! Configuration loading.
//!
//! Order: start from `Config::default()`, deserialize the YAML file over it
//! (missing fields keep defaults), then apply environment variable
//! overrides (`SHARDKV_<SECTION>_<FIELD>`). Size/duration fields are stored
//! as strings (`"4KB"`, `"5m"`) and parsed through [`shardkv_core::parse`]
//! at load time.

use serde::{Deserialize, Serialize};
use shardkv_core::{parse_duration, parse_size};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unreadable config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config file {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid size/duration literal in {field}: {source}")]
    Literal {
        field: &'static str,
        #[source]
        source: shardkv_core::ParseError,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub network: NetworkConfig,
    pub logging: LoggingConfig,
    pub replication: ReplicationConfig,
    pub wal: WalSettingsConfig,
}

impl Config {
    /// Loads configuration from `path`, then applies environment overrides.
    ///
    /// `path_explicit` distinguishes an operator-specified `--config-path`
    /// from the CLI's own default: a missing file is fatal only when the
    /// path was explicitly given (§4.N); otherwise it silently falls back
    /// to defaults. A malformed (present but unparseable) file is always
    /// fatal.
    pub fn load(path: &Path, path_explicit: bool) -> Result<Self, ConfigError> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
                path: path.to_path_buf(),
                source,
            })?,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound && !path_explicit => {
                Self::default()
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        self.engine.apply_env_overrides();
        self.network.apply_env_overrides();
        self.logging.apply_env_overrides();
        self.replication.apply_env_overrides();
        self.wal.apply_env_overrides();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    #[serde(rename = "type")]
    pub engine_type: String,
    pub partitions_number: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine_type: "sharded".to_string(),
            partitions_number: shardkv_core::DEFAULT_PARTITIONS as u32,
        }
    }
}

impl EngineConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(n) = std::env::var("SHARDKV_ENGINE_PARTITIONS_NUMBER") {
            if let Ok(n) = n.parse() {
                self.partitions_number = n;
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub address: String,
    pub max_connections: usize,
    pub max_message_size: String,
    pub idle_timeout: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3223".to_string(),
            max_connections: 1000,
            max_message_size: "4KB".to_string(),
            idle_timeout: "5m".to_string(),
        }
    }
}

impl NetworkConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("SHARDKV_NETWORK_ADDRESS") {
            self.address = addr;
        }
        if let Ok(n) = std::env::var("SHARDKV_NETWORK_MAX_CONNECTIONS") {
            if let Ok(n) = n.parse() {
                self.max_connections = n;
            }
        }
        if let Ok(size) = std::env::var("SHARDKV_NETWORK_MAX_MESSAGE_SIZE") {
            self.max_message_size = size;
        }
        if let Ok(timeout) = std::env::var("SHARDKV_NETWORK_IDLE_TIMEOUT") {
            self.idle_timeout = timeout;
        }
    }

    pub fn max_message_size_bytes(&self) -> Result<u64, ConfigError> {
        parse_size(&self.max_message_size).map_err(|source| ConfigError::Literal {
            field: "network.max_message_size",
            source,
        })
    }

    pub fn idle_timeout_duration(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.idle_timeout).map_err(|source| ConfigError::Literal {
            field: "network.idle_timeout",
            source,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub output: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: "stdout".to_string(),
        }
    }
}

impl LoggingConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("SHARDKV_LOGGING_LEVEL") {
            self.level = level;
        }
        if let Ok(output) = std::env::var("SHARDKV_LOGGING_OUTPUT") {
            self.output = output;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplicaType {
    Master,
    Slave,
    Standalone,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    pub replica_type: ReplicaType,
    pub master_address: String,
    pub sync_interval: String,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            replica_type: ReplicaType::Standalone,
            master_address: String::new(),
            sync_interval: "5s".to_string(),
        }
    }
}

impl Default for ReplicaType {
    fn default() -> Self {
        ReplicaType::Standalone
    }
}

impl ReplicationConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(t) = std::env::var("SHARDKV_REPLICATION_REPLICA_TYPE") {
            self.replica_type = match t.to_lowercase().as_str() {
                "master" => ReplicaType::Master,
                "slave" => ReplicaType::Slave,
                _ => ReplicaType::Standalone,
            };
        }
        if let Ok(addr) = std::env::var("SHARDKV_REPLICATION_MASTER_ADDRESS") {
            self.master_address = addr;
        }
        if let Ok(interval) = std::env::var("SHARDKV_REPLICATION_SYNC_INTERVAL") {
            self.sync_interval = interval;
        }
    }

    pub fn sync_interval_duration(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.sync_interval).map_err(|source| ConfigError::Literal {
            field: "replication.sync_interval",
            source,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalSettingsConfig {
    pub flushing_batch_size: usize,
    pub flushing_batch_timeout: String,
    pub max_segment_size: String,
    pub data_directory: PathBuf,
}

impl Default for WalSettingsConfig {
    fn default() -> Self {
        Self {
            flushing_batch_size: 100,
            flushing_batch_timeout: "100ms".to_string(),
            max_segment_size: "4MB".to_string(),
            data_directory: PathBuf::from("./data/wal"),
        }
    }
}

impl WalSettingsConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(n) = std::env::var("SHARDKV_WAL_FLUSHING_BATCH_SIZE") {
            if let Ok(n) = n.parse() {
                self.flushing_batch_size = n;
            }
        }
        if let Ok(timeout) = std::env::var("SHARDKV_WAL_FLUSHING_BATCH_TIMEOUT") {
            self.flushing_batch_timeout = timeout;
        }
        if let Ok(size) = std::env::var("SHARDKV_WAL_MAX_SEGMENT_SIZE") {
            self.max_segment_size = size;
        }
        if let Ok(dir) = std::env::var("SHARDKV_WAL_DATA_DIRECTORY") {
            self.data_directory = PathBuf::from(dir);
        }
    }

    pub fn to_wal_settings(&self) -> Result<shardkv_wal::Settings, ConfigError> {
        Ok(shardkv_wal::Settings {
            max_segment_size: parse_size(&self.max_segment_size).map_err(|source| {
                ConfigError::Literal {
                    field: "wal.max_segment_size",
                    source,
                }
            })?,
            flushing_batch_size: self.flushing_batch_size,
            flushing_batch_timeout: parse_duration(&self.flushing_batch_timeout).map_err(
                |source| ConfigError::Literal {
                    field: "wal.flushing_batch_timeout",
                    source,
                },
            )?,
            data_directory: self.data_directory.clone(),
        })
    }
}
