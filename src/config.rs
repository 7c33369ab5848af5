//! Cluster configuration files.
//!
//! A cluster is described by `$KBRIDGE_HOME/clusters/<name>.toml`:
//!
//! ```toml
//! [kafka]
//! "bootstrap.servers" = "localhost:9092"
//!
//! [schema_registry]
//! url = "http://localhost:8081"
//! basic_auth_user_info = "user:password"
//!
//! [session]
//! timeout = "1s"
//! flush_num_messages = 10000
//! flush_timeout = "30s"
//! auto_offset_reset = "earliest"
//! enable_auto_commit = true
//! session_timeout_ms = 10000
//! progress_num_messages = 1000
//! protoc = false
//! ```
//!
//! Only `[kafka]` is required.

pub mod duration;

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the directory that holds `clusters/`.
pub const HOME_ENV: &str = "KBRIDGE_HOME";

/// Directory holding `clusters/`, from `KBRIDGE_HOME` or the working directory.
pub fn home_dir() -> PathBuf {
    std::env::var_os(HOME_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Path of the config file for cluster `name` under `home`.
pub fn cluster_config_path(home: &Path, name: &str) -> PathBuf {
    home.join("clusters").join(format!("{name}.toml"))
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClusterConfig {
    /// Raw librdkafka properties, passed through to consumer and producer.
    pub kafka: BTreeMap<String, toml::Value>,
    #[serde(default)]
    pub schema_registry: Option<SchemaRegistryConfig>,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SchemaRegistryConfig {
    pub url: String,
    #[serde(default)]
    pub basic_auth_user_info: Option<String>,
}

/// Per-cluster behavior of consume and produce calls.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long a single consume call waits for a batch.
    #[serde(deserialize_with = "duration::deserialize")]
    pub timeout: Duration,
    /// Flush the producer every this many produced messages.
    pub flush_num_messages: usize,
    /// Upper bound for a single producer flush.
    #[serde(deserialize_with = "duration::deserialize")]
    pub flush_timeout: Duration,
    pub auto_offset_reset: String,
    pub enable_auto_commit: bool,
    pub session_timeout_ms: u32,
    /// Log progress every this many messages.
    pub progress_num_messages: usize,
    /// Compile protobuf schemas with an external `protoc` instead of the
    /// built-in parser.
    pub protoc: bool,
    pub protoc_path: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(1),
            flush_num_messages: 10000,
            flush_timeout: Duration::from_secs(30),
            auto_offset_reset: "earliest".to_string(),
            enable_auto_commit: true,
            session_timeout_ms: 10000,
            progress_num_messages: 1000,
            protoc: false,
            protoc_path: None,
        }
    }
}

impl ClusterConfig {
    /// Load `clusters/<name>.toml` under `home`.
    pub fn load(home: &Path, name: &str) -> Result<Self> {
        let path = cluster_config_path(home, name);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!(
                "Failed to read cluster config {}: {e}",
                path.display()
            ))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ClusterConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.kafka.contains_key("bootstrap.servers") {
            return Err(Error::Config(
                "[kafka] must set \"bootstrap.servers\"".to_string(),
            ));
        }
        match self.session.auto_offset_reset.as_str() {
            "earliest" | "latest" => {}
            other => {
                return Err(Error::Config(format!(
                    "auto_offset_reset must be \"earliest\" or \"latest\", got \"{other}\""
                )))
            }
        }
        if self.session.flush_num_messages == 0 || self.session.progress_num_messages == 0 {
            return Err(Error::Config(
                "flush_num_messages and progress_num_messages must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// `[kafka]` as string properties. TOML numbers and booleans are rendered
    /// the way librdkafka expects them.
    pub fn kafka_properties(&self) -> BTreeMap<String, String> {
        self.kafka
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    toml::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect()
    }
}
