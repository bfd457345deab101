//! Configuration for s3local

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::ServiceDefinition;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct S3LocalConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub reload: ReloadConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    #[serde(default)]
    pub service: ServiceDefinition,
}

impl S3LocalConfig {
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::Configuration(format!("Failed to read config {:?}: {}", path, e))
        })?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content)
            .map_err(|e| crate::Error::Configuration(format!("Failed to parse config: {}", e)))
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from `S3LOCAL_*` environment variables
    pub fn apply_env(&mut self) {
        if let Ok(addr) = std::env::var("S3LOCAL_ADDRESS") {
            self.server.address = addr;
        }
        if let Ok(port) = std::env::var("S3LOCAL_PORT") {
            if let Ok(p) = port.parse() {
                self.server.port = p;
            }
        }
        if let Ok(dir) = std::env::var("S3LOCAL_DIRECTORY") {
            self.storage.directory = PathBuf::from(dir);
        }
        if let Ok(endpoint) = std::env::var("S3LOCAL_INVOKE_ENDPOINT") {
            self.dispatch.invoke_endpoint = Some(endpoint);
        }
        if let Ok(secs) = std::env::var("S3LOCAL_INVOKE_TIMEOUT_SECS") {
            if let Ok(s) = secs.parse() {
                self.dispatch.invoke_timeout_secs = s;
            }
        }
        if let Ok(level) = std::env::var("S3LOCAL_LOG_LEVEL") {
            self.logging.level = level;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: crate::DEFAULT_ADDRESS.to_string(),
            port: crate::DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub directory: PathBuf,
    /// Buckets created in addition to those the service declares
    pub buckets: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(crate::DEFAULT_DIRECTORY),
            buckets: Vec::new(),
        }
    }
}

/// Handler invocation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Base URL of a Lambda-invoke compatible endpoint
    pub invoke_endpoint: Option<String>,
    pub invoke_timeout_secs: u64,
    /// Abort registry building on the first bad declaration
    pub fail_fast: bool,
    pub region: String,
    pub principal_id: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            invoke_endpoint: None,
            invoke_timeout_secs: 30,
            fail_fast: false,
            region: crate::DEFAULT_REGION.to_string(),
            principal_id: crate::DEFAULT_PRINCIPAL_ID.to_string(),
        }
    }
}

impl DispatchConfig {
    pub fn invoke_timeout(&self) -> Duration {
        Duration::from_secs(self.invoke_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReloadConfig {
    pub enabled: bool,
    pub interval_ms: u64,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 1000,
        }
    }
}

impl ReloadConfig {
    /// Polling period, never zero
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9464,
        }
    }
}
