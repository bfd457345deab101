//! CLI command implementations

pub mod create;
pub mod remove;
pub mod start;

use anyhow::{Context, Result};
use s3local_core::S3LocalConfig;
use s3local_events::{ConfigurationError, FunctionTable, Registry, RegistryBuilder};
use s3local_storage::LocalStorage;
use std::path::PathBuf;
use tracing::info;

/// Context passed to all commands
pub struct CommandContext {
    pub config: S3LocalConfig,
    /// File the config was loaded from; watched for changes by `start`
    pub config_path: Option<PathBuf>,
}

impl CommandContext {
    /// Open the storage directory, creating it if needed
    pub async fn storage(&self) -> Result<LocalStorage> {
        let storage = LocalStorage::new(&self.config.storage.directory);
        storage.init().await.with_context(|| {
            format!(
                "Failed to initialize storage directory {:?}",
                self.config.storage.directory
            )
        })?;
        Ok(storage)
    }

    /// Bucket names the service needs, extra buckets first
    pub fn buckets(&self) -> Result<Vec<String>> {
        let resolved = self
            .config
            .service
            .resolve(&self.config.storage.buckets)
            .context("Failed to resolve service definition")?;
        Ok(resolved.buckets)
    }
}

/// A service definition turned into buckets and a routing registry
pub struct LoadedService {
    pub buckets: Vec<String>,
    pub registry: Registry,
    pub rejected: Vec<ConfigurationError>,
}

/// Resolve the `[service]` section of `config` and build its registry
pub fn load_service(config: &S3LocalConfig) -> Result<LoadedService> {
    let resolved = config
        .service
        .resolve(&config.storage.buckets)
        .context("Failed to resolve service definition")?;

    let table = FunctionTable::from_service(&config.service, &config.dispatch);
    let report = RegistryBuilder::new(&table)
        .fail_fast(config.dispatch.fail_fast)
        .build(&resolved.declarations)
        .context("Invalid notification configuration")?;

    info!(
        "Loaded {} subscription(s) for {} function(s), {} rejected",
        report.registry.len(),
        table.len(),
        report.rejected.len()
    );

    Ok(LoadedService {
        buckets: resolved.buckets,
        registry: report.registry,
        rejected: report.rejected,
    })
}
