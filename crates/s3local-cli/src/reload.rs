//! Config hot reload
//!
//! Polls the config file's modification time and, when it changes, rebuilds
//! the routing registry from the new `[service]` section and swaps it into the
//! running supervisor. A config that fails to load leaves the previous
//! registry in place.

use anyhow::{Context, Result};
use s3local_core::S3LocalConfig;
use s3local_events::DispatchSupervisor;
use s3local_storage::{create_buckets, StorageEngine};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::commands::load_service;

pub struct ConfigReloader {
    path: PathBuf,
    /// Config the process started with; only the service-related sections are
    /// taken from the file on reload
    base: S3LocalConfig,
    storage: Arc<dyn StorageEngine>,
    supervisor: Arc<DispatchSupervisor>,
    last_modified: Option<SystemTime>,
    check_interval: Duration,
}

impl ConfigReloader {
    pub fn new(
        path: impl AsRef<Path>,
        base: S3LocalConfig,
        storage: Arc<dyn StorageEngine>,
        supervisor: Arc<DispatchSupervisor>,
    ) -> Self {
        let path = path.as_ref().to_path_buf();
        let last_modified = std::fs::metadata(&path)
            .ok()
            .and_then(|m| m.modified().ok());
        let check_interval = base.reload.interval();

        Self {
            path,
            base,
            storage,
            supervisor,
            last_modified,
            check_interval,
        }
    }

    /// Poll until `shutdown` is cancelled
    pub async fn watch(mut self, shutdown: CancellationToken) {
        info!(
            "Watching {:?} for changes every {:?}",
            self.path, self.check_interval
        );

        let mut ticker = interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.check_and_reload().await {
                error!("Config reload failed, keeping previous subscriptions: {:#}", e);
            }
        }

        debug!("Config watcher stopped");
    }

    /// Reload if the file changed since the last check; returns whether a new
    /// registry was installed.
    pub async fn check_and_reload(&mut self) -> Result<bool> {
        let modified = match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => metadata.modified().ok(),
            Err(e) => {
                debug!("Cannot stat {:?}: {}", self.path, e);
                return Ok(false);
            }
        };

        if modified.is_none() || modified == self.last_modified {
            return Ok(false);
        }

        // record before reloading so a broken file is reported once per edit
        self.last_modified = modified;
        info!("Config file {:?} changed, reloading", self.path);
        self.reload().await?;
        Ok(true)
    }

    async fn reload(&self) -> Result<()> {
        let mut fresh = S3LocalConfig::from_file(&self.path)?;
        fresh.apply_env();

        let mut config = self.base.clone();
        config.service = fresh.service;
        config.storage.buckets = fresh.storage.buckets;
        config.dispatch.fail_fast = fresh.dispatch.fail_fast;
        config.dispatch.invoke_endpoint = fresh.dispatch.invoke_endpoint;

        let loaded = load_service(&config)?;
        create_buckets(self.storage.as_ref(), &loaded.buckets)
            .await
            .context("Failed to create buckets")?;

        let count = loaded.registry.len();
        self.supervisor.resubscribe(Arc::new(loaded.registry))?;
        info!("Reloaded {} subscription(s)", count);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use s3local_events::{EventRouter, LocalInvoker};
    use s3local_storage::LocalStorage;
    use std::fs::{File, FileTimes};
    use tempfile::TempDir;

    const ONE_FUNCTION: &str = r#"
[[service.functions]]
name = "hook"
handler = "handler.hook"
command = ["true"]
events = ["local-bucket"]
"#;

    const TWO_FUNCTIONS: &str = r#"
[[service.functions]]
name = "hook"
handler = "handler.hook"
command = ["true"]
events = ["local-bucket"]

[[service.functions]]
name = "archive"
handler = "handler.archive"
command = ["true"]
events = [{ bucket = "archive-bucket", event = "s3:ObjectRemoved:*" }]
"#;

    struct Fixture {
        _dir: TempDir,
        path: PathBuf,
        storage: Arc<LocalStorage>,
        supervisor: Arc<DispatchSupervisor>,
        reloader: ConfigReloader,
    }

    async fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("s3local.toml");
        std::fs::write(&path, ONE_FUNCTION).unwrap();

        let mut config = S3LocalConfig::from_file(&path).unwrap();
        config.storage.directory = dir.path().join("buckets");

        let storage = Arc::new(LocalStorage::new(&config.storage.directory));
        storage.init().await.unwrap();

        let invoker = LocalInvoker::new(Duration::from_secs(5)).unwrap();
        let supervisor = Arc::new(DispatchSupervisor::new(
            storage.clone(),
            EventRouter::new(Arc::new(invoker)),
        ));
        let loaded = load_service(&config).unwrap();
        supervisor.attach(Arc::new(loaded.registry)).unwrap();

        let reloader = ConfigReloader::new(&path, config, storage.clone(), supervisor.clone());
        Fixture {
            _dir: dir,
            path,
            storage,
            supervisor,
            reloader,
        }
    }

    /// Rewrite the file and push its mtime forward so the change is visible
    /// regardless of filesystem timestamp resolution
    fn rewrite(path: &Path, content: &str, bump: u64) {
        std::fs::write(path, content).unwrap();
        let file = File::options().write(true).open(path).unwrap();
        let modified = SystemTime::now() + Duration::from_secs(bump);
        file.set_times(FileTimes::new().set_modified(modified))
            .unwrap();
    }

    #[tokio::test]
    async fn test_unchanged_file_is_not_reloaded() {
        let mut f = fixture().await;
        assert!(!f.reloader.check_and_reload().await.unwrap());
        assert_eq!(f.supervisor.registry().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_changed_file_swaps_registry() {
        let mut f = fixture().await;

        rewrite(&f.path, TWO_FUNCTIONS, 10);
        assert!(f.reloader.check_and_reload().await.unwrap());

        let registry = f.supervisor.registry().unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.subscriptions()[1].handler.function, "archive");
        assert!(f.storage.bucket_exists("archive-bucket").await.unwrap());

        // same mtime again: nothing to do
        assert!(!f.reloader.check_and_reload().await.unwrap());
    }

    #[tokio::test]
    async fn test_broken_file_keeps_previous_registry() {
        let mut f = fixture().await;
        let before = f.supervisor.registry().unwrap();

        rewrite(&f.path, "[[service.functions]\nname = ", 10);
        assert!(f.reloader.check_and_reload().await.is_err());

        let after = f.supervisor.registry().unwrap();
        assert!(Arc::ptr_eq(&before, &after));

        // the broken edit is not retried until the file changes again
        assert!(!f.reloader.check_and_reload().await.unwrap());

        rewrite(&f.path, TWO_FUNCTIONS, 20);
        assert!(f.reloader.check_and_reload().await.unwrap());
        assert_eq!(f.supervisor.registry().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_watch_stops_on_shutdown() {
        let f = fixture().await;
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(f.reloader.watch(shutdown.clone()));

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
