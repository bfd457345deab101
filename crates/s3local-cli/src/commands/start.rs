//! start command - run the S3 emulator with event dispatch

use super::{load_service, CommandContext};
use crate::reload::ConfigReloader;
use anyhow::{Context, Result};
use s3local_api::{MetricsRecorder, S3Server};
use s3local_core::types::RecordContext;
use s3local_events::{DispatchSupervisor, EventRouter, LocalInvoker};
use s3local_storage::create_buckets;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub async fn execute(ctx: CommandContext) -> Result<()> {
    let config = &ctx.config;
    info!("Starting s3local...");
    info!("Storage directory: {:?}", config.storage.directory);

    let loaded = load_service(config)?;
    let storage = Arc::new(ctx.storage().await?);
    create_buckets(storage.as_ref(), &loaded.buckets)
        .await
        .context("Failed to create buckets")?;

    let invoker = LocalInvoker::new(config.dispatch.invoke_timeout())
        .context("Failed to build handler HTTP client")?;
    let router = EventRouter::new(Arc::new(invoker)).with_context(RecordContext {
        region: config.dispatch.region.clone(),
        principal_id: config.dispatch.principal_id.clone(),
        ..RecordContext::default()
    });

    let supervisor = Arc::new(DispatchSupervisor::new(storage.clone(), router));
    supervisor.attach(Arc::new(loaded.registry))?;

    let shutdown = CancellationToken::new();

    match &ctx.config_path {
        Some(path) if config.reload.enabled => {
            let reloader =
                ConfigReloader::new(path, config.clone(), storage.clone(), supervisor.clone());
            tokio::spawn(reloader.watch(shutdown.clone()));
        }
        _ => info!("Config hot reload disabled"),
    }

    let mut server = S3Server::new(config.server.clone(), storage.clone())
        .with_owner(config.dispatch.principal_id.clone());
    if config.metrics.enabled {
        let recorder = MetricsRecorder::install().context("Failed to install metrics recorder")?;
        server = server.with_metrics(recorder, config.metrics.port);
    }

    let mut server = tokio::spawn(server.run(shutdown.clone()));

    let stopped_early = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            info!("Shutting down...");
            None
        }
        result = &mut server => Some(result),
    };

    supervisor.shutdown();
    shutdown.cancel();

    let result = match stopped_early {
        Some(result) => {
            warn!("S3 server exited before shutdown was requested");
            result
        }
        None => server.await,
    };
    result.context("S3 server task panicked")??;

    info!("S3 local closed");
    Ok(())
}
