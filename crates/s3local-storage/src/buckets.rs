//! Bucket provisioning for a service's declared buckets

use s3local_core::{Error, Result};
use tracing::{info, warn};

use crate::engine::StorageEngine;

/// Create every bucket in `names`; creating an existing bucket succeeds.
pub async fn create_buckets(engine: &dyn StorageEngine, names: &[String]) -> Result<()> {
    if names.is_empty() {
        warn!("No buckets found to create");
        return Ok(());
    }

    for name in names {
        engine.create_bucket(name).await?;
    }

    info!("Created {} bucket(s): {}", names.len(), names.join(", "));
    Ok(())
}

/// Remove one bucket. A bucket that does not exist counts as removed.
pub async fn remove_bucket(engine: &dyn StorageEngine, name: &str, force: bool) -> Result<()> {
    match engine.delete_bucket(name, force).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_no_such_bucket() => Ok(()),
        Err(e) => Err(Error::BucketRemoval {
            bucket: name.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Remove every bucket in `names`, stopping at the first failure.
pub async fn remove_buckets(engine: &dyn StorageEngine, names: &[String], force: bool) -> Result<()> {
    if names.is_empty() {
        warn!("No buckets found to remove");
        return Ok(());
    }

    for name in names {
        remove_bucket(engine, name, force).await?;
        info!("Removed bucket {}", name);
    }
    Ok(())
}
