//! remove command - remove every bucket the service declares

use super::CommandContext;
use anyhow::{Context, Result};
use s3local_storage::remove_buckets;

pub async fn execute(ctx: &CommandContext, force: bool) -> Result<()> {
    let buckets = ctx.buckets()?;
    let storage = ctx.storage().await?;

    remove_buckets(&storage, &buckets, force)
        .await
        .context("Failed to remove buckets")?;

    for bucket in &buckets {
        println!("remove_bucket: s3://{}", bucket);
    }
    Ok(())
}
