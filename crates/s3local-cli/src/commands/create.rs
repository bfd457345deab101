//! create command - make every bucket the service declares

use super::CommandContext;
use anyhow::{Context, Result};
use s3local_storage::create_buckets;

pub async fn execute(ctx: &CommandContext) -> Result<()> {
    let buckets = ctx.buckets()?;
    let storage = ctx.storage().await?;

    create_buckets(&storage, &buckets)
        .await
        .context("Failed to create buckets")?;

    for bucket in &buckets {
        println!("make_bucket: s3://{}", bucket);
    }
    Ok(())
}
