//! Storage engine implementations

use async_trait::async_trait;
use bytes::Bytes;
use md5::{Digest, Md5};
use metrics::counter;
use s3local_core::types::{
    Bucket, NotificationSource, ObjectInfo, RawNotification, S3EventType,
};
use s3local_core::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Notifications buffered per subscriber before it starts lagging
const NOTIFICATION_CAPACITY: usize = 1024;

/// Storage engine trait
#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// Store object data
    async fn put(&self, bucket: &str, key: &str, data: Bytes) -> Result<ObjectInfo>;

    /// Copy an object, possibly across buckets
    async fn copy(
        &self,
        src_bucket: &str,
        src_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> Result<ObjectInfo>;

    /// Retrieve object data
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes>;

    /// Size and ETag of a stored object
    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectInfo>;

    /// Delete object
    async fn delete(&self, bucket: &str, key: &str) -> Result<()>;

    /// Check if object exists
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool>;

    /// Create bucket; creating an existing bucket succeeds
    async fn create_bucket(&self, bucket: &str) -> Result<()>;

    /// Delete bucket, and with `force` every object in it
    async fn delete_bucket(&self, bucket: &str, force: bool) -> Result<()>;

    /// Check if bucket exists
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// List all buckets by name
    async fn list_buckets(&self) -> Result<Vec<Bucket>>;
}

/// Local filesystem storage engine
pub struct LocalStorage {
    data_dir: PathBuf,
    events: broadcast::Sender<RawNotification>,
}

impl LocalStorage {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let (events, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            events,
        }
    }

    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir).await?;
        info!("Storage initialized at {:?}", self.data_dir);
        Ok(())
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        // Hash-based directory structure to avoid too many files in one dir
        let hash = md5_hex(key.as_bytes());
        let prefix = &hash[..2];
        Ok(self.objects_path(bucket)?.join(prefix).join(&hash))
    }

    /// Only valid bucket names are joined onto the data directory, so no
    /// name can resolve outside it
    fn bucket_path(&self, bucket: &str) -> Result<PathBuf> {
        Bucket::validate_name(bucket)?;
        Ok(self.data_dir.join(bucket))
    }

    fn objects_path(&self, bucket: &str) -> Result<PathBuf> {
        Ok(self.bucket_path(bucket)?.join("objects"))
    }

    async fn require_bucket(&self, bucket: &str) -> Result<()> {
        if self.bucket_exists(bucket).await? {
            Ok(())
        } else {
            Err(Error::NoSuchBucketNamed(bucket.to_string()))
        }
    }

    async fn write_object(&self, bucket: &str, key: &str, data: &Bytes) -> Result<ObjectInfo> {
        ObjectInfo::validate_key(key)?;
        self.require_bucket(bucket).await?;

        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, data).await?;

        Ok(ObjectInfo {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size: data.len() as u64,
            etag: md5_hex(data),
        })
    }

    async fn bucket_is_empty(&self, bucket: &str) -> Result<bool> {
        let objects = self.objects_path(bucket)?;
        if !objects.exists() {
            return Ok(true);
        }

        let mut prefixes = fs::read_dir(&objects).await?;
        while let Some(prefix) = prefixes.next_entry().await? {
            if !prefix.file_type().await?.is_dir() {
                return Ok(false);
            }
            let mut entries = fs::read_dir(prefix.path()).await?;
            if entries.next_entry().await?.is_some() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn notify(&self, event: S3EventType, info: &ObjectInfo) {
        counter!("s3local_notifications_total", "event" => event.event_name()).increment(1);
        let notification = RawNotification::new(&info.bucket, &info.key, event.event_name())
            .with_object(info.size, &info.etag);
        // No receivers simply means nobody is listening yet
        let _ = self.events.send(notification);
    }
}

impl NotificationSource for LocalStorage {
    fn subscribe(&self) -> broadcast::Receiver<RawNotification> {
        self.events.subscribe()
    }
}

#[async_trait]
impl StorageEngine for LocalStorage {
    async fn put(&self, bucket: &str, key: &str, data: Bytes) -> Result<ObjectInfo> {
        let info = self.write_object(bucket, key, &data).await?;
        counter!("s3local_storage_operations_total", "operation" => "PutObject").increment(1);
        debug!("Stored object {}/{} ({} bytes)", bucket, key, info.size);

        self.notify(S3EventType::ObjectCreatedPut, &info);
        Ok(info)
    }

    async fn copy(
        &self,
        src_bucket: &str,
        src_key: &str,
        dest_bucket: &str,
        dest_key: &str,
    ) -> Result<ObjectInfo> {
        let data = self.get(src_bucket, src_key).await?;
        let info = self.write_object(dest_bucket, dest_key, &data).await?;
        counter!("s3local_storage_operations_total", "operation" => "CopyObject").increment(1);
        debug!(
            "Copied object {}/{} to {}/{}",
            src_bucket, src_key, dest_bucket, dest_key
        );

        self.notify(S3EventType::ObjectCreatedCopy, &info);
        Ok(info)
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes> {
        self.require_bucket(bucket).await?;
        let path = self.object_path(bucket, key)?;

        if !path.exists() {
            return Err(Error::NoSuchKeyNamed(key.to_string()));
        }

        let data = fs::read(&path).await?;
        debug!("Retrieved object {}/{} ({} bytes)", bucket, key, data.len());

        Ok(Bytes::from(data))
    }

    async fn head(&self, bucket: &str, key: &str) -> Result<ObjectInfo> {
        let data = self.get(bucket, key).await?;
        Ok(ObjectInfo {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size: data.len() as u64,
            etag: md5_hex(&data),
        })
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.require_bucket(bucket).await?;
        let path = self.object_path(bucket, key)?;

        if !path.exists() {
            return Ok(());
        }

        let size = fs::metadata(&path).await?.len();
        fs::remove_file(&path).await?;
        counter!("s3local_storage_operations_total", "operation" => "DeleteObject").increment(1);
        debug!("Deleted object {}/{}", bucket, key);

        let info = ObjectInfo {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size,
            etag: String::new(),
        };
        self.notify(S3EventType::ObjectRemovedDelete, &info);
        Ok(())
    }

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        let path = self.object_path(bucket, key)?;
        Ok(path.exists())
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let path = self.bucket_path(bucket)?;
        fs::create_dir_all(path.join("objects")).await?;
        info!("Created bucket {}", bucket);
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str, force: bool) -> Result<()> {
        let path = self.bucket_path(bucket)?;

        if !path.exists() {
            return Err(Error::NoSuchBucketNamed(bucket.to_string()));
        }

        if !force && !self.bucket_is_empty(bucket).await? {
            return Err(Error::BucketNotEmpty);
        }

        fs::remove_dir_all(&path).await?;
        info!("Deleted bucket {}", bucket);
        Ok(())
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        Ok(self.objects_path(bucket)?.is_dir())
    }

    async fn list_buckets(&self) -> Result<Vec<Bucket>> {
        let mut buckets = Vec::new();
        if !self.data_dir.exists() {
            return Ok(buckets);
        }

        let mut entries = fs::read_dir(&self.data_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.path().join("objects").is_dir() {
                continue;
            }
            let created = entry
                .metadata()
                .await?
                .modified()
                .map(chrono::DateTime::<chrono::Utc>::from)
                .unwrap_or_else(|_| chrono::Utc::now());
            buckets.push(Bucket::new(entry.file_name().to_string_lossy(), created));
        }

        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }
}

fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}
